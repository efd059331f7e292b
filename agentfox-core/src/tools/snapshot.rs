//! Capture the accessibility tree of the current page.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct SnapshotInput {}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    _input: SnapshotInput,
) -> Result<serde_json::Value, Error> {
    super::dispatch(broker, Action::Snapshot, json!({})).await
}
