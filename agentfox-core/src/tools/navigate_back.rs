//! Go back one entry in the tab's history.

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
pub struct NavigateBackInput {}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    _input: NavigateBackInput,
) -> Result<serde_json::Value, Error> {
    super::dispatch(broker, Action::NavigateBack, json!({})).await
}
