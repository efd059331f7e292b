//! Hover over an element by its snapshot reference.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct HoverInput {
    /// Element reference from the latest snapshot
    #[serde(rename = "ref")]
    #[validate(length(min = 1))]
    #[schemars(description = "Element reference from the latest snapshot, e.g. 'e3'")]
    pub r#ref: String,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: HoverInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::Hover, params).await
}
