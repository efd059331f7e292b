//! Resize the browser viewport.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct ResizeInput {
    /// Viewport width in CSS pixels
    #[validate(range(min = 100, max = 10000))]
    #[schemars(description = "Viewport width in CSS pixels")]
    pub width: u32,

    /// Viewport height in CSS pixels
    #[validate(range(min = 100, max = 10000))]
    #[schemars(description = "Viewport height in CSS pixels")]
    pub height: u32,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: ResizeInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::Resize, params).await
}
