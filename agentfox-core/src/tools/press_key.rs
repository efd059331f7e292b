//! Press a keyboard key in the currently focused element.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct PressKeyInput {
    /// Key to press (e.g. "Enter", "Tab", "Escape", "ArrowDown", "a")
    #[validate(length(min = 1))]
    #[schemars(
        description = "Key to press. Examples: 'Enter', 'Tab', 'Escape', 'Backspace', 'ArrowDown', 'a'"
    )]
    pub key: String,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: PressKeyInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::PressKey, params).await
}
