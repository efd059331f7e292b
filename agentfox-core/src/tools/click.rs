//! Click an element by its snapshot reference.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct ClickInput {
    /// Element reference from the latest snapshot (e.g. "e3")
    #[serde(rename = "ref")]
    #[validate(length(min = 1))]
    #[schemars(description = "Element reference from the latest snapshot, e.g. 'e3'")]
    pub r#ref: String,

    /// Mouse button to use
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Mouse button: 'left' (default), 'middle', or 'right'")]
    pub button: Option<String>,

    /// Modifier keys held during the click
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Modifier keys held during the click: 'Shift', 'Control', 'Alt', 'Meta'")]
    pub modifiers: Option<Vec<String>>,

    /// Double-click instead of a single click
    #[serde(rename = "doubleClick", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Double-click instead of a single click")]
    pub double_click: Option<bool>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: ClickInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::Click, params).await
}
