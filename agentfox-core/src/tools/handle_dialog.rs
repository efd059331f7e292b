//! Accept or dismiss a blocking JavaScript dialog.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct HandleDialogInput {
    /// Whether to accept (true) or dismiss (false) the dialog
    #[schemars(description = "Whether to accept (true) or dismiss (false) the dialog")]
    pub accept: bool,

    /// Text to enter in a prompt dialog (optional)
    #[serde(rename = "promptText", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Text to enter in a prompt() dialog (optional)")]
    pub prompt_text: Option<String>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: HandleDialogInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::HandleDialog, params).await
}
