//! Take a screenshot (base64 PNG or JPEG).

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct ScreenshotInput {
    /// Image format
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Image format: 'png' (default) or 'jpeg'")]
    pub format: Option<String>,

    /// Capture the full scrollable page instead of just the viewport
    #[serde(rename = "fullPage", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Capture the full scrollable page (default: false)")]
    pub full_page: Option<bool>,

    /// Element reference to screenshot instead of the page
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Element reference to screenshot instead of the page (optional)")]
    pub r#ref: Option<String>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: ScreenshotInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    if let Some(ref format) = input.format {
        if format != "png" && format != "jpeg" {
            return Err(Error::validation(format!(
                "Unsupported screenshot type '{}': use 'png' or 'jpeg'",
                format
            )));
        }
    }

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    // The result already carries { data, mimeType }; pass it through so the
    // client can decode the base64 image.
    super::dispatch(broker, Action::Screenshot, params).await
}
