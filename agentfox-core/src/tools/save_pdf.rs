//! Export the current page as a PDF.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct SavePdfInput {
    /// Text rendered in the page header (optional)
    #[serde(rename = "headerText", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Text rendered in the page header (optional)")]
    pub header_text: Option<String>,

    /// Text rendered in the page footer (optional)
    #[serde(rename = "footerText", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Text rendered in the page footer (optional)")]
    pub footer_text: Option<String>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: SavePdfInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::SavePdf, params).await
}
