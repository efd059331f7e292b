//! Search the browser's bookmarks.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct GetBookmarksInput {
    /// Substring to match against bookmark titles and URLs (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Substring to match against bookmark titles and URLs (optional)")]
    pub query: Option<String>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: GetBookmarksInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::GetBookmarks, params).await
}
