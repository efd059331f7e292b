//! Search the browsing history.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct GetHistoryInput {
    /// Substring to match against page titles and URLs (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Substring to match against page titles and URLs (optional)")]
    pub query: Option<String>,

    /// Maximum number of entries to return
    #[serde(rename = "maxResults", skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 1000))]
    #[schemars(description = "Maximum number of entries to return (default: 100)")]
    pub max_results: Option<u32>,

    /// Only include visits at or after this time (milliseconds since the Unix epoch)
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Only include visits at or after this time (ms since the Unix epoch)")]
    pub start_time: Option<i64>,

    /// Only include visits before this time (milliseconds since the Unix epoch)
    #[serde(rename = "endTime", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Only include visits before this time (ms since the Unix epoch)")]
    pub end_time: Option<i64>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: GetHistoryInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::GetHistory, params).await
}
