//! Read browser cookies.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct GetCookiesInput {
    /// Only return cookies that would be sent to this URL (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    #[schemars(description = "Only return cookies that would be sent to this URL (optional)")]
    pub url: Option<String>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: GetCookiesInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::GetCookies, params).await
}
