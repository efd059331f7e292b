//! Navigate the current tab to a URL.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct NavigateInput {
    /// URL to navigate to
    #[validate(url)]
    #[schemars(description = "The URL to navigate to")]
    pub url: String,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: NavigateInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::Navigate, params).await
}
