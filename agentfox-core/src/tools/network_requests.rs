//! Record and inspect the tab's network requests.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct NetworkRequestsInput {
    /// Recorder operation to perform
    #[schemars(description = "Recorder operation: 'start', 'stop', 'get', or 'clear'")]
    pub action: String,

    /// Substring filter applied to request URLs when reading (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Substring filter applied to request URLs when reading (optional)")]
    pub filter: Option<String>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: NetworkRequestsInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    match input.action.as_str() {
        "start" | "stop" | "get" | "clear" => {}
        other => {
            return Err(Error::validation(format!(
                "Unknown network_requests action '{}': use 'start', 'stop', 'get', or 'clear'",
                other
            )))
        }
    }

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::NetworkRequests, params).await
}
