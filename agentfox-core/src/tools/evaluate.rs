//! Evaluate a JavaScript function in the page's main world.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct EvaluateInput {
    /// Function to evaluate, e.g. "() => document.title" or "(el) => el.textContent"
    #[serde(rename = "function")]
    #[validate(length(min = 1))]
    #[schemars(
        description = "Function to evaluate, e.g. '() => document.title'. With a ref, the \
                       element is passed as the first argument: '(el) => el.textContent'."
    )]
    pub function: String,

    /// Element reference to pass to the function (optional)
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Element reference to pass to the function (optional)")]
    pub r#ref: Option<String>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: EvaluateInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::Evaluate, params).await
}
