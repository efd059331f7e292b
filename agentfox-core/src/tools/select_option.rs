//! Select options in a select element.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct SelectOptionInput {
    /// Element reference of the select element
    #[serde(rename = "ref")]
    #[validate(length(min = 1))]
    #[schemars(description = "Element reference of the select element")]
    pub r#ref: String,

    /// Options to select, matched by visible text first, then by value
    #[validate(length(min = 1))]
    #[schemars(description = "Options to select, matched by visible text first, then by value")]
    pub values: Vec<String>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: SelectOptionInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::SelectOption, params).await
}
