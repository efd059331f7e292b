//! Type text into an element by its snapshot reference.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct TypeInput {
    /// Element reference from the latest snapshot
    #[serde(rename = "ref")]
    #[validate(length(min = 1))]
    #[schemars(description = "Element reference from the latest snapshot, e.g. 'e3'")]
    pub r#ref: String,

    /// Text to type into the element
    #[schemars(description = "Text to type into the element")]
    pub text: String,

    /// Press Enter after typing (submits the surrounding form, if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Press Enter after typing, submitting the surrounding form if any")]
    pub submit: Option<bool>,

    /// Type one character at a time with key events (for pages that listen to keystrokes)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(
        description = "Type one character at a time with key events; slower but closer to a human"
    )]
    pub slowly: Option<bool>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: TypeInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::Type, params).await
}
