//! Fill several form fields in one batch.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct FieldInput {
    /// Element reference from the latest snapshot
    #[serde(rename = "ref")]
    #[validate(length(min = 1))]
    #[schemars(description = "Element reference from the latest snapshot")]
    pub r#ref: String,

    /// Human-readable field name, used in error reports
    #[schemars(description = "Human-readable field name, echoed back in per-field errors")]
    pub name: String,

    /// Control kind the reference is expected to be
    #[serde(rename = "type")]
    #[schemars(description = "Control kind: 'textbox', 'checkbox', 'radio', 'combobox', or 'slider'")]
    pub kind: String,

    /// Value to apply (string for textbox/combobox/slider, boolean for checkbox/radio)
    #[schemars(description = "Value to apply; boolean for checkbox/radio, string otherwise")]
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct FillFormInput {
    /// Fields to fill, applied in order
    #[validate(length(min = 1), nested)]
    #[schemars(description = "Fields to fill, applied in order")]
    pub fields: Vec<FieldInput>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: FillFormInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::FillForm, params).await
}
