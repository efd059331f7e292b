//! Wait for text to appear or disappear, or for a fixed delay.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
#[validate(schema(function = at_least_one_condition))]
pub struct WaitForInput {
    /// Text that should appear in the page
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Text that should appear in the page")]
    pub text: Option<String>,

    /// Text that should disappear from the page
    #[serde(rename = "textGone", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Text that should disappear from the page")]
    pub text_gone: Option<String>,

    /// Seconds to wait; with a text condition this is the overall timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 120.0))]
    #[schemars(description = "Seconds to wait; with a text condition this is the overall timeout")]
    pub time: Option<f64>,
}

fn at_least_one_condition(input: &WaitForInput) -> Result<(), validator::ValidationError> {
    if input.text.is_none() && input.text_gone.is_none() && input.time.is_none() {
        return Err(validator::ValidationError::new(
            "one of text, textGone, or time is required",
        ));
    }
    Ok(())
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: WaitForInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::WaitFor, params).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        let input = WaitForInput {
            text: None,
            text_gone: None,
            time: None,
        };
        assert!(input.validate().is_err());

        let input = WaitForInput {
            text: Some("Hello".into()),
            text_gone: None,
            time: None,
        };
        assert!(input.validate().is_ok());
    }
}
