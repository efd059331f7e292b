//! List, open, close, or select browser tabs.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct TabsInput {
    /// Tab operation to perform
    #[schemars(description = "Tab operation: 'list', 'new', 'close', or 'select'")]
    pub action: String,

    /// Tab index for 'close' and 'select' (from a previous 'list')
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Tab index for 'close' and 'select' (from a previous 'list')")]
    pub index: Option<usize>,
}

pub async fn execute(
    broker: &Arc<SocketBroker>,
    input: TabsInput,
) -> Result<serde_json::Value, Error> {
    input
        .validate()
        .map_err(|e| Error::validation(format!("Validation failed: {}", e)))?;

    match input.action.as_str() {
        "list" | "new" | "close" | "select" => {}
        other => {
            return Err(Error::validation(format!(
                "Unknown tabs action '{}': use 'list', 'new', 'close', or 'select'",
                other
            )))
        }
    }
    if input.action == "select" && input.index.is_none() {
        return Err(Error::validation("tabs action 'select' requires an index"));
    }

    let params = serde_json::to_value(&input)
        .map_err(|e| Error::internal(format!("Failed to serialize parameters: {}", e)))?;

    super::dispatch(broker, Action::Tabs, params).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_requires_index() {
        // Exercised through execute(); here we only check the verb gate.
        let input = TabsInput {
            action: "select".into(),
            index: None,
        };
        assert!(input.validate().is_ok()); // schema-level ok, gate is in execute
        assert_eq!(input.action, "select");
    }
}
