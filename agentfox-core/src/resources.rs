//! Resource-like tools for page and bridge state.
//!
//! Registered as tools since PMCP's ResourceCollection currently supports
//! static resources. `page_content` reads the live page; `status` reports
//! the extension link without touching the browser at all.

use crate::broker::SocketBroker;
use crate::protocol::Action;
use pmcp::TypedTool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct PageContentInput {
    /// CSS selector to scope the extraction (optional, defaults to the body)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "CSS selector to scope the extraction (optional, defaults to the body)")]
    pub selector: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
#[schemars(deny_unknown_fields)]
pub struct StatusInput {}

/// Register resource-like tools onto the server builder.
pub fn register_resources(
    builder: pmcp::ServerBuilder,
    broker: Arc<SocketBroker>,
) -> pmcp::ServerBuilder {
    let b = broker.clone();
    let builder = builder.tool(
        "page_content",
        TypedTool::new("page_content", move |input: PageContentInput, _extra| {
            let b = b.clone();
            Box::pin(async move {
                let params = serde_json::to_value(&input)
                    .map_err(|e| pmcp::Error::internal(format!("Failed to serialize parameters: {}", e)))?;
                crate::tools::dispatch(&b, Action::PageContent, params).await
            })
        })
        .with_description("Get the page's visible text together with its URL and title."),
    );

    let b = broker;
    builder.tool(
        "status",
        TypedTool::new("status", move |_input: StatusInput, _extra| {
            let b = b.clone();
            Box::pin(async move {
                Ok(json!({
                    "connected": b.is_connected(),
                    "everConnected": b.has_ever_connected(),
                    "socketPath": b.socket_path().display().to_string(),
                }))
            })
        })
        .with_description("Report whether the browser extension relay is attached to the bridge."),
    )
}
