//! AgentFox core library.
//!
//! Bridges an MCP client to a live browser session. `build_server()`
//! constructs a fully-configured MCP `Server` whose tools submit commands to
//! the broker socket; the extension-host side of the same crate (the [`ext`]
//! module) answers them from a real browser.

pub mod broker;
pub mod codec;
pub mod error;
pub mod ext;
pub mod protocol;
pub mod resources;
pub mod tools;

use broker::SocketBroker;
use pmcp::types::{ServerCapabilities, ToolCapabilities};
use pmcp::Server;
use std::sync::Arc;

/// Build a fully-configured MCP server around an already-bound broker.
pub fn build_server(broker: Arc<SocketBroker>) -> pmcp::Result<Server> {
    let builder = Server::builder()
        .name("agentfox")
        .version(env!("CARGO_PKG_VERSION"))
        .capabilities(ServerCapabilities {
            tools: Some(ToolCapabilities {
                list_changed: Some(true),
            }),
            ..Default::default()
        });

    // Register browser tools
    let builder = tools::register_tools(builder, broker.clone());

    // Register resource-like tools (page_content, status)
    let builder = resources::register_resources(builder, broker);

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker::BrokerConfig;

    #[tokio::test]
    async fn test_build_server() {
        let dir = tempfile::tempdir().unwrap();
        let config = BrokerConfig {
            socket_path: dir.path().join("agentfox-build.sock"),
            ..Default::default()
        };
        let broker = SocketBroker::bind(config).unwrap();
        let server = build_server(broker);
        assert!(server.is_ok());
    }
}
