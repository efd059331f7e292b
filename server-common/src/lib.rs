//! Shared bootstrap for the agentfox binaries.
//!
//! Every process in the bridge owes its stdout to a wire protocol — MCP
//! framing in the server, native-messaging framing in the relay — so the
//! one rule here is: diagnostics go to stderr, always.

use pmcp::Server;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialise tracing with `RUST_LOG`-style filtering, writing to stderr.
///
/// Safe to call from any of the binaries; the default level is `info`.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run an MCP server over the stdio transport until the client disconnects.
///
/// Initialises logging first so nothing ever races a write onto stdout.
pub async fn run_stdio(server: Server) -> anyhow::Result<()> {
    init_logging();
    tracing::info!("starting MCP server on stdio");
    server.run_stdio().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_logging_is_idempotent_enough() {
        // A second init would panic on a global default; make sure the first
        // one succeeds in a bare test environment.
        super::init_logging();
    }
}
