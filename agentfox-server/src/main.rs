//! AgentFox MCP gateway binary.
//!
//! Binds the broker socket, publishes the browser tool catalog over stdio,
//! and shuts both down in order on interrupt. The extension relay dials into
//! the socket on its own schedule; tool calls wait briefly for it.

use agentfox_core::broker::{default_socket_path, BrokerConfig, SocketBroker};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "agentfox-server", about = "AgentFox browser bridge MCP server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (default when no subcommand given)
    Serve(ServeArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// Broker socket path (defaults to the runtime-dir endpoint)
    #[clap(long)]
    socket_path: Option<PathBuf>,

    /// Per-command timeout in seconds
    #[clap(long, default_value = "30")]
    command_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let args = match cli.command {
        Some(Command::Serve(args)) => args,
        None => ServeArgs::parse_from(["agentfox-server", "serve"]),
    };

    let config = BrokerConfig {
        socket_path: args.socket_path.unwrap_or_else(default_socket_path),
        command_timeout: Duration::from_secs(args.command_timeout_secs),
        ..Default::default()
    };

    // Startup socket errors are fatal; everything after this point only
    // costs the offending connection.
    let broker = SocketBroker::bind(config)?;
    let server = agentfox_core::build_server(broker.clone())?;

    tokio::select! {
        result = server_common::run_stdio(server) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received; closing broker");
            broker.close();
            Ok(())
        }
    }
}
