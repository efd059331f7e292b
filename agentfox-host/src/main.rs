//! AgentFox extension host binary.
//!
//! Plays the browser side of the bridge: launches (or attaches to) a
//! Chromium session, spawns the relay as its native-messaging port, and
//! answers commands against the live browser until interrupted.

use std::path::PathBuf;

use agentfox_core::ext::tabs::TabHostConfig;
use agentfox_core::ext::{background, HostConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agentfox-host", about = "AgentFox browser extension host")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the extension host (default when no subcommand given)
    Run(RunArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// Path to the agentfox-relay binary
    #[clap(long, default_value = "agentfox-relay")]
    relay_path: PathBuf,

    /// Broker socket path handed to the relay (defaults to the runtime-dir endpoint)
    #[clap(long)]
    socket_path: Option<PathBuf>,

    /// Custom Chrome/Chromium binary path
    #[clap(long)]
    browser_path: Option<String>,

    /// Connect to an already-running browser via CDP URL
    #[clap(long)]
    cdp_url: Option<String>,

    /// Run the browser headless (defaults to a visible session)
    #[clap(long)]
    headless: bool,

    /// Profile directory; also enables bookmarks and history reads
    #[clap(long)]
    user_data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server_common::init_logging();

    let cli = Cli::parse();
    let args = match cli.command {
        Some(Command::Run(args)) => args,
        None => RunArgs::parse_from(["agentfox-host", "run"]),
    };

    let config = HostConfig {
        relay_path: args.relay_path,
        socket_path: args.socket_path,
        browser: TabHostConfig {
            browser_path: args.browser_path,
            cdp_url: args.cdp_url,
            headless: args.headless,
            window_size: (1280, 720),
            user_data_dir: args.user_data_dir,
        },
    };

    tokio::select! {
        result = background::run(config) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received; shutting down host");
            Ok(())
        }
    }
}
