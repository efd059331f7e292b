//! Native-messaging relay.
//!
//! The browser spawns this process when the extension opens its native port.
//! It speaks the browser's little-endian framing on stdin/stdout and the
//! broker's big-endian framing on the stream socket, forwarding payloads in
//! both directions. Stdout belongs to the transport; every diagnostic goes
//! to stderr.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentfox_core::broker::default_socket_path;
use agentfox_core::codec::{encode_frame, CodecError, FrameDecoder, FrameDialect};
use agentfox_core::protocol::IpcEnvelope;
use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "agentfox-relay", about = "AgentFox native-messaging relay")]
struct Cli {
    /// Broker socket path (defaults to the runtime-dir endpoint)
    #[clap(long)]
    socket_path: Option<PathBuf>,

    /// Arguments the browser appends (manifest path, extension origin); ignored
    #[clap(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    browser_args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server_common::init_logging();

    let cli = Cli::parse();
    let socket_path = cli.socket_path.unwrap_or_else(default_socket_path);

    let stream = UnixStream::connect(&socket_path).await.map_err(|err| {
        anyhow::anyhow!(
            "cannot reach broker at {}: {err} (is the MCP server running?)",
            socket_path.display()
        )
    })?;
    info!(path = %socket_path.display(), "connected to broker");

    let (sock_read, sock_write) = stream.into_split();

    // Liveness of the broker link; the 1 s poll below watches it.
    let alive = Arc::new(AtomicBool::new(true));

    // All stdout bytes funnel through one writer task so two concurrent
    // commands can never interleave their frame bytes.
    let (stdout_tx, stdout_rx) = mpsc::channel::<Vec<u8>>(64);
    let stdout_task = tokio::spawn(stdout_writer(stdout_rx));

    // Socket writes are serialized the same way.
    let (sock_tx, sock_rx) = mpsc::channel::<Vec<u8>>(64);
    let sock_writer_task = tokio::spawn(socket_writer(sock_write, sock_rx, alive.clone()));

    let socket_task = tokio::spawn(socket_reader(
        sock_read,
        stdout_tx.clone(),
        sock_tx.clone(),
        alive.clone(),
    ));
    let stdin_task = tokio::spawn(stdin_reader(sock_tx.clone(), alive.clone()));

    // Poll the IPC connection at 1 s; exit cleanly when it is gone or when
    // stdin reached EOF (the browser closed the port).
    let mut poll = tokio::time::interval(Duration::from_secs(1));
    loop {
        poll.tick().await;
        if !alive.load(Ordering::Relaxed) {
            info!("broker link lost; relay exiting");
            break;
        }
        if stdin_task.is_finished() {
            info!("stdin closed by browser; relay exiting");
            break;
        }
    }

    socket_task.abort();
    stdin_task.abort();
    sock_writer_task.abort();
    drop(stdout_tx);
    let _ = tokio::time::timeout(Duration::from_millis(200), stdout_task).await;
    Ok(())
}

/// Sole writer of stdout. A write failure here is fatal: without stdout the
/// browser can never hear from us again.
async fn stdout_writer(mut rx: mpsc::Receiver<Vec<u8>>) {
    let mut stdout = tokio::io::stdout();
    while let Some(frame) = rx.recv().await {
        let wrote = async {
            stdout.write_all(&frame).await?;
            stdout.flush().await
        }
        .await;
        if let Err(err) = wrote {
            error!(%err, "stdout write failed; terminating");
            // Brief grace so stderr flushes before the process dies.
            tokio::time::sleep(Duration::from_millis(200)).await;
            std::process::exit(1);
        }
    }
}

async fn socket_writer(
    mut write: tokio::net::unix::OwnedWriteHalf,
    mut rx: mpsc::Receiver<Vec<u8>>,
    alive: Arc<AtomicBool>,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(err) = write.write_all(&frame).await {
            warn!(%err, "socket write failed");
            alive.store(false, Ordering::Relaxed);
            return;
        }
    }
}

/// Broker -> browser direction. A framing error on the socket is not
/// recoverable: mark the link dead and let the poll loop exit; the browser
/// respawns the relay on the next port open.
async fn socket_reader(
    mut read: tokio::net::unix::OwnedReadHalf,
    stdout_tx: mpsc::Sender<Vec<u8>>,
    sock_tx: mpsc::Sender<Vec<u8>>,
    alive: Arc<AtomicBool>,
) {
    let mut decoder = FrameDecoder::new(FrameDialect::Ipc);
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        let n = match read.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(%err, "socket read error");
                break;
            }
        };
        let messages = match decoder.push(&buf[..n]) {
            Ok(messages) => messages,
            Err(err) => {
                warn!(%err, "framing error on broker link");
                break;
            }
        };
        for message in messages {
            let envelope: IpcEnvelope = match serde_json::from_value(message) {
                Ok(envelope) => envelope,
                Err(err) => {
                    debug!(%err, "dropping unrecognised broker envelope");
                    continue;
                }
            };
            match envelope {
                IpcEnvelope::Command { command } => {
                    // Reframe the bare command for the native dialect.
                    match encode_frame(FrameDialect::Native, &command) {
                        Ok(frame) => {
                            if stdout_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            // A >1 MiB command cannot cross the native link;
                            // drop it and let the broker's timeout answer.
                            warn!(id = %command.id, %err, "command too large for native framing");
                        }
                    }
                }
                IpcEnvelope::Ping => {
                    let frame =
                        encode_frame(FrameDialect::Ipc, &IpcEnvelope::Pong).expect("pong frame");
                    if sock_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                IpcEnvelope::Pong | IpcEnvelope::Response { .. } => {}
            }
        }
    }
    alive.store(false, Ordering::Relaxed);
}

/// Browser -> broker direction. Each native payload is forwarded verbatim as
/// a `response` envelope. Framing errors here skip the offending message
/// rather than killing the relay.
async fn stdin_reader(sock_tx: mpsc::Sender<Vec<u8>>, _alive: Arc<AtomicBool>) {
    let mut stdin = tokio::io::stdin();
    let mut decoder = FrameDecoder::new(FrameDialect::Native);
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        let n = match stdin.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(%err, "stdin read error");
                break;
            }
        };
        let messages = match decoder.push(&buf[..n]) {
            Ok(messages) => messages,
            Err(err @ CodecError::Payload(_)) => {
                warn!(%err, "skipping malformed native message");
                continue;
            }
            Err(err) => {
                // Oversized length: the stream position is unrecoverable;
                // drop buffered bytes and resynchronise on fresh input.
                warn!(%err, "oversized native frame; resetting decoder");
                decoder.reset();
                continue;
            }
        };
        for payload in messages {
            let envelope = json!({ "type": "response", "response": payload });
            match encode_frame(FrameDialect::Ipc, &envelope) {
                Ok(frame) => {
                    if sock_tx.send(frame).await.is_err() {
                        return;
                    }
                }
                Err(err) => warn!(%err, "failed to frame native payload"),
            }
        }
    }
    // Stdin EOF: the browser closed the port; main exits on the next poll tick.
}
