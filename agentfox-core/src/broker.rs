//! Single-client stream-socket broker.
//!
//! Owns the Unix socket the relay dials into, multiplexes any number of
//! in-flight commands over the one connection by correlation ID, and keeps
//! the link alive with ping/pong heartbeats. At most one client is attached
//! at a time; later connections are dropped on arrival.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::{encode_frame, FrameDecoder, FrameDialect};
use crate::error::BridgeError;
use crate::protocol::{Command, CommandResponse, IpcEnvelope};

/// Broker tuning knobs. The defaults match the wire contract.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub socket_path: PathBuf,
    pub command_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub pong_deadline: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            command_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(15),
            pong_deadline: Duration::from_secs(5),
        }
    }
}

/// `$XDG_RUNTIME_DIR/agentfox.sock` when set, else `/tmp/agentfox-<uid>.sock`
/// (uid read from the home directory's owner, falling back to the pid).
pub fn default_socket_path() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        if !dir.is_empty() {
            return Path::new(&dir).join("agentfox.sock");
        }
    }
    let owner = std::env::var("HOME")
        .ok()
        .and_then(|home| std::fs::metadata(home).ok())
        .map(|meta| {
            use std::os::unix::fs::MetadataExt;
            meta.uid() as u64
        })
        .unwrap_or_else(|| std::process::id() as u64);
    PathBuf::from(format!("/tmp/agentfox-{owner}.sock"))
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Result<CommandResponse, BridgeError>>>>>;

/// The socket server plus the in-flight command table.
pub struct SocketBroker {
    config: BrokerConfig,
    pending: Pending,
    /// Frames queued for the attached client; `None` while detached.
    writer: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
    connected_rx: watch::Receiver<bool>,
    has_ever_connected: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketBroker {
    /// Unlink any stale endpoint, bind, listen, and start accepting.
    ///
    /// Startup socket errors are fatal; runtime errors only cost the current
    /// connection.
    pub fn bind(config: BrokerConfig) -> anyhow::Result<Arc<Self>> {
        if config.socket_path.exists() {
            std::fs::remove_file(&config.socket_path)?;
        }
        let listener = UnixListener::bind(&config.socket_path)?;
        info!(path = %config.socket_path.display(), "broker listening");

        let (connected_tx, connected_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let broker = Arc::new(Self {
            config,
            pending: Arc::new(Mutex::new(HashMap::new())),
            writer: Arc::new(Mutex::new(None)),
            connected_rx,
            has_ever_connected: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            accept_task: Mutex::new(None),
        });

        let task = tokio::spawn(accept_loop(
            listener,
            broker.config.clone(),
            broker.pending.clone(),
            broker.writer.clone(),
            connected_tx,
            broker.has_ever_connected.clone(),
            shutdown_rx,
        ));
        *broker.accept_task.lock().expect("accept task lock") = Some(task);

        Ok(broker)
    }

    /// Whether a client is attached right now.
    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Whether any client has attached since the broker started.
    pub fn has_ever_connected(&self) -> bool {
        self.has_ever_connected.load(Ordering::Relaxed)
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Await the first (or next) attachment.
    ///
    /// Resolves immediately when already connected; on timeout, the error
    /// distinguishes a link that was lost from one that never existed.
    pub async fn wait_for_connection(&self, timeout: Duration) -> Result<(), BridgeError> {
        let mut rx = self.connected_rx.clone();
        if *rx.borrow() {
            return Ok(());
        }
        let waited = tokio::time::timeout(timeout, async {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;
        match waited {
            Ok(()) if self.is_connected() => Ok(()),
            _ if self.has_ever_connected() => Err(BridgeError::Disconnected),
            _ => Err(BridgeError::NeverConnected),
        }
    }

    /// Submit a command and await its correlated response.
    ///
    /// The caller supplies the correlation ID. Exactly one of a matching
    /// response, a timeout, or a disconnect resolves the future; timeout
    /// cleanup removes the pending entry before rejecting, so a late reply
    /// for the same ID is dropped on arrival.
    pub async fn send_command(&self, command: Command) -> Result<CommandResponse, BridgeError> {
        let id = command.id.clone();

        let frame = encode_frame(
            FrameDialect::Ipc,
            &IpcEnvelope::Command { command },
        )
        .map_err(|e| BridgeError::Framing(e.to_string()))?;

        let writer = self
            .writer
            .lock()
            .expect("writer lock")
            .clone()
            .ok_or_else(|| self.not_connected())?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("pending lock");
            if pending.contains_key(&id) {
                return Err(BridgeError::Command(format!(
                    "correlation ID {id} is already in flight"
                )));
            }
            pending.insert(id.clone(), tx);
        }

        if writer.send(frame).await.is_err() {
            self.pending.lock().expect("pending lock").remove(&id);
            return Err(self.not_connected());
        }

        tokio::select! {
            outcome = rx => match outcome {
                Ok(result) => result,
                // Sender dropped without a verdict; treat as a lost link.
                Err(_) => Err(self.not_connected()),
            },
            _ = tokio::time::sleep(self.config.command_timeout) => {
                self.pending.lock().expect("pending lock").remove(&id);
                Err(BridgeError::Timeout {
                    id,
                    seconds: self.config.command_timeout.as_secs(),
                })
            }
        }
    }

    fn not_connected(&self) -> BridgeError {
        if self.has_ever_connected() {
            BridgeError::Disconnected
        } else {
            BridgeError::NeverConnected
        }
    }

    /// Stop accepting, drop the current client, and reject every pending
    /// command. Removes the socket file.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.accept_task.lock().expect("accept task lock").take() {
            task.abort();
        }
        *self.writer.lock().expect("writer lock") = None;
        reject_all(&self.pending, BridgeError::Disconnected);
        let _ = std::fs::remove_file(&self.config.socket_path);
    }
}

impl Drop for SocketBroker {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        let _ = std::fs::remove_file(&self.config.socket_path);
    }
}

fn reject_all(pending: &Pending, error: BridgeError) {
    let drained: Vec<_> = {
        let mut table = pending.lock().expect("pending lock");
        table.drain().collect()
    };
    for (_, tx) in drained {
        let _ = tx.send(Err(error.clone()));
    }
}

#[allow(clippy::too_many_arguments)]
async fn accept_loop(
    listener: UnixListener,
    config: BrokerConfig,
    pending: Pending,
    writer: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
    connected_tx: watch::Sender<bool>,
    has_ever_connected: Arc<AtomicBool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            },
            _ = shutdown_rx.changed() => return,
        };

        if *connected_tx.borrow() {
            // Single-tenant socket: competing clients are dropped at once.
            debug!("rejecting second concurrent client");
            drop(stream);
            continue;
        }

        has_ever_connected.store(true, Ordering::Relaxed);
        let _ = connected_tx.send(true);
        info!("extension relay attached");

        serve_client(stream, &config, &pending, &writer, &mut shutdown_rx).await;

        let _ = connected_tx.send(false);
        *writer.lock().expect("writer lock") = None;
        reject_all(&pending, BridgeError::Disconnected);
        info!("extension relay detached");
    }
}

/// Drive one attached client until it detaches, misses a heartbeat, or
/// violates the framing.
async fn serve_client(
    mut stream: UnixStream,
    config: &BrokerConfig,
    pending: &Pending,
    writer: &Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(64);
    *writer.lock().expect("writer lock") = Some(outbound_tx.clone());

    // Fresh decoder per connection; restart discards any stale partial frame.
    let mut decoder = FrameDecoder::new(FrameDialect::Ipc);
    let mut read_buf = vec![0u8; 16 * 1024];

    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    heartbeat.tick().await; // the first tick fires immediately; skip it

    let mut pong_outstanding = false;
    let pong_deadline = tokio::time::sleep(Duration::from_secs(0));
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            read = stream.read(&mut read_buf) => {
                let n = match read {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(err) => {
                        warn!(%err, "socket read error");
                        break;
                    }
                };
                let messages = match decoder.push(&read_buf[..n]) {
                    Ok(messages) => messages,
                    Err(err) => {
                        // Framing violation kills the connection, not the server.
                        warn!(%err, "framing violation from client");
                        break;
                    }
                };
                for message in messages {
                    match handle_inbound(message, pending, &mut pong_outstanding) {
                        Inbound::Pong => {
                            let frame = encode_frame(FrameDialect::Ipc, &IpcEnvelope::Pong)
                                .expect("pong frame");
                            if stream.write_all(&frame).await.is_err() {
                                return;
                            }
                        }
                        Inbound::Handled => {}
                    }
                }
            }
            Some(frame) = outbound_rx.recv() => {
                if let Err(err) = stream.write_all(&frame).await {
                    warn!(%err, "socket write error");
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if pong_outstanding {
                    continue; // deadline timer decides
                }
                let frame = encode_frame(FrameDialect::Ipc, &IpcEnvelope::Ping)
                    .expect("ping frame");
                if stream.write_all(&frame).await.is_err() {
                    break;
                }
                pong_outstanding = true;
                pong_deadline.as_mut().reset(tokio::time::Instant::now() + config.pong_deadline);
            }
            _ = &mut pong_deadline, if pong_outstanding => {
                warn!("no pong within deadline; dropping client");
                break;
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    let _ = stream.shutdown().await;
}

enum Inbound {
    Handled,
    Pong,
}

fn handle_inbound(message: Value, pending: &Pending, pong_outstanding: &mut bool) -> Inbound {
    let envelope: IpcEnvelope = match serde_json::from_value(message) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(%err, "dropping unrecognised envelope");
            return Inbound::Handled;
        }
    };
    match envelope {
        IpcEnvelope::Response { response } => {
            let entry = pending
                .lock()
                .expect("pending lock")
                .remove(&response.id);
            match entry {
                Some(tx) => {
                    let _ = tx.send(Ok(response));
                }
                // Late reply after timeout: the entry is gone, drop it.
                None => debug!(id = %response.id, "dropping late response"),
            }
            Inbound::Handled
        }
        IpcEnvelope::Ping => Inbound::Pong,
        IpcEnvelope::Pong => {
            *pong_outstanding = false;
            Inbound::Handled
        }
        IpcEnvelope::Command { command } => {
            // Commands only flow broker -> client.
            debug!(id = %command.id, "unexpected command from client; dropped");
            Inbound::Handled
        }
    }
}
