//! NativePort — the host's end of the native-messaging link.
//!
//! The host plays the browser's part of native messaging: it spawns the
//! relay binary as a child process and exchanges little-endian frames over
//! the child's stdin/stdout. The relay's stderr is inherited so its
//! diagnostics land next to ours.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::codec::{encode_frame, FrameDecoder, FrameDialect};

/// One spawned relay and its framed stdio.
pub struct NativePort {
    child: Child,
    stdin: ChildStdin,
    inbound_rx: mpsc::Receiver<Value>,
}

impl NativePort {
    /// Spawn the relay and wire up its streams.
    pub fn spawn(relay_path: &Path, socket_path: Option<&PathBuf>) -> Result<Self> {
        let mut command = Command::new(relay_path);
        if let Some(path) = socket_path {
            command.arg("--socket-path").arg(path);
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn relay at {}", relay_path.display()))?;

        let stdin = child.stdin.take().context("relay stdin unavailable")?;
        let stdout = child.stdout.take().context("relay stdout unavailable")?;

        let (inbound_tx, inbound_rx) = mpsc::channel::<Value>(64);
        tokio::spawn(read_frames(stdout, inbound_tx));

        Ok(Self {
            child,
            stdin,
            inbound_rx,
        })
    }

    /// Next decoded message from the relay; `None` once the port is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        self.inbound_rx.recv().await
    }

    /// Frame and write one message to the relay's stdin.
    ///
    /// `&mut self` keeps writes serialized by construction; replies funnel
    /// through the background loop's single writer.
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let frame = encode_frame(FrameDialect::Native, message)?;
        self.stdin.write_all(&frame).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Close stdin (the relay exits on EOF) and reap the child.
    pub async fn shutdown(mut self) {
        drop(self.stdin);
        let _ = self.child.wait().await;
    }
}

async fn read_frames(
    mut stdout: tokio::process::ChildStdout,
    inbound_tx: mpsc::Sender<Value>,
) {
    let mut decoder = FrameDecoder::new(FrameDialect::Native);
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        let n = match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(%err, "relay stdout read error");
                break;
            }
        };
        let messages = match decoder.push(&buf[..n]) {
            Ok(messages) => messages,
            Err(err) => {
                // The relay caps its own frames; a violation here means the
                // stream is torn. Drop the port and let the caller respawn.
                warn!(%err, "framing error on native port");
                break;
            }
        };
        for message in messages {
            debug!("native port message received");
            if inbound_tx.send(message).await.is_err() {
                return;
            }
        }
    }
}
