//! End-to-end test of the broker <-> relay pipeline.
//!
//! Binds a real broker socket, spawns the actual relay binary, and plays the
//! browser extension on the relay's stdin/stdout: little-endian native
//! frames in, big-endian socket frames behind the scenes, correlated
//! responses back out.

use std::process::Stdio;
use std::time::Duration;

use agentfox_core::broker::{BrokerConfig, SocketBroker};
use agentfox_core::codec::{encode_frame, FrameDecoder, FrameDialect};
use agentfox_core::protocol::{Action, Command, CommandResponse};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout};

struct FakeExtension {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    decoder: FrameDecoder,
    queued: Vec<Value>,
}

impl FakeExtension {
    /// Spawn the relay pointed at the given socket and take its stdio.
    fn spawn(socket_path: &std::path::Path) -> Self {
        let mut child = tokio::process::Command::new(env!("CARGO_BIN_EXE_agentfox-relay"))
            .arg("--socket-path")
            .arg(socket_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("spawn relay");
        let stdin = child.stdin.take().expect("relay stdin");
        let stdout = child.stdout.take().expect("relay stdout");
        Self {
            child,
            stdin,
            stdout,
            decoder: FrameDecoder::new(FrameDialect::Native),
            queued: Vec::new(),
        }
    }

    /// Next command the relay forwarded from the broker.
    async fn next_command(&mut self) -> Command {
        let mut buf = [0u8; 4096];
        loop {
            if !self.queued.is_empty() {
                let message = self.queued.remove(0);
                return serde_json::from_value(message).expect("command");
            }
            let n = self.stdout.read(&mut buf).await.expect("read relay stdout");
            assert!(n > 0, "relay closed stdout");
            self.queued
                .extend(self.decoder.push(&buf[..n]).expect("native frame"));
        }
    }

    /// Answer a command over the native link.
    async fn respond(&mut self, response: &CommandResponse) {
        let frame = encode_frame(FrameDialect::Native, response).expect("frame");
        self.stdin.write_all(&frame).await.expect("write relay stdin");
        self.stdin.flush().await.expect("flush relay stdin");
    }
}

fn command(id: &str, action: Action, params: Value) -> Command {
    Command {
        id: id.into(),
        action,
        params,
    }
}

#[tokio::test]
async fn command_and_response_cross_both_framings() {
    let dir = tempfile::tempdir().unwrap();
    let config = BrokerConfig {
        socket_path: dir.path().join("agentfox-e2e.sock"),
        command_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let broker = SocketBroker::bind(config).unwrap();

    let mut extension = FakeExtension::spawn(broker.socket_path());
    broker
        .wait_for_connection(Duration::from_secs(5))
        .await
        .expect("relay should attach");

    let call = {
        let broker = broker.clone();
        tokio::spawn(async move {
            broker
                .send_command(command(
                    "c1",
                    Action::Navigate,
                    json!({"url": "https://example.com"}),
                ))
                .await
        })
    };

    let seen = extension.next_command().await;
    assert_eq!(seen.id, "c1");
    assert_eq!(seen.action, Action::Navigate);
    assert_eq!(seen.params["url"], "https://example.com");

    extension
        .respond(&CommandResponse::ok(
            "c1",
            json!({"url": "https://example.com/", "title": "Example Domain"}),
        ))
        .await;

    let response = call.await.unwrap().expect("response");
    assert!(response.success);
    assert_eq!(response.result.unwrap()["title"], "Example Domain");

    drop(extension);
}

#[tokio::test]
async fn concurrent_commands_resolve_out_of_order_across_the_relay() {
    let dir = tempfile::tempdir().unwrap();
    let config = BrokerConfig {
        socket_path: dir.path().join("agentfox-e2e2.sock"),
        command_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let broker = SocketBroker::bind(config).unwrap();

    let mut extension = FakeExtension::spawn(broker.socket_path());
    broker
        .wait_for_connection(Duration::from_secs(5))
        .await
        .expect("relay should attach");

    let first = {
        let broker = broker.clone();
        tokio::spawn(
            async move { broker.send_command(command("c1", Action::Snapshot, json!({}))).await },
        )
    };
    let second = {
        let broker = broker.clone();
        tokio::spawn(
            async move { broker.send_command(command("c2", Action::Close, json!({}))).await },
        )
    };

    let mut ids = vec![
        extension.next_command().await.id,
        extension.next_command().await.id,
    ];
    ids.sort();
    assert_eq!(ids, vec!["c1", "c2"]);

    // Answer in reverse order; correlation must still hold.
    extension
        .respond(&CommandResponse::ok("c2", json!({"n": 2})))
        .await;
    extension
        .respond(&CommandResponse::ok("c1", json!({"n": 1})))
        .await;

    assert_eq!(first.await.unwrap().unwrap().result.unwrap()["n"], 1);
    assert_eq!(second.await.unwrap().unwrap().result.unwrap()["n"], 2);
}

#[tokio::test]
async fn relay_exits_when_the_broker_goes_away() {
    let dir = tempfile::tempdir().unwrap();
    let config = BrokerConfig {
        socket_path: dir.path().join("agentfox-e2e3.sock"),
        ..Default::default()
    };
    let broker = SocketBroker::bind(config).unwrap();

    let mut extension = FakeExtension::spawn(broker.socket_path());
    broker
        .wait_for_connection(Duration::from_secs(5))
        .await
        .expect("relay should attach");

    broker.close();

    // The 1 s liveness poll notices the dead link and the process exits.
    let status = tokio::time::timeout(Duration::from_secs(10), extension.child.wait())
        .await
        .expect("relay should exit after broker shutdown")
        .expect("relay exit status");
    assert!(status.success());
}
