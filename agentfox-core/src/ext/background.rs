//! Background dispatcher: owns the native port, routes commands.
//!
//! The loop here is the privileged half of the browser side. It validates
//! every inbound message, fans command handling out onto tasks, serializes
//! replies back through the one port writer, and respawns the relay with
//! exponential backoff when the port drops.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::DispatchError;
use crate::protocol::{Action, Command, CommandResponse};

use super::chrome_data;
use super::content::{self, ContentContext};
use super::netlog::NetworkRecorder;
use super::port::NativePort;
use super::tabs::{TabHost, TabHostConfig};
use super::browser_api;

/// Reconnect policy: base 1 s, doubled per attempt, capped at five attempts.
const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_BASE: Duration = Duration::from_secs(1);

/// Extension-host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Path to the relay binary this host spawns as its native port.
    pub relay_path: PathBuf,
    /// Broker socket path handed to the relay (default when `None`).
    pub socket_path: Option<PathBuf>,
    pub browser: TabHostConfig,
}

/// Shared state behind every command handler.
pub struct ExtensionHost {
    pub(crate) tabs: TabHost,
    pub(crate) netlog: NetworkRecorder,
    pub(crate) content: ContentContext,
    /// Content actions are serialized, as the extension message bus would.
    content_lock: Mutex<()>,
}

impl ExtensionHost {
    pub fn new(browser: TabHostConfig) -> Arc<Self> {
        Arc::new(Self {
            tabs: TabHost::new(browser),
            netlog: NetworkRecorder::new(),
            content: ContentContext::new(),
            content_lock: Mutex::new(()),
        })
    }

    /// Handle one validated command; every failure becomes an error response
    /// with the same correlation ID.
    pub async fn handle_command(self: &Arc<Self>, command: Command) -> CommandResponse {
        let id = command.id.clone();
        debug!(id = %id, action = %command.action, "dispatching command");
        match self.dispatch(command.action, command.params).await {
            Ok(result) => CommandResponse::ok(id, result),
            Err(err) => {
                debug!(id = %id, %err, "command failed");
                CommandResponse::err(id, err.to_string())
            }
        }
    }

    async fn dispatch(self: &Arc<Self>, action: Action, params: Value) -> Result<Value, DispatchError> {
        if action.is_page_interaction() {
            let page = self.tabs.page().await.map_err(DispatchError::other)?;
            content::ensure_scriptable(&page).await?;
            let _serialized = self.content_lock.lock().await;
            return content::handle(self, &page, action, params).await;
        }

        match action {
            Action::Navigate => browser_api::navigate(self, parse(action, params)?).await,
            Action::NavigateBack => browser_api::navigate_back(self).await,
            Action::Screenshot => browser_api::screenshot(self, parse(action, params)?).await,
            Action::Tabs => browser_api::tabs(self, parse(action, params)?).await,
            Action::Close => browser_api::close_tab(self).await,
            Action::Resize => browser_api::resize(self, parse(action, params)?).await,
            Action::SavePdf => browser_api::save_pdf(self, parse(action, params)?).await,
            Action::HandleDialog => browser_api::handle_dialog(self, parse(action, params)?).await,
            Action::GetCookies => browser_api::get_cookies(self, parse(action, params)?).await,
            Action::GetBookmarks => chrome_data::get_bookmarks(self, parse(action, params)?).await,
            Action::GetHistory => chrome_data::get_history(self, parse(action, params)?).await,
            Action::NetworkRequests => {
                browser_api::network_requests(self, parse(action, params)?).await
            }
            // Page interactions were routed above.
            Action::Snapshot
            | Action::Click
            | Action::Type
            | Action::PressKey
            | Action::Hover
            | Action::FillForm
            | Action::SelectOption
            | Action::Evaluate
            | Action::WaitFor
            | Action::PageContent => unreachable!("page interaction routed to content"),
        }
    }
}

/// Narrow the verbatim parameter record into the per-action type.
pub(crate) fn parse<T: DeserializeOwned>(action: Action, params: Value) -> Result<T, DispatchError> {
    serde_json::from_value(params).map_err(|err| DispatchError::BadParams {
        action: action.to_string(),
        detail: err.to_string(),
    })
}

/// Run the background loop until the reconnect budget is exhausted.
pub async fn run(config: HostConfig) -> Result<()> {
    let host = ExtensionHost::new(config.browser.clone());

    // Bring the browser up before the first command arrives.
    host.tabs.ensure_browser().await?;

    let mut attempt: u32 = 0;
    loop {
        let mut port = match NativePort::spawn(&config.relay_path, config.socket_path.as_ref()) {
            Ok(port) => port,
            Err(err) => {
                warn!(%err, "failed to spawn relay");
                if !backoff(&mut attempt).await {
                    error!("giving up after {MAX_RECONNECT_ATTEMPTS} attempts");
                    host.tabs.shutdown().await;
                    anyhow::bail!("relay connection attempts exhausted");
                }
                continue;
            }
        };
        info!("native port open");

        // Replies from concurrent handlers funnel through this channel so
        // the port writer stays single-producer.
        let (reply_tx, mut reply_rx) = mpsc::channel::<CommandResponse>(32);
        let mut proved_live = false;

        loop {
            tokio::select! {
                inbound = port.recv() => {
                    let Some(message) = inbound else { break };
                    if !proved_live {
                        // An inbound message proves the link is live, not
                        // merely open; only now does the counter reset.
                        proved_live = true;
                        attempt = 0;
                    }
                    match validate_shape(message) {
                        Inbound::Command(command) => {
                            let host = host.clone();
                            let reply_tx = reply_tx.clone();
                            tokio::spawn(async move {
                                let response = host.handle_command(command).await;
                                let _ = reply_tx.send(response).await;
                            });
                        }
                        Inbound::BadAction { id, action } => {
                            let response = CommandResponse::err(
                                id,
                                DispatchError::UnknownAction(action).to_string(),
                            );
                            let _ = reply_tx.send(response).await;
                        }
                        Inbound::Drop => {}
                    }
                }
                Some(response) = reply_rx.recv() => {
                    if let Err(err) = port.send(&response).await {
                        warn!(%err, "port write failed");
                        break;
                    }
                }
            }
        }

        port.shutdown().await;
        if !backoff(&mut attempt).await {
            error!("native port lost; giving up after {MAX_RECONNECT_ATTEMPTS} attempts");
            host.tabs.shutdown().await;
            anyhow::bail!("relay connection attempts exhausted");
        }
    }
}

/// Sleep out the next backoff slot; false once the budget is spent.
async fn backoff(attempt: &mut u32) -> bool {
    *attempt += 1;
    if *attempt > MAX_RECONNECT_ATTEMPTS {
        return false;
    }
    let delay = RECONNECT_BASE * 2u32.pow(*attempt - 1);
    info!(attempt = *attempt, ?delay, "reconnecting native port");
    tokio::time::sleep(delay).await;
    true
}

enum Inbound {
    Command(Command),
    /// Well-formed shape, but the action tag is outside the closed set.
    BadAction { id: String, action: String },
    /// Ill-formed shape: logged and dropped without a reply.
    Drop,
}

/// Shape check for inbound messages: an object with string `id` and string
/// `action`.
fn validate_shape(message: Value) -> Inbound {
    let (Some(id), Some(action)) = (
        message.get("id").and_then(Value::as_str).map(str::to_string),
        message.get("action").and_then(Value::as_str).map(str::to_string),
    ) else {
        warn!("dropping ill-formed message from relay");
        return Inbound::Drop;
    };
    match serde_json::from_value::<Command>(message) {
        Ok(command) => Inbound::Command(command),
        Err(_) => {
            debug!(id = %id, action = %action, "unknown action");
            Inbound::BadAction { id, action }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shape_validation_drops_malformed_messages() {
        for message in [
            json!("not an object"),
            json!({"action": "navigate"}),
            json!({"id": 7, "action": "navigate"}),
            json!({"id": "c1"}),
        ] {
            assert!(matches!(validate_shape(message), Inbound::Drop));
        }
    }

    #[test]
    fn shape_validation_accepts_known_commands() {
        let inbound = validate_shape(json!({
            "id": "c1",
            "action": "navigate",
            "params": {"url": "https://example.com"}
        }));
        let Inbound::Command(command) = inbound else {
            panic!("expected a command");
        };
        assert_eq!(command.id, "c1");
        assert_eq!(command.action, Action::Navigate);
    }

    #[test]
    fn unknown_action_yields_a_correlated_error() {
        let inbound = validate_shape(json!({"id": "c4", "action": "teleport"}));
        let Inbound::BadAction { id, action } = inbound else {
            panic!("expected a bad action");
        };
        assert_eq!(id, "c4");
        assert_eq!(action, "teleport");
    }
}
