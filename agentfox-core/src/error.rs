//! Domain errors crossing the gateway/broker/browser boundaries.
//!
//! Transport faults are converted into these before they reach the next
//! layer; the gateway never shows a raw socket or CDP error to the agent.

use thiserror::Error;

/// Recoverable, user-visible failure modes of the bridge.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// No relay has attached to the broker socket yet.
    #[error("Browser extension not connected. Open the browser and enable the AgentFox extension, then retry.")]
    NeverConnected,

    /// A relay was attached earlier in this session but the link dropped.
    #[error("Browser extension disconnected. Re-enable the AgentFox extension in the browser, then retry.")]
    Disconnected,

    /// The command outlived the broker's per-command timeout.
    #[error("Command {id} timed out after {seconds}s")]
    Timeout { id: String, seconds: u64 },

    /// The browser side answered with `success=false`.
    #[error("{0}")]
    Command(String),

    /// A framed message violated the dialect (oversized or malformed).
    #[error("Framing violation on the extension link: {0}")]
    Framing(String),

    /// The socket write failed while a client was attached.
    #[error("Failed to reach the extension relay: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Convert into the MCP-visible error, keeping the message verbatim.
    pub fn into_tool_error(self) -> pmcp::Error {
        pmcp::Error::internal(self.to_string())
    }
}

/// Errors raised inside the browser-side dispatcher and content layer.
///
/// These never cross a process boundary as Rust values; they are flattened
/// into the `error` string of a `CommandResponse`.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Malformed {action} parameters: {detail}")]
    BadParams { action: String, detail: String },

    /// Internal or blank pages have no scriptable document.
    #[error("Content script unavailable on this page ({url}). Navigate to a regular web page first.")]
    ContentUnavailable { url: String },

    #[error("Unknown element reference {0}. Take a new snapshot to get current references.")]
    UnknownRef(String),

    /// The backing element left the document since the snapshot.
    #[error("Element reference {0} is stale: the element is no longer in the document. Take a new snapshot.")]
    StaleRef(String),

    /// fill_form declared one control kind but the element is another.
    #[error("Element {r#ref} is not a {expected}: found {found}")]
    FieldMismatch {
        r#ref: String,
        expected: String,
        found: String,
    },

    #[error("No option matching {0:?} in this select element")]
    NoSuchOption(String),

    #[error("The tab was closed during navigation")]
    TabClosed,

    #[error("Navigation did not complete within {0}s")]
    NavTimeout(u64),

    #[error("PDF export is not supported by this browser session: {0}")]
    PdfUnsupported(String),

    #[error("{0}")]
    Other(String),
}

impl DispatchError {
    pub fn other(err: impl std::fmt::Display) -> Self {
        DispatchError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_and_unknown_refs_are_distinct() {
        let stale = DispatchError::StaleRef("e3".into()).to_string();
        let unknown = DispatchError::UnknownRef("e3".into()).to_string();
        assert_ne!(stale, unknown);
        assert!(stale.contains("snapshot"));
        assert!(unknown.contains("snapshot"));
    }

    #[test]
    fn never_connected_and_disconnected_are_distinct() {
        assert_ne!(
            BridgeError::NeverConnected.to_string(),
            BridgeError::Disconnected.to_string()
        );
    }
}
