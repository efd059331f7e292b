//! Wire protocol: commands, responses, IPC envelopes.
//!
//! A [`Command`] flows from the MCP gateway through the broker and relay to
//! the browser side; a [`CommandResponse`] with the same correlation ID walks
//! back. Both travel inside an [`IpcEnvelope`] on the stream socket and bare
//! (command / response JSON) on the native-messaging link.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of browser operations.
///
/// The serialized tag doubles as the MCP tool name. Dispatch code matches on
/// this enum exhaustively; unknown tags fail at deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Navigate,
    NavigateBack,
    Snapshot,
    Screenshot,
    Click,
    #[serde(rename = "type")]
    Type,
    PressKey,
    Hover,
    FillForm,
    SelectOption,
    Evaluate,
    WaitFor,
    Tabs,
    Close,
    Resize,
    GetCookies,
    GetBookmarks,
    GetHistory,
    NetworkRequests,
    SavePdf,
    HandleDialog,
    PageContent,
}

impl Action {
    /// Whether this action must run inside the page's document (content
    /// layer) rather than against browser APIs.
    pub fn is_page_interaction(self) -> bool {
        matches!(
            self,
            Action::Snapshot
                | Action::Click
                | Action::Type
                | Action::PressKey
                | Action::Hover
                | Action::FillForm
                | Action::SelectOption
                | Action::Evaluate
                | Action::WaitFor
                | Action::PageContent
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Reuse the serde tag so logs and tool names agree.
        let tag = serde_json::to_value(self).expect("action tag");
        f.write_str(tag.as_str().unwrap_or("unknown"))
    }
}

/// A request addressed to the browser side.
///
/// `params` is carried verbatim from the tool call; the dispatcher narrows it
/// into the per-action parameter type below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub action: Action,
    #[serde(default)]
    pub params: Value,
}

/// The reply for a [`Command`], correlated by `id`.
///
/// Exactly one of `result` and `error` is populated; `success` says which.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Messages on the broker's stream socket.
///
/// Only the broker originates pings; either end answers with a pong.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcEnvelope {
    Command { command: Command },
    Response { response: CommandResponse },
    Ping,
    Pong,
}

// ---------------------------------------------------------------------------
// Per-action parameter records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateParams {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl Default for MouseButton {
    fn default() -> Self {
        MouseButton::Left
    }
}

impl MouseButton {
    /// DOM `MouseEvent.button` code.
    pub fn code(self) -> u8 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickParams {
    #[serde(rename = "ref")]
    pub r#ref: String,
    #[serde(default)]
    pub button: MouseButton,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default, rename = "doubleClick")]
    pub double_click: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeParams {
    #[serde(rename = "ref")]
    pub r#ref: String,
    pub text: String,
    #[serde(default)]
    pub submit: bool,
    #[serde(default)]
    pub slowly: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressKeyParams {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoverParams {
    #[serde(rename = "ref")]
    pub r#ref: String,
}

/// Declared control kind for one fill-form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Textbox,
    Checkbox,
    Radio,
    Combobox,
    Slider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    #[serde(rename = "ref")]
    pub r#ref: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillFormParams {
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOptionParams {
    #[serde(rename = "ref")]
    pub r#ref: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateParams {
    pub function: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitForParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, rename = "textGone", skip_serializing_if = "Option::is_none")]
    pub text_gone: Option<String>,
    /// Seconds; doubles as the overall timeout when text conditions are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
    Png,
    Jpeg,
}

impl Default for ScreenshotFormat {
    fn default() -> Self {
        ScreenshotFormat::Png
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScreenshotParams {
    #[serde(default, rename = "type")]
    pub format: ScreenshotFormat,
    #[serde(default, rename = "fullPage")]
    pub full_page: bool,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabsVerb {
    List,
    New,
    Close,
    Select,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabsParams {
    pub action: TabsVerb,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GetCookiesParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GetBookmarksParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GetHistoryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, rename = "maxResults", skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkVerb {
    Start,
    Stop,
    Get,
    Clear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRequestsParams {
    pub action: NetworkVerb,
    /// Substring filter applied to request URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SavePdfParams {
    #[serde(default, rename = "headerText", skip_serializing_if = "Option::is_none")]
    pub header_text: Option<String>,
    #[serde(default, rename = "footerText", skip_serializing_if = "Option::is_none")]
    pub footer_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleDialogParams {
    pub accept: bool,
    #[serde(default, rename = "promptText", skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageContentParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

// ---------------------------------------------------------------------------
// Native-messaging host manifest
// ---------------------------------------------------------------------------

/// The manifest the external installer writes into the browser's
/// native-messaging directory. Defined here so the installer and the relay
/// agree on field names; the host name must match the manifest file basename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeHostManifest {
    pub name: String,
    pub description: String,
    /// Absolute path to the relay binary.
    pub path: String,
    /// Always `"stdio"`.
    #[serde(rename = "type")]
    pub transport: String,
    #[serde(rename = "allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_tags_round_trip() {
        for (action, tag) in [
            (Action::Navigate, "navigate"),
            (Action::NavigateBack, "navigate_back"),
            (Action::Type, "type"),
            (Action::PressKey, "press_key"),
            (Action::NetworkRequests, "network_requests"),
            (Action::PageContent, "page_content"),
        ] {
            assert_eq!(serde_json::to_value(action).unwrap(), json!(tag));
            let back: Action = serde_json::from_value(json!(tag)).unwrap();
            assert_eq!(back, action);
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_value::<Action>(json!("teleport")).is_err());
    }

    #[test]
    fn envelope_wire_shape() {
        let env = IpcEnvelope::Command {
            command: Command {
                id: "c1".into(),
                action: Action::Navigate,
                params: json!({"url": "https://example.com"}),
            },
        };
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["type"], "command");
        assert_eq!(v["command"]["id"], "c1");
        assert_eq!(v["command"]["action"], "navigate");

        let ping: IpcEnvelope = serde_json::from_value(json!({"type": "ping"})).unwrap();
        assert!(matches!(ping, IpcEnvelope::Ping));
    }

    #[test]
    fn response_carries_result_xor_error() {
        let ok = CommandResponse::ok("c2", json!({}));
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["success"], true);
        assert!(v.get("error").is_none());

        let err = CommandResponse::err("c2", "boom");
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["success"], false);
        assert!(v.get("result").is_none());
        assert_eq!(v["error"], "boom");
    }

    #[test]
    fn click_params_defaults() {
        let p: ClickParams = serde_json::from_value(json!({"ref": "e0"})).unwrap();
        assert_eq!(p.button, MouseButton::Left);
        assert!(!p.double_click);
        assert!(p.modifiers.is_empty());
        assert_eq!(MouseButton::Right.code(), 2);
    }

    #[test]
    fn manifest_field_names() {
        let m = NativeHostManifest {
            name: "agentfox".into(),
            description: "AgentFox native-messaging relay".into(),
            path: "/usr/local/bin/agentfox-relay".into(),
            transport: "stdio".into(),
            allowed_extensions: vec!["agentfox@example.org".into()],
        };
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["type"], "stdio");
        assert!(v["allowed_extensions"].is_array());
    }
}
