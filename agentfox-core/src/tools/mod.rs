//! Tool registration for all browser automation tools.
//!
//! Each module defines one tool: an input type carrying the JSON schema and
//! validation rules, and an `execute` that forwards the arguments verbatim
//! as a command to the broker. The shared [`dispatch`] helper implements the
//! gateway contract: wait briefly for an attached extension, assign a fresh
//! correlation ID, submit, and unwrap the correlated response.

pub mod click;
pub mod close;
pub mod evaluate;
pub mod fill_form;
pub mod get_bookmarks;
pub mod get_cookies;
pub mod get_history;
pub mod handle_dialog;
pub mod hover;
pub mod navigate;
pub mod navigate_back;
pub mod network_requests;
pub mod press_key;
pub mod resize;
pub mod save_pdf;
pub mod screenshot;
pub mod select_option;
pub mod snapshot;
pub mod tabs;
pub mod type_text;
pub mod wait_for;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pmcp::TypedTool;
use serde_json::Value;

use crate::broker::SocketBroker;
use crate::protocol::{Action, Command};

/// How long a tool call waits for an extension to attach before failing with
/// a connection error. Calls are never silently queued beyond this.
const ATTACH_WAIT: Duration = Duration::from_secs(5);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Fresh correlation ID, unique for the process lifetime.
fn next_correlation_id() -> String {
    format!("c{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Submit one command through the broker and unwrap its response.
///
/// On a `success=false` response the error string is surfaced verbatim as
/// the tool error; transport conditions arrive already translated into the
/// user-visible connection messages.
pub async fn dispatch(
    broker: &Arc<SocketBroker>,
    action: Action,
    params: Value,
) -> Result<Value, pmcp::Error> {
    broker
        .wait_for_connection(ATTACH_WAIT)
        .await
        .map_err(|e| e.into_tool_error())?;

    let command = Command {
        id: next_correlation_id(),
        action,
        params,
    };
    let response = broker
        .send_command(command)
        .await
        .map_err(|e| e.into_tool_error())?;

    if response.success {
        Ok(response.result.unwrap_or_else(|| Value::Object(Default::default())))
    } else {
        Err(pmcp::Error::internal(
            response
                .error
                .unwrap_or_else(|| "command failed without an error message".to_string()),
        ))
    }
}

/// Register all browser tools onto the server builder.
///
/// Each tool captures an `Arc<SocketBroker>` for command submission.
pub fn register_tools(
    builder: pmcp::ServerBuilder,
    broker: Arc<SocketBroker>,
) -> pmcp::ServerBuilder {
    // --- Navigation & tabs ---

    let b = broker.clone();
    let builder = builder.tool(
        "navigate",
        TypedTool::new("navigate", move |input: navigate::NavigateInput, _extra| {
            let b = b.clone();
            Box::pin(async move { navigate::execute(&b, input).await })
        })
        .with_description("Navigate the current tab to a URL. Returns the final URL and title."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "navigate_back",
        TypedTool::new(
            "navigate_back",
            move |input: navigate_back::NavigateBackInput, _extra| {
                let b = b.clone();
                Box::pin(async move { navigate_back::execute(&b, input).await })
            },
        )
        .with_description("Go back one entry in the tab's history."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "tabs",
        TypedTool::new("tabs", move |input: tabs::TabsInput, _extra| {
            let b = b.clone();
            Box::pin(async move { tabs::execute(&b, input).await })
        })
        .with_description("List, open, close, or select browser tabs."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "close",
        TypedTool::new("close", move |input: close::CloseInput, _extra| {
            let b = b.clone();
            Box::pin(async move { close::execute(&b, input).await })
        })
        .with_description("Close the current tab."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "resize",
        TypedTool::new("resize", move |input: resize::ResizeInput, _extra| {
            let b = b.clone();
            Box::pin(async move { resize::execute(&b, input).await })
        })
        .with_description("Resize the browser viewport to the given width and height."),
    );

    // --- Reading the page ---

    let b = broker.clone();
    let builder = builder.tool(
        "snapshot",
        TypedTool::new("snapshot", move |input: snapshot::SnapshotInput, _extra| {
            let b = b.clone();
            Box::pin(async move { snapshot::execute(&b, input).await })
        })
        .with_description(
            "Capture the accessibility tree of the current page. Interactive elements carry \
             references (e0, e1, ...) usable by click, type, and the other action tools until \
             the next snapshot or navigation.",
        ),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "screenshot",
        TypedTool::new(
            "screenshot",
            move |input: screenshot::ScreenshotInput, _extra| {
                let b = b.clone();
                Box::pin(async move { screenshot::execute(&b, input).await })
            },
        )
        .with_description("Take a screenshot of the viewport, the full page, or one element."),
    );

    // --- Acting on the page ---

    let b = broker.clone();
    let builder = builder.tool(
        "click",
        TypedTool::new("click", move |input: click::ClickInput, _extra| {
            let b = b.clone();
            Box::pin(async move { click::execute(&b, input).await })
        })
        .with_description("Click an element by its snapshot reference."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "type",
        TypedTool::new("type", move |input: type_text::TypeInput, _extra| {
            let b = b.clone();
            Box::pin(async move { type_text::execute(&b, input).await })
        })
        .with_description(
            "Type text into an element by its snapshot reference, optionally submitting with Enter.",
        ),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "press_key",
        TypedTool::new(
            "press_key",
            move |input: press_key::PressKeyInput, _extra| {
                let b = b.clone();
                Box::pin(async move { press_key::execute(&b, input).await })
            },
        )
        .with_description("Press a keyboard key in the focused element. Examples: 'Enter', 'Tab', 'a'."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "hover",
        TypedTool::new("hover", move |input: hover::HoverInput, _extra| {
            let b = b.clone();
            Box::pin(async move { hover::execute(&b, input).await })
        })
        .with_description("Hover over an element by its snapshot reference."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "fill_form",
        TypedTool::new(
            "fill_form",
            move |input: fill_form::FillFormInput, _extra| {
                let b = b.clone();
                Box::pin(async move { fill_form::execute(&b, input).await })
            },
        )
        .with_description(
            "Fill several form fields in one call. Per-field failures are reported alongside \
             the count of fields that succeeded; the batch never aborts.",
        ),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "select_option",
        TypedTool::new(
            "select_option",
            move |input: select_option::SelectOptionInput, _extra| {
                let b = b.clone();
                Box::pin(async move { select_option::execute(&b, input).await })
            },
        )
        .with_description("Select one or more options in a select element, by option text or value."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "evaluate",
        TypedTool::new("evaluate", move |input: evaluate::EvaluateInput, _extra| {
            let b = b.clone();
            Box::pin(async move { evaluate::execute(&b, input).await })
        })
        .with_description(
            "Evaluate a JavaScript function in the page, optionally against one element. \
             The function runs in the page's main world.",
        ),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "wait_for",
        TypedTool::new("wait_for", move |input: wait_for::WaitForInput, _extra| {
            let b = b.clone();
            Box::pin(async move { wait_for::execute(&b, input).await })
        })
        .with_description(
            "Wait for text to appear or disappear, or for a fixed number of seconds.",
        ),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "handle_dialog",
        TypedTool::new(
            "handle_dialog",
            move |input: handle_dialog::HandleDialogInput, _extra| {
                let b = b.clone();
                Box::pin(async move { handle_dialog::execute(&b, input).await })
            },
        )
        .with_description(
            "Accept or dismiss a blocking JavaScript dialog (alert, confirm, prompt).",
        ),
    );

    // --- Browser data & diagnostics ---

    let b = broker.clone();
    let builder = builder.tool(
        "get_cookies",
        TypedTool::new(
            "get_cookies",
            move |input: get_cookies::GetCookiesInput, _extra| {
                let b = b.clone();
                Box::pin(async move { get_cookies::execute(&b, input).await })
            },
        )
        .with_description("Read cookies, optionally scoped to a URL."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "get_bookmarks",
        TypedTool::new(
            "get_bookmarks",
            move |input: get_bookmarks::GetBookmarksInput, _extra| {
                let b = b.clone();
                Box::pin(async move { get_bookmarks::execute(&b, input).await })
            },
        )
        .with_description("Search the browser's bookmarks."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "get_history",
        TypedTool::new(
            "get_history",
            move |input: get_history::GetHistoryInput, _extra| {
                let b = b.clone();
                Box::pin(async move { get_history::execute(&b, input).await })
            },
        )
        .with_description("Search the browsing history with optional query and time bounds."),
    );

    let b = broker.clone();
    let builder = builder.tool(
        "network_requests",
        TypedTool::new(
            "network_requests",
            move |input: network_requests::NetworkRequestsInput, _extra| {
                let b = b.clone();
                Box::pin(async move { network_requests::execute(&b, input).await })
            },
        )
        .with_description("Start, stop, read, or clear recording of the tab's network requests."),
    );

    let b = broker;
    builder.tool(
        "save_pdf",
        TypedTool::new("save_pdf", move |input: save_pdf::SavePdfInput, _extra| {
            let b = b.clone();
            Box::pin(async move { save_pdf::execute(&b, input).await })
        })
        .with_description("Export the current page as a PDF file with optional header/footer text."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_unique_and_prefixed() {
        let a = next_correlation_id();
        let b = next_correlation_id();
        assert_ne!(a, b);
        assert!(a.starts_with('c') && b.starts_with('c'));
    }
}
