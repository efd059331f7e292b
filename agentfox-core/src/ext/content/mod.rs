//! Page-context command handling.
//!
//! Routes the page-interaction commands onto the active tab's document:
//! snapshots, element actions, evaluate, and waiting. The reference map
//! lives here, owned by the content layer and reset by every snapshot.

pub mod actions;
pub mod capture;
pub mod eval;
pub mod refs;
pub mod tree;
pub mod wait;

use std::sync::Arc;
use std::sync::Mutex;

use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::protocol::{self, Action};

use super::background::{parse, ExtensionHost};
use refs::{RefMap, MARKER_ATTR};

/// Content-layer state: the per-session reference map.
pub struct ContentContext {
    refs: Mutex<RefMap>,
}

impl ContentContext {
    pub fn new() -> Self {
        Self {
            refs: Mutex::new(RefMap::new()),
        }
    }

    /// CSS selector locating the element behind a reference.
    pub fn selector_for(&self, ref_id: &str) -> Result<String, DispatchError> {
        let marker = self
            .refs
            .lock()
            .expect("refs lock")
            .resolve(ref_id)
            .ok_or_else(|| DispatchError::UnknownRef(ref_id.to_string()))?;
        Ok(format!("[{}=\"{}\"]", MARKER_ATTR, marker))
    }

    /// Marker value behind a reference.
    pub(crate) fn marker_for(&self, ref_id: &str) -> Result<u64, DispatchError> {
        self.refs
            .lock()
            .expect("refs lock")
            .resolve(ref_id)
            .ok_or_else(|| DispatchError::UnknownRef(ref_id.to_string()))
    }

    /// Drop a reference whose element is gone.
    pub fn evict(&self, ref_id: &str) {
        self.refs.lock().expect("refs lock").remove(ref_id);
    }
}

impl Default for ContentContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal and blank pages carry no scriptable document.
pub async fn ensure_scriptable(page: &Page) -> Result<(), DispatchError> {
    let url = page
        .url()
        .await
        .map_err(DispatchError::other)?
        .unwrap_or_default();
    if is_scriptable_url(&url) {
        Ok(())
    } else {
        Err(DispatchError::ContentUnavailable { url })
    }
}

fn is_scriptable_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("file://")
}

/// Dispatch one page-interaction command.
pub async fn handle(
    host: &Arc<ExtensionHost>,
    page: &Page,
    action: Action,
    params: Value,
) -> Result<Value, DispatchError> {
    match action {
        Action::Snapshot => snapshot(host, page).await,
        Action::Click => actions::click(host, page, parse(action, params)?).await,
        Action::Type => actions::type_text(host, page, parse(action, params)?).await,
        Action::PressKey => actions::press_key(page, parse(action, params)?).await,
        Action::Hover => actions::hover(host, page, parse(action, params)?).await,
        Action::FillForm => actions::fill_form(host, page, parse(action, params)?).await,
        Action::SelectOption => actions::select_option(host, page, parse(action, params)?).await,
        Action::Evaluate => eval::evaluate(host, page, parse(action, params)?).await,
        Action::WaitFor => wait::wait_for(page, parse(action, params)?).await,
        Action::PageContent => page_content(page, parse(action, params)?).await,
        _ => Err(DispatchError::UnknownAction(action.to_string())),
    }
}

/// Capture the page and build a fresh accessibility tree.
///
/// The reference map is reset inside the build, so the snapshot is atomic:
/// no reference from the previous tree survives it.
async fn snapshot(host: &Arc<ExtensionHost>, page: &Page) -> Result<Value, DispatchError> {
    let captured = capture::capture_dom(page).await?;
    let tree = {
        let mut refs = host.content.refs.lock().expect("refs lock");
        tree::build_tree(&captured, &mut refs)
    };
    Ok(json!({
        "tree": tree,
        "url": captured.url,
        "title": captured.title,
    }))
}

/// Trimmed, whitespace-normalised text of the page or one selector.
async fn page_content(
    page: &Page,
    params: protocol::PageContentParams,
) -> Result<Value, DispatchError> {
    const CONTENT_JS: &str = r#"
(args) => {
    let target = document.body;
    if (args.selector) {
        target = document.querySelector(args.selector);
        if (!target) return { error: "No element matches selector: " + args.selector };
    }
    return {
        text: target ? target.innerText : "",
        url: location.href,
        title: document.title,
    };
}
"#;
    let args = json!({ "selector": params.selector });
    let result = eval_to_json(page, format!("JSON.stringify(({})({}))", CONTENT_JS, args)).await?;
    if let Some(error) = result.get("error").and_then(Value::as_str) {
        return Err(DispatchError::Other(error.to_string()));
    }

    let text = result
        .get("text")
        .and_then(Value::as_str)
        .map(normalize_ws)
        .unwrap_or_default();
    Ok(json!({
        "text": text,
        "url": result.get("url").cloned().unwrap_or_default(),
        "title": result.get("title").cloned().unwrap_or_default(),
    }))
}

fn normalize_ws(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&line.split_whitespace().collect::<Vec<_>>().join(" "));
    }
    out.trim().to_string()
}

/// Evaluate an expression that yields a JSON string, and parse it.
///
/// Promises are awaited, so the expression may be an async call chain ending
/// in `JSON.stringify`.
pub(crate) async fn eval_to_json(page: &Page, expr: String) -> Result<Value, DispatchError> {
    let params = EvaluateParams::builder()
        .expression(expr)
        .return_by_value(true)
        .await_promise(true)
        .build()
        .map_err(DispatchError::Other)?;

    let result = page.evaluate(params).await.map_err(DispatchError::other)?;
    let serialized: String = result
        .into_value()
        .map_err(|err| DispatchError::Other(format!("script returned no value: {err}")))?;
    serde_json::from_str(&serialized).map_err(DispatchError::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scriptable_urls() {
        assert!(is_scriptable_url("https://example.com/a"));
        assert!(is_scriptable_url("http://localhost:8000/"));
        assert!(is_scriptable_url("file:///tmp/page.html"));
        assert!(!is_scriptable_url("about:blank"));
        assert!(!is_scriptable_url("chrome://settings"));
        assert!(!is_scriptable_url("devtools://devtools/bundled"));
        assert!(!is_scriptable_url(""));
    }

    #[test]
    fn normalize_collapses_runs_of_blank_lines_and_spaces() {
        let input = "  Hello   world \n\n\n\n  second    line \n";
        assert_eq!(normalize_ws(input), "Hello world\n\nsecond line");
    }
}
