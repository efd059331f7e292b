//! Main-world script evaluation.
//!
//! The user's function is not run by the automation layer directly: a
//! `<script>` element is injected into the document so the code executes in
//! the page's main world, and the result comes back on a uniquely named
//! window event. Serialization limits are enforced where the value lives,
//! inside the page.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::protocol::EvaluateParams;

use super::super::background::ExtensionHost;
use super::eval_to_json;

/// Overall evaluate budget, independent of the broker's command timeout.
const EVAL_TIMEOUT: Duration = Duration::from_secs(30);

static NEXT_CHANNEL: AtomicU64 = AtomicU64::new(1);

/// The content-side shim: marks the optional target element, injects the
/// user function wrapped in an async IIFE, and waits for the result event.
const EVAL_SHIM_JS: &str = r#"
async (args) => {
    let target = null;
    if (args.id !== null) {
        target = document.querySelector(`[data-agentfox-id="${args.id}"]`);
        if (!target || !target.isConnected) return { error: "stale" };
        target.setAttribute("data-agentfox-eval", "");
    }

    const cleanup = () => {
        if (target) target.removeAttribute("data-agentfox-eval");
        if (script.parentNode) script.parentNode.removeChild(script);
    };

    const script = document.createElement("script");
    script.textContent = `
        (async () => {
            const serialize = (value) => {
                if (value instanceof Node) return "[DOM Node: " + (value.tagName || value.nodeName) + "]";
                if (value === undefined) return null;
                let text;
                try {
                    text = JSON.stringify(value);
                } catch (e) {
                    try { return String(value); } catch (e2) { return "[Unserializable result]"; }
                }
                if (text === undefined) {
                    try { return String(value); } catch (e) { return "[Unserializable result]"; }
                }
                if (text.length > 1048576) {
                    return "[Result truncated: serialized size " + text.length + " bytes exceeds 1MB limit]";
                }
                return JSON.parse(text);
            };
            let detail;
            try {
                const fn = (${FN});
                if (typeof fn !== "function") throw new Error("evaluate requires a function expression");
                const target = document.querySelector("[data-agentfox-eval]");
                const value = await fn(target);
                detail = { ok: true, value: serialize(value) };
            } catch (err) {
                detail = { error: { message: String(err && err.message ? err.message : err) } };
            }
            window.dispatchEvent(new CustomEvent(${CHANNEL}, { detail: detail }));
        })();
    `;

    return await new Promise((resolve) => {
        const onResult = (event) => {
            cleanup();
            resolve(event.detail || { error: { message: "evaluation produced no result" } });
        };
        window.addEventListener(${CHANNEL}, onResult, { once: true });
        (document.head || document.documentElement).appendChild(script);
    });
}
"#;

pub async fn evaluate(
    host: &Arc<ExtensionHost>,
    page: &Page,
    params: EvaluateParams,
) -> Result<Value, DispatchError> {
    let channel = format!(
        "agentfox-eval-{}",
        NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed)
    );
    let channel_literal = serde_json::to_string(&channel).map_err(DispatchError::other)?;

    let marker = match params.r#ref {
        Some(ref ref_id) => json!(host.content.marker_for(ref_id)?),
        None => Value::Null,
    };

    // The user function and channel name are spliced into the shim before
    // the shim itself is parameterised with the marker.
    let shim = EVAL_SHIM_JS
        .replace("${FN}", &escape_for_template(&params.function))
        .replace("${CHANNEL}", &channel_literal);
    let args = json!({ "id": marker });
    let expr = format!("({})({}).then((r) => JSON.stringify(r))", shim, args);

    let outcome = tokio::time::timeout(EVAL_TIMEOUT, eval_to_json(page, expr))
        .await
        .map_err(|_| DispatchError::Other("Evaluation timed out after 30s".to_string()))??;

    if let Some(error) = outcome.get("error") {
        if error.as_str() == Some("stale") {
            let ref_id = params.r#ref.as_deref().unwrap_or_default();
            host.content.evict(ref_id);
            return Err(DispatchError::StaleRef(ref_id.to_string()));
        }
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("evaluation failed");
        return Err(DispatchError::Other(format!("Evaluation error: {message}")));
    }

    Ok(json!({ "value": outcome.get("value").cloned().unwrap_or(Value::Null) }))
}

/// The user function is inlined into a backtick template; backslashes,
/// backticks, and `${` must not terminate it early.
fn escape_for_template(function: &str) -> String {
    function
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_escaping_neutralises_backticks_and_interpolation() {
        let escaped = escape_for_template("() => `${document.title}`");
        assert!(!escaped.contains("${d"));
        assert!(escaped.contains("\\`"));
        assert!(escaped.contains("\\${"));
    }

    #[test]
    fn channel_names_are_unique() {
        let a = NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed);
        let b = NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed);
        assert_ne!(a, b);
    }
}
