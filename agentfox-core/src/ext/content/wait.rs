//! wait_for: text appearance/disappearance with a debounced observer.
//!
//! A pure delay resolves after sleeping. Text conditions check the body
//! immediately, then watch DOM mutations with a 100 ms debounce; the time
//! budget doubles as the overall timeout and resolves `matched: false` on
//! expiry.

use std::time::Duration;

use chromiumoxide::Page;
use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::protocol::WaitForParams;

use super::eval_to_json;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEBOUNCE_MS: u64 = 100;

const WAIT_JS: &str = r#"
(args) => {
    const satisfied = () => {
        const body = document.body ? document.body.innerText : "";
        if (args.text !== null && !body.includes(args.text)) return false;
        if (args.textGone !== null && body.includes(args.textGone)) return false;
        return true;
    };

    if (satisfied()) return Promise.resolve({ matched: true });

    return new Promise((resolve) => {
        let debounce = null;
        let done = false;
        const finish = (matched) => {
            if (done) return;
            done = true;
            observer.disconnect();
            clearTimeout(overall);
            if (debounce) clearTimeout(debounce);
            resolve({ matched: matched });
        };
        const observer = new MutationObserver(() => {
            if (debounce) clearTimeout(debounce);
            debounce = setTimeout(() => {
                if (satisfied()) finish(true);
            }, args.debounceMs);
        });
        observer.observe(document.documentElement, {
            childList: true,
            subtree: true,
            characterData: true,
            attributes: true,
        });
        const overall = setTimeout(() => finish(false), args.timeoutMs);
    });
}
"#;

pub async fn wait_for(page: &Page, params: WaitForParams) -> Result<Value, DispatchError> {
    let budget = params
        .time
        .map(|seconds| Duration::from_secs_f64(seconds.max(0.0)))
        .unwrap_or(DEFAULT_TIMEOUT);

    // Pure delay: no condition to watch, just sleep it out.
    if params.text.is_none() && params.text_gone.is_none() {
        tokio::time::sleep(budget).await;
        return Ok(json!({ "matched": true }));
    }

    let args = json!({
        "text": params.text,
        "textGone": params.text_gone,
        "timeoutMs": budget.as_millis() as u64,
        "debounceMs": DEBOUNCE_MS,
    });
    let expr = format!(
        "Promise.resolve(({})({})).then((r) => JSON.stringify(r))",
        WAIT_JS, args
    );

    // Rust-side guard slightly above the in-page timeout.
    let outcome = tokio::time::timeout(budget + Duration::from_secs(2), eval_to_json(page, expr))
        .await
        .map_err(|_| DispatchError::Other("wait_for timed out".to_string()))??;

    Ok(json!({
        "matched": outcome.get("matched").and_then(Value::as_bool).unwrap_or(false)
    }))
}
