//! Element actions: click, type, press key, hover, fill form, select.
//!
//! Each handler resolves its reference through the map, then drives the
//! element with a synthesized event sequence built as embedded JavaScript
//! and parameterised with a JSON argument literal. Script results follow a
//! tiny protocol: `{ ok: true, ... }` or `{ error: ... }` with a code the
//! Rust side maps onto the error taxonomy.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::protocol::{
    ClickParams, FillFormParams, HoverParams, PressKeyParams, SelectOptionParams, TypeParams,
};

use super::super::background::ExtensionHost;
use super::eval_to_json;

/// Generous bound for action scripts; slow typing of long text dominates.
const ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Run an action script against a referenced element and translate the
/// result protocol. Evicts the reference when the page reports staleness.
async fn run_on_ref(
    host: &Arc<ExtensionHost>,
    page: &Page,
    ref_id: &str,
    js: &str,
    mut args: Value,
) -> Result<Value, DispatchError> {
    let marker = host.content.marker_for(ref_id)?;
    args["id"] = json!(marker);

    let expr = format!("({})({}).then((r) => JSON.stringify(r))", js, args);
    let result = tokio::time::timeout(ACTION_TIMEOUT, eval_to_json(page, expr))
        .await
        .map_err(|_| DispatchError::Other(format!("action timed out on {ref_id}")))??;

    translate_result(host, ref_id, result)
}

fn translate_result(
    host: &Arc<ExtensionHost>,
    ref_id: &str,
    result: Value,
) -> Result<Value, DispatchError> {
    match result.get("error") {
        None => Ok(result),
        Some(Value::String(code)) if code == "stale" => {
            host.content.evict(ref_id);
            Err(DispatchError::StaleRef(ref_id.to_string()))
        }
        Some(Value::Object(detail)) => {
            let code = detail.get("code").and_then(Value::as_str).unwrap_or("");
            match code {
                "mismatch" => Err(DispatchError::FieldMismatch {
                    r#ref: ref_id.to_string(),
                    expected: detail
                        .get("expected")
                        .and_then(Value::as_str)
                        .unwrap_or("different control")
                        .to_string(),
                    found: detail
                        .get("found")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                }),
                "nooption" => Err(DispatchError::NoSuchOption(
                    detail
                        .get("value")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                )),
                _ => Err(DispatchError::Other(
                    detail
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("action failed")
                        .to_string(),
                )),
            }
        }
        Some(other) => Err(DispatchError::Other(other.to_string())),
    }
}

const CLICK_JS: &str = r#"
async (args) => {
    const el = document.querySelector(`[data-agentfox-id="${args.id}"]`);
    if (!el || !el.isConnected) return { error: "stale" };
    el.scrollIntoView({ block: "center", inline: "center", behavior: "instant" });
    const rect = el.getBoundingClientRect();
    const base = {
        bubbles: true,
        cancelable: true,
        clientX: rect.left + rect.width / 2,
        clientY: rect.top + rect.height / 2,
        button: args.button,
        shiftKey: args.modifiers.includes("Shift"),
        ctrlKey: args.modifiers.includes("Control"),
        altKey: args.modifiers.includes("Alt"),
        metaKey: args.modifiers.includes("Meta"),
    };
    const sequence = (detail) => {
        const opts = Object.assign({ detail: detail }, base);
        el.dispatchEvent(new PointerEvent("pointerdown", opts));
        el.dispatchEvent(new MouseEvent("mousedown", opts));
        el.dispatchEvent(new PointerEvent("pointerup", opts));
        el.dispatchEvent(new MouseEvent("mouseup", opts));
        el.dispatchEvent(new MouseEvent("click", opts));
    };
    sequence(1);
    if (args.doubleClick) {
        sequence(2);
        el.dispatchEvent(new MouseEvent("dblclick", Object.assign({ detail: 2 }, base)));
    }
    if (typeof el.focus === "function") el.focus();
    return { ok: true };
}
"#;

pub async fn click(
    host: &Arc<ExtensionHost>,
    page: &Page,
    params: ClickParams,
) -> Result<Value, DispatchError> {
    let args = json!({
        "button": params.button.code(),
        "modifiers": params.modifiers,
        "doubleClick": params.double_click,
    });
    run_on_ref(host, page, &params.r#ref, CLICK_JS, args).await?;
    Ok(json!({}))
}

const TYPE_JS: &str = r#"
async (args) => {
    const el = document.querySelector(`[data-agentfox-id="${args.id}"]`);
    if (!el || !el.isConnected) return { error: "stale" };
    el.focus();
    const isText = el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement;
    if (isText) {
        if (args.slowly) {
            el.value = "";
            el.dispatchEvent(new Event("input", { bubbles: true }));
            for (const ch of args.text) {
                el.dispatchEvent(new KeyboardEvent("keydown", { key: ch, bubbles: true }));
                el.value += ch;
                el.dispatchEvent(new Event("input", { bubbles: true }));
                el.dispatchEvent(new KeyboardEvent("keyup", { key: ch, bubbles: true }));
                await new Promise((resolve) => setTimeout(resolve, 30));
            }
        } else {
            if (typeof el.select === "function") el.select();
            el.value = args.text;
            el.dispatchEvent(new Event("input", { bubbles: true }));
        }
        el.dispatchEvent(new Event("change", { bubbles: true }));
    } else if (el.isContentEditable) {
        const range = document.createRange();
        range.selectNodeContents(el);
        const selection = getSelection();
        selection.removeAllRanges();
        selection.addRange(range);
        document.execCommand("insertText", false, args.text);
    } else {
        return { error: { code: "mismatch", expected: "text input", found: el.tagName.toLowerCase() } };
    }
    if (args.submit) {
        const enter = { key: "Enter", code: "Enter", keyCode: 13, bubbles: true };
        el.dispatchEvent(new KeyboardEvent("keydown", enter));
        el.dispatchEvent(new KeyboardEvent("keyup", enter));
        const form = el.closest ? el.closest("form") : null;
        if (form) {
            if (typeof form.requestSubmit === "function") form.requestSubmit();
            else form.submit();
        }
    }
    return { ok: true };
}
"#;

pub async fn type_text(
    host: &Arc<ExtensionHost>,
    page: &Page,
    params: TypeParams,
) -> Result<Value, DispatchError> {
    let args = json!({
        "text": params.text,
        "submit": params.submit,
        "slowly": params.slowly,
    });
    run_on_ref(host, page, &params.r#ref, TYPE_JS, args).await?;
    Ok(json!({}))
}

const PRESS_KEY_JS: &str = r#"
async (args) => {
    const target = document.activeElement || document.body;
    const opts = { key: args.key, code: args.code, keyCode: args.keyCode, bubbles: true, cancelable: true };
    target.dispatchEvent(new KeyboardEvent("keydown", opts));
    target.dispatchEvent(new KeyboardEvent("keyup", opts));
    return { ok: true };
}
"#;

/// Map a key name to its DOM `code` value: letters become `Key<UPPER>`,
/// digits `Digit<d>`, a small punctuation table, named keys unchanged.
fn key_code(key: &str) -> (String, i32) {
    let mut chars = key.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphabetic() {
            let upper = ch.to_ascii_uppercase();
            return (format!("Key{upper}"), upper as i32);
        }
        if ch.is_ascii_digit() {
            return (format!("Digit{ch}"), ch as i32);
        }
        let punct = match ch {
            '.' => "Period",
            ',' => "Comma",
            ';' => "Semicolon",
            '\'' => "Quote",
            '[' => "BracketLeft",
            ']' => "BracketRight",
            '/' => "Slash",
            '\\' => "Backslash",
            '-' => "Minus",
            '=' => "Equal",
            '`' => "Backquote",
            ' ' => "Space",
            _ => "",
        };
        if !punct.is_empty() {
            return (punct.to_string(), 0);
        }
    }
    let key_code = match key {
        "Enter" => 13,
        "Tab" => 9,
        "Escape" => 27,
        "Backspace" => 8,
        "Delete" => 46,
        _ => 0,
    };
    (key.to_string(), key_code)
}

pub async fn press_key(page: &Page, params: PressKeyParams) -> Result<Value, DispatchError> {
    let (code, key_code) = key_code(&params.key);
    let args = json!({ "key": params.key, "code": code, "keyCode": key_code });
    let expr = format!("({})({}).then((r) => JSON.stringify(r))", PRESS_KEY_JS, args);
    eval_to_json(page, expr).await?;
    Ok(json!({}))
}

const HOVER_JS: &str = r#"
async (args) => {
    const el = document.querySelector(`[data-agentfox-id="${args.id}"]`);
    if (!el || !el.isConnected) return { error: "stale" };
    el.scrollIntoView({ block: "center", inline: "center", behavior: "instant" });
    const rect = el.getBoundingClientRect();
    const at = {
        cancelable: true,
        clientX: rect.left + rect.width / 2,
        clientY: rect.top + rect.height / 2,
    };
    const bubbling = Object.assign({ bubbles: true }, at);
    el.dispatchEvent(new PointerEvent("pointerenter", at));
    el.dispatchEvent(new PointerEvent("pointerover", bubbling));
    el.dispatchEvent(new PointerEvent("pointermove", bubbling));
    el.dispatchEvent(new MouseEvent("mouseenter", at));
    el.dispatchEvent(new MouseEvent("mouseover", bubbling));
    el.dispatchEvent(new MouseEvent("mousemove", bubbling));
    return { ok: true };
}
"#;

pub async fn hover(
    host: &Arc<ExtensionHost>,
    page: &Page,
    params: HoverParams,
) -> Result<Value, DispatchError> {
    run_on_ref(host, page, &params.r#ref, HOVER_JS, json!({})).await?;
    Ok(json!({}))
}

const FILL_FIELD_JS: &str = r#"
async (args) => {
    const el = document.querySelector(`[data-agentfox-id="${args.id}"]`);
    if (!el || !el.isConnected) return { error: "stale" };
    const mismatch = { error: { code: "mismatch", expected: args.kind, found: el.tagName.toLowerCase() } };
    const fire = (type) => el.dispatchEvent(new Event(type, { bubbles: true }));
    switch (args.kind) {
        case "textbox": {
            if (!(el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement)) return mismatch;
            el.focus();
            el.value = String(args.value);
            fire("input");
            fire("change");
            break;
        }
        case "checkbox": {
            if (!(el instanceof HTMLInputElement) || el.type !== "checkbox") return mismatch;
            if (el.checked !== Boolean(args.value)) el.click();
            break;
        }
        case "radio": {
            if (!(el instanceof HTMLInputElement) || el.type !== "radio") return mismatch;
            if (!el.checked) el.click();
            break;
        }
        case "combobox": {
            if (!(el instanceof HTMLSelectElement)) return mismatch;
            const wanted = String(args.value);
            const options = Array.from(el.options);
            let option = options.find((o) => o.textContent.trim() === wanted);
            if (!option) option = options.find((o) => o.value === wanted);
            if (!option) return { error: { code: "nooption", value: wanted } };
            el.value = option.value;
            fire("change");
            break;
        }
        case "slider": {
            if (!(el instanceof HTMLInputElement) || el.type !== "range") return mismatch;
            el.value = String(args.value);
            fire("input");
            fire("change");
            break;
        }
        default:
            return { error: { message: "unsupported field type: " + args.kind } };
    }
    return { ok: true };
}
"#;

/// Fill fields one by one; per-field failures are collected, never fatal.
pub async fn fill_form(
    host: &Arc<ExtensionHost>,
    page: &Page,
    params: FillFormParams,
) -> Result<Value, DispatchError> {
    let mut filled = 0usize;
    let mut errors: Vec<Value> = Vec::new();

    for field in &params.fields {
        let kind = serde_json::to_value(field.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let args = json!({ "kind": kind, "value": field.value });
        match run_on_ref(host, page, &field.r#ref, FILL_FIELD_JS, args).await {
            Ok(_) => filled += 1,
            Err(err) => errors.push(json!({ "name": field.name, "error": err.to_string() })),
        }
    }

    let mut result = json!({ "filledCount": filled });
    if !errors.is_empty() {
        result["errors"] = json!(errors);
    }
    Ok(result)
}

const SELECT_OPTION_JS: &str = r#"
async (args) => {
    const el = document.querySelector(`[data-agentfox-id="${args.id}"]`);
    if (!el || !el.isConnected) return { error: "stale" };
    if (!(el instanceof HTMLSelectElement)) {
        return { error: { code: "mismatch", expected: "select", found: el.tagName.toLowerCase() } };
    }
    const options = Array.from(el.options);
    if (el.multiple) for (const option of options) option.selected = false;
    const selected = [];
    for (const wanted of args.values) {
        let option = options.find((o) => o.textContent.trim() === wanted);
        if (!option) option = options.find((o) => o.value === wanted);
        if (!option) return { error: { code: "nooption", value: wanted } };
        option.selected = true;
        selected.push(option.value);
    }
    el.dispatchEvent(new Event("change", { bubbles: true }));
    return { ok: true, selected: selected };
}
"#;

pub async fn select_option(
    host: &Arc<ExtensionHost>,
    page: &Page,
    params: SelectOptionParams,
) -> Result<Value, DispatchError> {
    let args = json!({ "values": params.values });
    let result = run_on_ref(host, page, &params.r#ref, SELECT_OPTION_JS, args).await?;
    Ok(json!({ "selected": result.get("selected").cloned().unwrap_or(json!([])) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_codes_follow_the_mapping() {
        assert_eq!(key_code("a"), ("KeyA".into(), 65));
        assert_eq!(key_code("Z"), ("KeyZ".into(), 90));
        assert_eq!(key_code("5"), ("Digit5".into(), 53));
        assert_eq!(key_code("."), ("Period".into(), 0));
        assert_eq!(key_code("Enter"), ("Enter".into(), 13));
        // Named keys pass through unchanged.
        assert_eq!(key_code("ArrowDown").0, "ArrowDown");
    }
}
