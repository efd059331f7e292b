//! Raw DOM capture.
//!
//! One embedded walker collects per-element facts from the live document —
//! tag, attributes, text runs in child order, live form state, and the
//! cheapest visibility signals — and stamps each element with a marker
//! attribute so later commands can find it again. Every semantic decision
//! (roles, names, hiding, flattening) happens afterwards in Rust.

use std::collections::HashMap;

use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::DispatchError;

use super::tree::{MAX_DEPTH, MAX_NODES};

/// One captured element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNode {
    /// Upper-case tag name, as the DOM reports it.
    pub tag: String,
    pub attrs: HashMap<String, String>,
    /// Value of the marker attribute stamped by the walker.
    pub marker: Option<u64>,
    /// The element has no offset parent (and is not the body).
    pub no_offset_parent: bool,
    /// Computed display/visibility hides the element. Only sampled when
    /// `no_offset_parent` is set; computed style is expensive.
    pub computed_hidden: bool,
    /// Live form value (inputs, textareas, selects).
    pub value: Option<String>,
    /// Live checked state (checkbox/radio inputs).
    pub checked: Option<bool>,
    /// Live selected state (option elements).
    pub selected: Option<bool>,
    pub children: Vec<RawChild>,
}

/// Element and text children interleaved in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawChild {
    Element(RawNode),
    Text(RawText),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawText {
    pub text: String,
}

impl RawNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }
}

/// A whole-page capture.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCapture {
    pub root: Option<RawNode>,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub truncated: bool,
}

/// The walker. Tags in the non-content set are not descended into at all;
/// the same rule is enforced again by the tree builder on fixtures.
const WALKER_JS: &str = r#"
(args) => {
    const SKIP = new Set(["SCRIPT", "STYLE", "NOSCRIPT", "TEMPLATE", "SVG", "IFRAME"]);
    const MARKER = "data-agentfox-id";
    let nodeCount = 0;
    let truncated = false;
    window.__agentfoxNextId = window.__agentfoxNextId || 1;

    const mark = (el) => {
        let value = el.getAttribute(MARKER);
        if (!value) {
            value = String(window.__agentfoxNextId++);
            el.setAttribute(MARKER, value);
        }
        return parseInt(value, 10);
    };

    const capture = (el, depth) => {
        if (depth > args.maxDepth) return null;
        if (nodeCount >= args.maxNodes) { truncated = true; return null; }
        nodeCount++;

        const attrs = {};
        for (const a of el.attributes) attrs[a.name] = a.value;

        const node = {
            tag: el.tagName,
            attrs: attrs,
            marker: mark(el),
            noOffsetParent: el.offsetParent === null && el !== document.body,
            computedHidden: false,
            value: null,
            checked: null,
            selected: null,
            children: [],
        };

        if (node.noOffsetParent) {
            const cs = getComputedStyle(el);
            node.computedHidden = cs.display === "none" || cs.visibility === "hidden";
        }

        if (el instanceof HTMLInputElement) {
            node.value = el.value;
            if (el.type === "checkbox" || el.type === "radio") node.checked = el.checked;
        } else if (el instanceof HTMLTextAreaElement) {
            node.value = el.value;
        } else if (el instanceof HTMLSelectElement) {
            const opt = el.selectedOptions.length ? el.selectedOptions[0] : null;
            node.value = opt ? opt.textContent.trim() : "";
        } else if (el instanceof HTMLOptionElement) {
            node.selected = el.selected;
        }

        for (const child of el.childNodes) {
            if (child.nodeType === Node.TEXT_NODE) {
                const text = child.data;
                if (text && text.trim()) node.children.push({ kind: "text", text: text });
            } else if (child.nodeType === Node.ELEMENT_NODE) {
                if (SKIP.has(child.tagName)) continue;
                const captured = capture(child, depth + 1);
                if (captured) node.children.push(Object.assign({ kind: "element" }, captured));
            }
        }
        return node;
    };

    const root = document.body ? capture(document.body, 0) : null;
    return {
        root: root,
        url: location.href,
        title: document.title,
        truncated: truncated,
    };
}
"#;

/// Run the walker in the page and decode the capture.
pub async fn capture_dom(page: &Page) -> Result<RawCapture, DispatchError> {
    let args = json!({ "maxDepth": MAX_DEPTH, "maxNodes": MAX_NODES });
    let expr = format!("JSON.stringify(({})({}))", WALKER_JS, args);
    let raw = super::eval_to_json(page, expr).await?;
    serde_json::from_value(raw).map_err(DispatchError::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_child_wire_shape_matches_the_walker() {
        let parsed: RawChild = serde_json::from_value(json!({
            "kind": "element",
            "tag": "BUTTON",
            "attrs": {"id": "go"},
            "marker": 4,
            "children": [{"kind": "text", "text": "Go"}],
        }))
        .unwrap();
        let RawChild::Element(node) = parsed else {
            panic!("expected element");
        };
        assert_eq!(node.tag, "BUTTON");
        assert_eq!(node.marker, Some(4));
        assert_eq!(node.children.len(), 1);
        assert!(matches!(node.children[0], RawChild::Text(_)));
    }

    #[test]
    fn capture_decodes_with_missing_optionals() {
        let capture: RawCapture = serde_json::from_value(json!({
            "root": {"tag": "BODY", "attrs": {}, "children": []},
            "url": "https://example.com/",
            "title": "Example Domain",
        }))
        .unwrap();
        assert!(!capture.truncated);
        assert_eq!(capture.root.unwrap().tag, "BODY");
    }
}
