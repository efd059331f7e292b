//! Accessibility-tree builder.
//!
//! Projects a captured DOM into the semantic tree the agent reads: ARIA-like
//! roles, accessible names, state bits, and references on interactive
//! elements. Generic nameless wrappers are flattened away so the tree stays
//! text-shaped. Everything here is pure and unit-tested on fixtures.

use std::collections::HashMap;

use serde::Serialize;

use super::capture::{RawCapture, RawChild, RawNode};
use super::refs::RefMap;

/// Nodes deeper than this are dropped.
pub const MAX_DEPTH: usize = 100;
/// Traversal stops once this many elements have been visited.
pub const MAX_NODES: usize = 50_000;
/// Accessible names and text runs are truncated to this many characters.
const TEXT_MAX: usize = 200;

/// Tags that never contribute content.
const NON_CONTENT_TAGS: &[&str] = &["SCRIPT", "STYLE", "NOSCRIPT", "TEMPLATE", "SVG", "IFRAME"];

/// Standard interactive tags.
const INTERACTIVE_TAGS: &[&str] = &["A", "BUTTON", "INPUT", "TEXTAREA", "SELECT"];

/// Explicit roles that make an element interactive.
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "checkbox", "radio", "textbox", "combobox", "slider", "switch", "tab",
    "menuitem", "menuitemcheckbox", "menuitemradio", "option", "treeitem", "searchbox",
    "spinbutton",
];

/// Tags whose text content may serve as the accessible name.
const CONTENT_NAMING_TAGS: &[&str] = &[
    "A", "BUTTON", "H1", "H2", "H3", "H4", "H5", "H6", "LABEL", "LEGEND", "OPTION", "LI", "TD",
    "TH",
];

/// One node of the agent-visible tree.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AxNode {
    pub role: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AxNode>,
}

impl AxNode {
    fn text(content: String) -> Self {
        Self {
            role: "text".into(),
            name: content,
            ..Default::default()
        }
    }
}

/// Build the tree for a capture, resetting and refilling the reference map.
///
/// The map is cleared before the first reference is assigned, so a build is
/// atomic with respect to reference resolution.
pub fn build_tree(capture: &RawCapture, refs: &mut RefMap) -> AxNode {
    build_tree_with_limits(capture, refs, MAX_DEPTH, MAX_NODES)
}

pub(crate) fn build_tree_with_limits(
    capture: &RawCapture,
    refs: &mut RefMap,
    max_depth: usize,
    max_nodes: usize,
) -> AxNode {
    refs.reset();

    let mut root = AxNode {
        role: "document".into(),
        name: capture.title.clone(),
        ..Default::default()
    };

    let mut truncated = capture.truncated;
    if let Some(ref body) = capture.root {
        let index = DocumentIndex::build(body);
        let mut builder = Builder {
            refs,
            index,
            visited: 0,
            max_depth,
            max_nodes,
            truncated: false,
        };
        root.children = builder.walk(body, 0, None);
        truncated |= builder.truncated;
    }

    if truncated {
        root.children
            .push(AxNode::text("(page content truncated: node limit reached)".into()));
    }

    root
}

/// Document-order indexes needed for cross-element name resolution.
struct DocumentIndex<'a> {
    by_id: HashMap<&'a str, &'a RawNode>,
    label_for: HashMap<&'a str, &'a RawNode>,
}

impl<'a> DocumentIndex<'a> {
    fn build(root: &'a RawNode) -> Self {
        let mut index = Self {
            by_id: HashMap::new(),
            label_for: HashMap::new(),
        };
        index.scan(root);
        index
    }

    fn scan(&mut self, node: &'a RawNode) {
        if let Some(id) = node.attr("id") {
            self.by_id.entry(id).or_insert(node);
        }
        if node.tag == "LABEL" {
            if let Some(target) = node.attr("for") {
                self.label_for.entry(target).or_insert(node);
            }
        }
        for child in &node.children {
            if let RawChild::Element(el) = child {
                self.scan(el);
            }
        }
    }
}

struct Builder<'a, 'b> {
    refs: &'b mut RefMap,
    index: DocumentIndex<'a>,
    visited: usize,
    max_depth: usize,
    max_nodes: usize,
    truncated: bool,
}

impl<'a, 'b> Builder<'a, 'b> {
    /// What this element contributes to its parent's child list: itself,
    /// its promoted children (flattened generic), or nothing.
    fn walk(&mut self, raw: &'a RawNode, depth: usize, label: Option<&'a RawNode>) -> Vec<AxNode> {
        if NON_CONTENT_TAGS.contains(&raw.tag.as_str()) || is_hidden(raw) {
            return Vec::new();
        }
        if depth > self.max_depth {
            return Vec::new();
        }
        if self.visited >= self.max_nodes {
            self.truncated = true;
            return Vec::new();
        }
        self.visited += 1;

        let role = derive_role(raw);
        let interactive = is_interactive(raw);
        let name = accessible_name(raw, &role, label, &self.index);

        // Pre-order assignment keeps reference numbering in document order.
        let ref_id = if interactive {
            raw.marker.map(|marker| self.refs.assign(marker))
        } else {
            None
        };

        let inner_label = if raw.tag == "LABEL" { Some(raw) } else { label };
        let mut children = Vec::new();
        for child in &raw.children {
            match child {
                RawChild::Text(text) => {
                    let trimmed = collapse_ws(&text.text);
                    if trimmed.is_empty() || trimmed == name {
                        continue;
                    }
                    children.push(AxNode::text(truncate(&trimmed)));
                }
                RawChild::Element(el) => {
                    children.extend(self.walk(el, depth + 1, inner_label));
                }
            }
        }

        // Generic flattening: a nameless, non-interactive, non-semantic node
        // is erased and its children take its place.
        if role == "generic" && !interactive && name.is_empty() {
            return children;
        }

        let mut node = AxNode {
            role,
            name,
            ref_id,
            children,
            ..Default::default()
        };
        apply_states(raw, &mut node);
        node.description = description(raw, &node.name, &self.index);
        vec![node]
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

fn is_hidden(raw: &RawNode) -> bool {
    if raw.has_attr("hidden") {
        return true;
    }
    if raw.attr("aria-hidden") == Some("true") {
        return true;
    }
    if let Some(style) = raw.attr("style") {
        if inline_style_hides(style) {
            return true;
        }
    }
    // Computed style was only sampled where the cheap signals said "maybe".
    raw.tag != "BODY" && raw.no_offset_parent && raw.computed_hidden
}

fn inline_style_hides(style: &str) -> bool {
    style.split(';').any(|decl| {
        let mut parts = decl.splitn(2, ':');
        let (Some(prop), Some(value)) = (parts.next(), parts.next()) else {
            return false;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value.trim().to_ascii_lowercase();
        (prop == "display" && value == "none") || (prop == "visibility" && value == "hidden")
    })
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

fn derive_role(raw: &RawNode) -> String {
    if let Some(role) = raw.attr("role") {
        if let Some(first) = role.split_whitespace().next() {
            return first.to_string();
        }
    }

    let tag = raw.tag.as_str();
    match tag {
        "H1" | "H2" | "H3" | "H4" | "H5" | "H6" => "heading".into(),
        "A" => {
            if raw.has_attr("href") {
                "link".into()
            } else {
                "generic".into()
            }
        }
        "INPUT" => input_role(raw.attr("type").unwrap_or("text")).into(),
        "TEXTAREA" => "textbox".into(),
        "SELECT" => {
            if raw.has_attr("multiple") {
                "listbox".into()
            } else {
                "combobox".into()
            }
        }
        "SECTION" => {
            if raw.has_attr("aria-label") || raw.has_attr("aria-labelledby") || raw.has_attr("title")
            {
                "region".into()
            } else {
                "generic".into()
            }
        }
        "ARTICLE" => "article".into(),
        "BUTTON" => "button".into(),
        "NAV" => "navigation".into(),
        "MAIN" => "main".into(),
        "ASIDE" => "complementary".into(),
        "FOOTER" => "contentinfo".into(),
        "HEADER" => "banner".into(),
        "FORM" => "form".into(),
        "TABLE" => "table".into(),
        "TR" => "row".into(),
        "TD" => "cell".into(),
        "TH" => "columnheader".into(),
        "UL" | "OL" => "list".into(),
        "LI" => "listitem".into(),
        "DIALOG" => "dialog".into(),
        "IMG" => "img".into(),
        "OPTION" => "option".into(),
        _ => "generic".into(),
    }
}

fn input_role(input_type: &str) -> &'static str {
    match input_type.to_ascii_lowercase().as_str() {
        "search" => "searchbox",
        "number" => "spinbutton",
        "range" => "slider",
        "checkbox" => "checkbox",
        "radio" => "radio",
        "submit" | "reset" | "button" | "image" | "file" => "button",
        // text, email, tel, url, password, and anything unrecognised
        _ => "textbox",
    }
}

// ---------------------------------------------------------------------------
// Interactivity
// ---------------------------------------------------------------------------

fn is_interactive(raw: &RawNode) -> bool {
    if INTERACTIVE_TAGS.contains(&raw.tag.as_str()) {
        return true;
    }
    if raw.has_attr("onclick") || raw.has_attr("onmousedown") {
        return true;
    }
    if raw.attr("contenteditable") == Some("true") {
        return true;
    }
    if let Some(tabindex) = raw.attr("tabindex").and_then(|t| t.parse::<i32>().ok()) {
        if tabindex >= 0 {
            return true;
        }
    }
    if let Some(role) = raw.attr("role").and_then(|r| r.split_whitespace().next()) {
        if INTERACTIVE_ROLES.contains(&role) {
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Accessible name
// ---------------------------------------------------------------------------

fn accessible_name(
    raw: &RawNode,
    role: &str,
    wrapping_label: Option<&RawNode>,
    index: &DocumentIndex<'_>,
) -> String {
    if let Some(label) = raw.attr("aria-label") {
        let label = collapse_ws(label);
        if !label.is_empty() {
            return truncate(&label);
        }
    }

    if let Some(ids) = raw.attr("aria-labelledby") {
        let joined = resolve_id_text(ids, index);
        if !joined.is_empty() {
            return truncate(&joined);
        }
    }

    if matches!(raw.tag.as_str(), "INPUT" | "TEXTAREA" | "SELECT") {
        let label = raw
            .attr("id")
            .and_then(|id| index.label_for.get(id).copied())
            .or(wrapping_label);
        if let Some(label) = label {
            let text = text_content(label, true);
            if !text.is_empty() {
                return truncate(&text);
            }
        }
    }

    if raw.tag == "IMG" || role == "img" {
        if let Some(alt) = raw.attr("alt") {
            let alt = collapse_ws(alt);
            if !alt.is_empty() {
                return truncate(&alt);
            }
        }
    }

    if let Some(title) = raw.attr("title") {
        let title = collapse_ws(title);
        if !title.is_empty() {
            return truncate(&title);
        }
    }

    if CONTENT_NAMING_TAGS.contains(&raw.tag.as_str()) || role == "button" || role == "link" {
        let text = text_content(raw, false);
        if !text.is_empty() {
            return truncate(&text);
        }
    }

    if is_text_entry(raw) {
        if let Some(placeholder) = raw.attr("placeholder") {
            let placeholder = collapse_ws(placeholder);
            if !placeholder.is_empty() {
                return truncate(&placeholder);
            }
        }
    }

    if raw.tag == "INPUT" {
        if matches!(
            raw.attr("type").unwrap_or("").to_ascii_lowercase().as_str(),
            "submit" | "reset" | "button"
        ) {
            if let Some(value) = raw.attr("value") {
                let value = collapse_ws(value);
                if !value.is_empty() {
                    return truncate(&value);
                }
            }
        }
    }

    String::new()
}

fn is_text_entry(raw: &RawNode) -> bool {
    if raw.tag == "TEXTAREA" {
        return true;
    }
    raw.tag == "INPUT"
        && matches!(
            input_role(raw.attr("type").unwrap_or("text")),
            "textbox" | "searchbox" | "spinbutton"
        )
}

/// Space-joined text content of the elements behind a whitespace-separated
/// id list.
fn resolve_id_text(ids: &str, index: &DocumentIndex<'_>) -> String {
    let parts: Vec<String> = ids
        .split_whitespace()
        .filter_map(|id| index.by_id.get(id).copied())
        .map(|node| text_content(node, false))
        .filter(|text| !text.is_empty())
        .collect();
    collapse_ws(&parts.join(" "))
}

/// Concatenated descendant text, whitespace-collapsed. With
/// `exclude_controls`, form-control subtrees are skipped (label naming).
fn text_content(raw: &RawNode, exclude_controls: bool) -> String {
    let mut out = String::new();
    collect_text(raw, exclude_controls, &mut out);
    collapse_ws(&out)
}

fn collect_text(raw: &RawNode, exclude_controls: bool, out: &mut String) {
    for child in &raw.children {
        match child {
            RawChild::Text(text) => {
                out.push_str(&text.text);
                out.push(' ');
            }
            RawChild::Element(el) => {
                if NON_CONTENT_TAGS.contains(&el.tag.as_str()) {
                    continue;
                }
                if exclude_controls
                    && matches!(el.tag.as_str(), "INPUT" | "TEXTAREA" | "SELECT" | "BUTTON")
                {
                    continue;
                }
                collect_text(el, exclude_controls, out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

fn apply_states(raw: &RawNode, node: &mut AxNode) {
    let tag = raw.tag.as_str();
    let input_type = raw.attr("type").unwrap_or("text").to_ascii_lowercase();

    if tag == "H1" {
        node.level = Some(1);
    } else if let Some(rest) = raw.tag.strip_prefix('H') {
        if raw.tag.len() == 2 {
            if let Ok(level @ 2..=6) = rest.parse::<u8>() {
                node.level = Some(level);
            }
        }
    }
    if node.role == "heading" && node.level.is_none() {
        node.level = raw
            .attr("aria-level")
            .and_then(|l| l.parse().ok())
            .or(Some(1));
    }

    // Form value, for controls that hold text rather than a checked bit.
    if (tag == "INPUT" && !matches!(input_type.as_str(), "checkbox" | "radio"))
        || tag == "TEXTAREA"
        || tag == "SELECT"
    {
        if let Some(ref value) = raw.value {
            if !value.is_empty() {
                node.value = Some(truncate(&collapse_ws(value)));
            }
        }
    }

    if tag == "INPUT" && matches!(input_type.as_str(), "checkbox" | "radio") {
        node.checked = raw.checked.or(Some(raw.has_attr("checked")));
    } else if let Some(aria) = raw.attr("aria-checked") {
        node.checked = match aria {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        };
    }

    let native_control = matches!(tag, "INPUT" | "TEXTAREA" | "SELECT" | "BUTTON" | "OPTION");
    if (native_control && raw.has_attr("disabled")) || raw.attr("aria-disabled") == Some("true") {
        node.disabled = Some(true);
    }

    if let Some(expanded) = raw.attr("aria-expanded") {
        node.expanded = match expanded {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        };
    }

    if tag == "OPTION" {
        node.selected = raw.selected.or(Some(raw.has_attr("selected")));
    } else if let Some(selected) = raw.attr("aria-selected") {
        node.selected = match selected {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        };
    }

    if (matches!(tag, "INPUT" | "TEXTAREA" | "SELECT") && raw.has_attr("required"))
        || raw.attr("aria-required") == Some("true")
    {
        node.required = Some(true);
    }
}

/// `aria-describedby` targets first; the `title` attribute only when it was
/// not already spent as the accessible name.
fn description(raw: &RawNode, name: &str, index: &DocumentIndex<'_>) -> Option<String> {
    if let Some(ids) = raw.attr("aria-describedby") {
        let text = resolve_id_text(ids, index);
        if !text.is_empty() {
            return Some(truncate(&text));
        }
    }
    if let Some(title) = raw.attr("title") {
        let title = collapse_ws(title);
        if !title.is_empty() && title != name {
            return Some(truncate(&title));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= TEXT_MAX {
        return text.to_string();
    }
    let mut out: String = text.chars().take(TEXT_MAX).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn el(tag: &str, attrs: &[(&str, &str)], children: Vec<RawChild>) -> RawNode {
        RawNode {
            tag: tag.into(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Map<_, _>>(),
            marker: Some(0),
            children,
            ..Default::default()
        }
    }

    fn child(node: RawNode) -> RawChild {
        RawChild::Element(node)
    }

    fn text(content: &str) -> RawChild {
        RawChild::Text(super::super::capture::RawText {
            text: content.into(),
        })
    }

    fn capture(body: RawNode) -> RawCapture {
        // Markers need to be unique for reference assignment.
        fn number(node: &mut RawNode, next: &mut u64) {
            node.marker = Some(*next);
            *next += 1;
            for child in &mut node.children {
                if let RawChild::Element(el) = child {
                    number(el, next);
                }
            }
        }
        let mut body = body;
        let mut next = 1;
        number(&mut body, &mut next);
        RawCapture {
            root: Some(body),
            url: "https://example.com/".into(),
            title: "Example Domain".into(),
            truncated: false,
        }
    }

    fn build(body: RawNode) -> (AxNode, RefMap) {
        let mut refs = RefMap::new();
        let tree = build_tree(&capture(body), &mut refs);
        (tree, refs)
    }

    #[test]
    fn empty_body_yields_document_with_no_children() {
        let (tree, refs) = build(el("BODY", &[], vec![]));
        assert_eq!(tree.role, "document");
        assert_eq!(tree.name, "Example Domain");
        assert!(tree.children.is_empty());
        assert!(refs.is_empty());
    }

    #[test]
    fn roles_follow_the_priority_order() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el("H2", &[], vec![text("Title")])),
                child(el("A", &[("href", "/x")], vec![text("Go")])),
                child(el("A", &[], vec![text("Nowhere")])),
                child(el("INPUT", &[("type", "range")], vec![])),
                child(el("SELECT", &[("multiple", "")], vec![])),
                child(el("SELECT", &[], vec![])),
                child(el("NAV", &[], vec![child(el("UL", &[], vec![child(el("LI", &[], vec![text("One")]))]))])),
                child(el("DIV", &[("role", "alert")], vec![text("Careful")])),
            ],
        );
        let (tree, _) = build(body);
        let roles: Vec<&str> = tree.children.iter().map(|c| c.role.as_str()).collect();
        // The href-less anchor demotes to generic but stays (anchors are
        // interactive by tag, so it is never flattened).
        assert_eq!(
            roles,
            vec!["heading", "link", "generic", "slider", "listbox", "combobox", "navigation", "alert"]
        );
        assert_eq!(tree.children[2].name, "Nowhere");
        assert_eq!(tree.children[0].level, Some(2));
        let nav = &tree.children[6];
        assert_eq!(nav.children[0].role, "list");
        assert_eq!(nav.children[0].children[0].role, "listitem");
        assert_eq!(nav.children[0].children[0].name, "One");
    }

    #[test]
    fn input_type_table_is_closed() {
        for (ty, role) in [
            ("text", "textbox"),
            ("email", "textbox"),
            ("password", "textbox"),
            ("search", "searchbox"),
            ("number", "spinbutton"),
            ("range", "slider"),
            ("checkbox", "checkbox"),
            ("radio", "radio"),
            ("submit", "button"),
            ("file", "button"),
            ("unknowable", "textbox"),
        ] {
            assert_eq!(input_role(ty), role, "type {ty}");
        }
    }

    #[test]
    fn name_precedence_aria_label_first() {
        let body = el(
            "BODY",
            &[],
            vec![child(el(
                "BUTTON",
                &[("aria-label", "Close dialog"), ("title", "ignored")],
                vec![text("X")],
            ))],
        );
        let (tree, _) = build(body);
        assert_eq!(tree.children[0].name, "Close dialog");
        // The inner "X" is not equal to the name, so it stays as a child.
        assert_eq!(tree.children[0].children[0].name, "X");
    }

    #[test]
    fn name_from_labelledby_targets() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el("SPAN", &[("id", "a")], vec![text("First")])),
                child(el("SPAN", &[("id", "b")], vec![text("Last")])),
                child(el(
                    "INPUT",
                    &[("type", "text"), ("aria-labelledby", "a b")],
                    vec![],
                )),
            ],
        );
        let (tree, _) = build(body);
        let input = tree
            .children
            .iter()
            .find(|c| c.role == "textbox")
            .expect("textbox");
        assert_eq!(input.name, "First Last");
    }

    #[test]
    fn name_from_for_label_excludes_nested_controls() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el(
                    "LABEL",
                    &[("for", "mail")],
                    vec![text("Email"), child(el("INPUT", &[("type", "text"), ("id", "mail")], vec![]))],
                )),
            ],
        );
        let (tree, _) = build(body);
        let label = &tree.children[0];
        // LABEL has no mapped role, but its text content names it, so it is
        // not flattened; the equal text child is deduplicated away.
        assert_eq!(label.role, "generic");
        assert_eq!(label.name, "Email");
        assert_eq!(label.children.len(), 1);
        let input = &label.children[0];
        assert_eq!(input.role, "textbox");
        assert_eq!(input.name, "Email");
    }

    #[test]
    fn wrapping_label_names_the_control() {
        let body = el(
            "BODY",
            &[],
            vec![child(el(
                "LABEL",
                &[],
                vec![
                    text("Subscribe"),
                    child(el("INPUT", &[("type", "checkbox")], vec![])),
                ],
            ))],
        );
        let (tree, _) = build(body);
        let checkbox = &tree.children[0].children[0];
        assert_eq!(checkbox.role, "checkbox");
        assert_eq!(checkbox.name, "Subscribe");
    }

    #[test]
    fn name_fallbacks_placeholder_and_submit_value() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el(
                    "INPUT",
                    &[("type", "text"), ("placeholder", "Search the docs")],
                    vec![],
                )),
                child(el("INPUT", &[("type", "submit"), ("value", "Send")], vec![])),
                child(el("IMG", &[("alt", "A fox")], vec![])),
            ],
        );
        let (tree, _) = build(body);
        assert_eq!(tree.children[0].name, "Search the docs");
        assert_eq!(tree.children[1].name, "Send");
        assert_eq!(tree.children[2].name, "A fox");
    }

    #[test]
    fn long_text_content_is_truncated_with_ellipsis() {
        let long = "x".repeat(300);
        let body = el("BODY", &[], vec![child(el("BUTTON", &[], vec![text(&long)]))]);
        let (tree, _) = build(body);
        let name = &tree.children[0].name;
        assert_eq!(name.chars().count(), TEXT_MAX + 1);
        assert!(name.ends_with('…'));
    }

    #[test]
    fn generic_wrappers_flatten_away() {
        let body = el(
            "BODY",
            &[],
            vec![child(el(
                "DIV",
                &[],
                vec![child(el(
                    "DIV",
                    &[],
                    vec![
                        child(el("BUTTON", &[], vec![text("One")])),
                        child(el("BUTTON", &[], vec![text("Two")])),
                    ],
                ))],
            ))],
        );
        let (tree, refs) = build(body);
        // Both wrappers vanish; the buttons land directly under the document.
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].name, "One");
        assert_eq!(tree.children[1].name, "Two");
        assert_eq!(tree.children[0].ref_id.as_deref(), Some("e0"));
        assert_eq!(tree.children[1].ref_id.as_deref(), Some("e1"));
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn empty_generic_is_dropped_entirely() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el("DIV", &[], vec![])),
                child(el("P", &[], vec![text("kept")])),
            ],
        );
        let (tree, _) = build(body);
        // The paragraph itself is a nameless generic, so only its text stays.
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].role, "text");
        assert_eq!(tree.children[0].name, "kept");
    }

    #[test]
    fn text_equal_to_the_name_is_not_duplicated() {
        let body = el("BODY", &[], vec![child(el("BUTTON", &[], vec![text("Save")]))]);
        let (tree, _) = build(body);
        let button = &tree.children[0];
        assert_eq!(button.name, "Save");
        assert!(button.children.is_empty());
    }

    #[test]
    fn hidden_nodes_are_skipped() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el("P", &[("hidden", "")], vec![text("one")])),
                child(el("P", &[("aria-hidden", "true")], vec![text("two")])),
                child(el("P", &[("style", "display: none")], vec![text("three")])),
                child(el("P", &[("style", "visibility:hidden")], vec![text("four")])),
                child(RawNode {
                    no_offset_parent: true,
                    computed_hidden: true,
                    ..el("P", &[], vec![text("five")])
                }),
                child(el("P", &[], vec![text("visible")])),
            ],
        );
        let (tree, _) = build(body);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "visible");
    }

    #[test]
    fn fixed_position_elements_are_not_hidden_without_computed_proof() {
        // position:fixed has no offset parent but is perfectly visible.
        let body = el(
            "BODY",
            &[],
            vec![child(RawNode {
                no_offset_parent: true,
                computed_hidden: false,
                ..el("BUTTON", &[], vec![text("Menu")])
            })],
        );
        let (tree, _) = build(body);
        assert_eq!(tree.children[0].name, "Menu");
    }

    #[test]
    fn non_content_tags_are_dropped() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el("SCRIPT", &[], vec![text("var x = 1;")])),
                child(el("TEMPLATE", &[], vec![child(el("BUTTON", &[], vec![text("no")]))])),
                child(el("P", &[], vec![text("yes")])),
            ],
        );
        let (tree, _) = build(body);
        assert_eq!(tree.children.len(), 1);
    }

    #[test]
    fn interactivity_signals_assign_references_in_document_order() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el("BUTTON", &[], vec![text("b")])),
                child(el("DIV", &[("onclick", "go()")], vec![text("clickable div")])),
                child(el("DIV", &[("contenteditable", "true")], vec![text("editor")])),
                child(el("DIV", &[("tabindex", "0")], vec![text("focusable")])),
                child(el("DIV", &[("tabindex", "-1")], vec![text("not focusable")])),
                child(el("SPAN", &[("role", "menuitem")], vec![text("item")])),
            ],
        );
        let (tree, refs) = build(body);
        let refs_in_order: Vec<Option<&str>> = tree
            .children
            .iter()
            .map(|c| c.ref_id.as_deref())
            .collect();
        assert_eq!(
            refs_in_order,
            vec![Some("e0"), Some("e1"), Some("e2"), Some("e3"), None, Some("e4")]
        );
        assert_eq!(refs.len(), 5);
    }

    #[test]
    fn states_are_extracted() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(RawNode {
                    checked: Some(true),
                    ..el("INPUT", &[("type", "checkbox"), ("required", "")], vec![])
                }),
                child(el("BUTTON", &[("disabled", ""), ("aria-expanded", "false")], vec![text("More")])),
                child(RawNode {
                    selected: Some(true),
                    ..el("OPTION", &[], vec![text("Red")])
                }),
                child(RawNode {
                    value: Some("hello".into()),
                    ..el("INPUT", &[("type", "text")], vec![])
                }),
                child(el("DIV", &[("role", "button"), ("aria-disabled", "true")], vec![text("Fake")])),
            ],
        );
        let (tree, _) = build(body);
        assert_eq!(tree.children[0].checked, Some(true));
        assert_eq!(tree.children[0].required, Some(true));
        assert_eq!(tree.children[1].disabled, Some(true));
        assert_eq!(tree.children[1].expanded, Some(false));
        assert_eq!(tree.children[2].selected, Some(true));
        assert_eq!(tree.children[3].value.as_deref(), Some("hello"));
        assert_eq!(tree.children[4].disabled, Some(true));
    }

    #[test]
    fn description_prefers_describedby_and_skips_spent_title() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el("P", &[("id", "hint")], vec![text("Use your work address")])),
                child(el(
                    "INPUT",
                    &[("type", "email"), ("aria-describedby", "hint")],
                    vec![],
                )),
                // Title is the name here, so it must not repeat as description.
                child(el("BUTTON", &[("title", "Settings")], vec![])),
            ],
        );
        let (tree, _) = build(body);
        let input = tree
            .children
            .iter()
            .find(|c| c.role == "textbox")
            .expect("textbox");
        assert_eq!(input.description.as_deref(), Some("Use your work address"));
        let button = tree.children.iter().find(|c| c.role == "button").unwrap();
        assert_eq!(button.name, "Settings");
        assert!(button.description.is_none());
    }

    #[test]
    fn section_is_region_only_when_named() {
        let body = el(
            "BODY",
            &[],
            vec![
                child(el("SECTION", &[("aria-label", "Billing")], vec![text("x")])),
                child(el("SECTION", &[], vec![child(el("P", &[], vec![text("y")]))])),
            ],
        );
        let (tree, _) = build(body);
        assert_eq!(tree.children[0].role, "region");
        // The unnamed section flattens like any generic, as does its
        // paragraph, leaving bare text.
        assert_eq!(tree.children[1].role, "text");
        assert_eq!(tree.children[1].name, "y");
    }

    #[test]
    fn depth_cap_drops_deep_nodes() {
        let mut node = el("BUTTON", &[], vec![text("deep")]);
        for _ in 0..6 {
            node = el("ARTICLE", &[], vec![child(node)]);
        }
        let body = el("BODY", &[], vec![child(node)]);
        let mut refs = RefMap::new();
        let tree = build_tree_with_limits(&capture(body), &mut refs, 4, MAX_NODES);
        // The chain survives to the cap; the button beyond it is gone.
        fn depth_of(node: &AxNode) -> usize {
            node.children.first().map(|c| 1 + depth_of(c)).unwrap_or(0)
        }
        assert!(depth_of(&tree) <= 5);
        assert!(refs.is_empty());
    }

    #[test]
    fn node_cap_appends_truncation_notice() {
        let children: Vec<RawChild> = (0..20)
            .map(|i| child(el("P", &[], vec![text(&format!("p{i}"))])))
            .collect();
        let body = el("BODY", &[], children);
        let mut refs = RefMap::new();
        let tree = build_tree_with_limits(&capture(body), &mut refs, MAX_DEPTH, 10);
        let last = tree.children.last().unwrap();
        assert_eq!(last.role, "text");
        assert!(last.name.contains("truncated"));
        assert!(tree.children.len() < 21);
    }

    #[test]
    fn walker_truncation_flag_also_appends_notice() {
        let mut cap = capture(el("BODY", &[], vec![]));
        cap.truncated = true;
        let mut refs = RefMap::new();
        let tree = build_tree(&cap, &mut refs);
        assert_eq!(tree.children.last().unwrap().role, "text");
    }

    #[test]
    fn serialized_tree_uses_ref_and_skips_empty_fields() {
        let body = el("BODY", &[], vec![child(el("BUTTON", &[], vec![text("Submit")]))]);
        let (tree, _) = build(body);
        let v = serde_json::to_value(&tree).unwrap();
        assert_eq!(v["children"][0]["ref"], "e0");
        assert_eq!(v["children"][0]["role"], "button");
        assert!(v["children"][0].get("level").is_none());
        assert!(v["children"][0].get("children").is_none());
    }
}
