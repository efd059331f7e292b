//! Integration tests for the extension host with a real browser.
//!
//! These launch a headless Chrome/Chromium instance via CDP and drive the
//! dispatcher end to end: navigate, snapshot, act on references, evaluate.
//! They are `#[ignore]` by default because they require a Chrome/Chromium
//! binary installed.
//!
//! Run with:
//!   cargo test -p agentfox-core --test browser_e2e -- --ignored

use std::sync::Arc;

use agentfox_core::ext::background::ExtensionHost;
use agentfox_core::ext::tabs::TabHostConfig;
use agentfox_core::protocol::{Action, Command};
use serde_json::{json, Value};

fn test_host() -> Arc<ExtensionHost> {
    ExtensionHost::new(TabHostConfig {
        headless: true,
        ..Default::default()
    })
}

async fn run(host: &Arc<ExtensionHost>, id: &str, action: Action, params: Value) -> Value {
    let response = host
        .handle_command(Command {
            id: id.into(),
            action,
            params,
        })
        .await;
    assert!(
        response.success,
        "command {id} failed: {:?}",
        response.error
    );
    response.result.unwrap_or_default()
}

fn fixture_url(html: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("page.html");
    std::fs::write(&path, html).expect("write fixture");
    let url = format!("file://{}", path.display());
    (dir, url)
}

const PAGE: &str = r#"<!doctype html>
<html>
<head><title>Fixture Page</title></head>
<body>
  <h1>Fixture Page</h1>
  <form>
    <label for="name">Name</label>
    <input type="text" id="name" placeholder="Your name">
    <button type="button" id="go" onclick="document.getElementById('out').textContent = 'clicked'">Submit</button>
  </form>
  <p id="out"></p>
</body>
</html>"#;

#[tokio::test]
#[ignore]
async fn navigate_snapshot_click_roundtrip() {
    let host = test_host();
    let (_dir, url) = fixture_url(PAGE);

    let nav = run(&host, "c1", Action::Navigate, json!({ "url": url })).await;
    assert_eq!(nav["title"], "Fixture Page");

    let snapshot = run(&host, "c2", Action::Snapshot, json!({})).await;
    assert_eq!(snapshot["tree"]["role"], "document");

    // Find the Submit button's reference in the serialized tree.
    fn find_ref<'a>(node: &'a Value, name: &str) -> Option<&'a str> {
        if node["name"] == name {
            if let Some(r) = node["ref"].as_str() {
                return Some(r);
            }
        }
        node["children"]
            .as_array()
            .into_iter()
            .flatten()
            .find_map(|child| find_ref(child, name))
    }
    let button_ref = find_ref(&snapshot["tree"], "Submit").expect("Submit button ref");

    run(&host, "c3", Action::Click, json!({ "ref": button_ref })).await;

    let content = run(&host, "c4", Action::PageContent, json!({})).await;
    assert!(content["text"].as_str().unwrap().contains("clicked"));
}

#[tokio::test]
#[ignore]
async fn references_go_stale_after_a_reload() {
    let host = test_host();
    let (_dir, url) = fixture_url(PAGE);

    run(&host, "c1", Action::Navigate, json!({ "url": url })).await;
    let snapshot = run(&host, "c2", Action::Snapshot, json!({})).await;
    let tree = serde_json::to_string(&snapshot["tree"]).unwrap();
    assert!(tree.contains("\"ref\""));

    // Reload wipes the document; every old reference must now fail with the
    // distinct stale/unknown message.
    run(&host, "c3", Action::Navigate, json!({ "url": url })).await;
    let response = host
        .handle_command(Command {
            id: "c4".into(),
            action: Action::Click,
            params: json!({ "ref": "e0" }),
        })
        .await;
    assert!(!response.success);
    let error = response.error.unwrap();
    assert!(
        error.contains("snapshot"),
        "error should direct to a new snapshot: {error}"
    );
}

#[tokio::test]
#[ignore]
async fn type_fills_the_labelled_input() {
    let host = test_host();
    let (_dir, url) = fixture_url(PAGE);

    run(&host, "c1", Action::Navigate, json!({ "url": url })).await;
    let snapshot = run(&host, "c2", Action::Snapshot, json!({})).await;

    fn find_by_role<'a>(node: &'a Value, role: &str) -> Option<&'a Value> {
        if node["role"] == role {
            return Some(node);
        }
        node["children"]
            .as_array()
            .into_iter()
            .flatten()
            .find_map(|child| find_by_role(child, role))
    }
    let textbox = find_by_role(&snapshot["tree"], "textbox").expect("textbox");
    assert_eq!(textbox["name"], "Name");
    let textbox_ref = textbox["ref"].as_str().unwrap();

    run(
        &host,
        "c3",
        Action::Type,
        json!({ "ref": textbox_ref, "text": "Ada" }),
    )
    .await;

    let value = run(
        &host,
        "c4",
        Action::Evaluate,
        json!({ "function": "(el) => el.value", "ref": textbox_ref }),
    )
    .await;
    assert_eq!(value["value"], "Ada");
}

#[tokio::test]
#[ignore]
async fn evaluate_truncates_oversized_results() {
    let host = test_host();
    let (_dir, url) = fixture_url(PAGE);

    run(&host, "c1", Action::Navigate, json!({ "url": url })).await;
    let result = run(
        &host,
        "c2",
        Action::Evaluate,
        json!({ "function": "() => 'x'.repeat(2000000)" }),
    )
    .await;
    assert_eq!(
        result["value"],
        "[Result truncated: serialized size 2000002 bytes exceeds 1MB limit]"
    );
}

#[tokio::test]
#[ignore]
async fn wait_for_sees_text_added_by_mutation() {
    let host = test_host();
    let (_dir, url) = fixture_url(PAGE);

    run(&host, "c1", Action::Navigate, json!({ "url": url })).await;
    run(
        &host,
        "c2",
        Action::Evaluate,
        json!({
            "function": "() => { setTimeout(() => { const p = document.createElement('p'); p.textContent = 'Hello'; document.body.appendChild(p); }, 300); }"
        }),
    )
    .await;

    let outcome = run(
        &host,
        "c3",
        Action::WaitFor,
        json!({ "text": "Hello", "time": 5 }),
    )
    .await;
    assert_eq!(outcome["matched"], true);
}

#[tokio::test]
#[ignore]
async fn internal_pages_report_content_unavailable() {
    let host = test_host();

    // A fresh host sits on about:blank; content commands must refuse it.
    let response = host
        .handle_command(Command {
            id: "c1".into(),
            action: Action::Snapshot,
            params: json!({}),
        })
        .await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("Content script unavailable"));
}
