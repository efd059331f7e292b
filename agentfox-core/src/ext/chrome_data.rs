//! Bookmarks and history readers.
//!
//! CDP has no bookmarks or history domain, so these commands read the
//! Chromium profile on disk: `Bookmarks` is plain JSON, `History` is SQLite.
//! The history database is locked while the browser runs, so it is copied to
//! a temp path before opening.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::protocol::{GetBookmarksParams, GetHistoryParams};

use super::background::ExtensionHost;

/// Microseconds between the Chrome epoch (1601-01-01) and the Unix epoch.
const CHROME_EPOCH_OFFSET_US: i64 = 11_644_473_600_000_000;

fn chrome_time_to_unix_ms(chrome_us: i64) -> i64 {
    (chrome_us - CHROME_EPOCH_OFFSET_US) / 1000
}

fn unix_ms_to_chrome_time(unix_ms: i64) -> i64 {
    unix_ms * 1000 + CHROME_EPOCH_OFFSET_US
}

fn profile_dir(host: &Arc<ExtensionHost>) -> Result<PathBuf, DispatchError> {
    let dir = host.tabs.user_data_dir().ok_or_else(|| {
        DispatchError::Other(
            "Browser profile directory is not known (attached over CDP without --user-data-dir); \
             bookmarks and history are unavailable"
                .to_string(),
        )
    })?;
    Ok(dir.join("Default"))
}

/// Search the profile's bookmarks.
pub async fn get_bookmarks(
    host: &Arc<ExtensionHost>,
    params: GetBookmarksParams,
) -> Result<Value, DispatchError> {
    let path = profile_dir(host)?.join("Bookmarks");

    let bookmarks = tokio::task::spawn_blocking(move || read_bookmarks(&path, params.query))
        .await
        .map_err(DispatchError::other)??;

    Ok(json!({ "bookmarks": bookmarks }))
}

fn read_bookmarks(path: &Path, query: Option<String>) -> Result<Vec<Value>, DispatchError> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        DispatchError::Other(format!("Cannot read bookmarks file {}: {err}", path.display()))
    })?;
    let parsed: Value = serde_json::from_str(&raw).map_err(DispatchError::other)?;

    let needle = query.map(|q| q.to_lowercase());
    let mut out = Vec::new();
    if let Some(roots) = parsed.get("roots").and_then(Value::as_object) {
        for (root_name, root) in roots {
            collect_bookmarks(root, root_name, needle.as_deref(), &mut out);
        }
    }
    Ok(out)
}

fn collect_bookmarks(node: &Value, folder: &str, needle: Option<&str>, out: &mut Vec<Value>) {
    match node.get("type").and_then(Value::as_str) {
        Some("url") => {
            let name = node.get("name").and_then(Value::as_str).unwrap_or_default();
            let url = node.get("url").and_then(Value::as_str).unwrap_or_default();
            if let Some(needle) = needle {
                if !name.to_lowercase().contains(needle) && !url.to_lowercase().contains(needle) {
                    return;
                }
            }
            let date_added = node
                .get("date_added")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i64>().ok())
                .map(chrome_time_to_unix_ms);
            out.push(json!({
                "title": name,
                "url": url,
                "folder": folder,
                "dateAdded": date_added,
            }));
        }
        Some("folder") => {
            let name = node.get("name").and_then(Value::as_str).unwrap_or(folder);
            if let Some(children) = node.get("children").and_then(Value::as_array) {
                for child in children {
                    collect_bookmarks(child, name, needle, out);
                }
            }
        }
        _ => {}
    }
}

/// Search the profile's browsing history.
pub async fn get_history(
    host: &Arc<ExtensionHost>,
    params: GetHistoryParams,
) -> Result<Value, DispatchError> {
    let path = profile_dir(host)?.join("History");

    let items = tokio::task::spawn_blocking(move || read_history(&path, params))
        .await
        .map_err(DispatchError::other)??;

    Ok(json!({ "items": items }))
}

fn read_history(path: &Path, params: GetHistoryParams) -> Result<Vec<Value>, DispatchError> {
    if !path.exists() {
        return Err(DispatchError::Other(format!(
            "History database not found at {}",
            path.display()
        )));
    }

    // Chromium holds the database open with a lock; work from a copy.
    let copy = std::env::temp_dir().join(format!("agentfox-history-{}.db", std::process::id()));
    std::fs::copy(path, &copy).map_err(DispatchError::other)?;

    let result = query_history(&copy, &params);
    let _ = std::fs::remove_file(&copy);
    result
}

fn query_history(copy: &Path, params: &GetHistoryParams) -> Result<Vec<Value>, DispatchError> {
    let conn = rusqlite::Connection::open_with_flags(
        copy,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )
    .map_err(DispatchError::other)?;

    let mut sql = String::from(
        "SELECT url, title, visit_count, last_visit_time FROM urls WHERE hidden = 0",
    );
    let mut binds: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref query) = params.query {
        sql.push_str(" AND (url LIKE ?1 OR title LIKE ?1)");
        binds.push(Box::new(format!("%{}%", query)));
    }
    if let Some(start) = params.start_time {
        sql.push_str(&format!(" AND last_visit_time >= ?{}", binds.len() + 1));
        binds.push(Box::new(unix_ms_to_chrome_time(start)));
    }
    if let Some(end) = params.end_time {
        sql.push_str(&format!(" AND last_visit_time < ?{}", binds.len() + 1));
        binds.push(Box::new(unix_ms_to_chrome_time(end)));
    }
    sql.push_str(" ORDER BY last_visit_time DESC LIMIT ");
    sql.push_str(&params.max_results.unwrap_or(100).to_string());

    let mut stmt = conn.prepare(&sql).map_err(DispatchError::other)?;
    let bind_refs: Vec<&dyn rusqlite::types::ToSql> =
        binds.iter().map(|b| b.as_ref()).collect();

    let rows = stmt
        .query_map(bind_refs.as_slice(), |row| {
            let url: String = row.get(0)?;
            let title: String = row.get(1)?;
            let visit_count: i64 = row.get(2)?;
            let last_visit: i64 = row.get(3)?;
            Ok(json!({
                "url": url,
                "title": title,
                "visitCount": visit_count,
                "lastVisitTime": chrome_time_to_unix_ms(last_visit),
            }))
        })
        .map_err(DispatchError::other)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row.map_err(DispatchError::other)?);
    }
    Ok(items)
}
