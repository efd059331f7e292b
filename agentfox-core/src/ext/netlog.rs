//! Bounded in-memory recording of the tab's network traffic.
//!
//! Start subscribes to the CDP Network events on the active tab and folds
//! request/response/failure notifications into one record per request ID.
//! The buffer is bounded; once full, new requests are counted but dropped.

use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::DispatchError;

/// Hard cap on retained request records.
const MAX_RECORDED: usize = 2000;

#[derive(Debug, Clone, serde::Serialize)]
pub struct RecordedRequest {
    pub url: String,
    pub method: String,
    #[serde(rename = "resourceType", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Default)]
struct RequestLog {
    by_id: HashMap<String, usize>,
    records: Vec<RecordedRequest>,
    dropped: usize,
}

impl RequestLog {
    fn record_request(&mut self, id: String, record: RecordedRequest) {
        if self.records.len() >= MAX_RECORDED {
            self.dropped += 1;
            return;
        }
        let idx = self.records.len();
        self.records.push(record);
        self.by_id.insert(id, idx);
    }

    fn record_status(&mut self, id: &str, status: i64) {
        if let Some(&idx) = self.by_id.get(id) {
            self.records[idx].status = Some(status);
        }
    }

    fn record_failure(&mut self, id: &str, error: String) {
        if let Some(&idx) = self.by_id.get(id) {
            self.records[idx].error = Some(error);
        }
    }
}

#[derive(Default)]
struct RecorderState {
    recording: bool,
    tasks: Vec<JoinHandle<()>>,
}

/// The recorder shared between the dispatcher and the listener tasks.
pub struct NetworkRecorder {
    state: Mutex<RecorderState>,
    log: Arc<Mutex<RequestLog>>,
}

impl NetworkRecorder {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecorderState::default()),
            log: Arc::new(Mutex::new(RequestLog::default())),
        }
    }

    /// Begin recording on the given tab. Idempotent while already recording.
    pub async fn start(&self, page: &Page) -> Result<(), DispatchError> {
        let mut state = self.state.lock().await;
        if state.recording {
            return Ok(());
        }

        page.execute(EnableParams::default())
            .await
            .map_err(DispatchError::other)?;

        let requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(DispatchError::other)?;
        let responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(DispatchError::other)?;
        let failures = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(DispatchError::other)?;

        // Events are folded from their JSON form; the shapes are stable CDP.
        let log = self.log.clone();
        state.tasks.push(tokio::spawn(async move {
            futures::pin_mut!(requests);
            while let Some(event) = requests.next().await {
                let Ok(v) = serde_json::to_value(&*event) else { continue };
                let id = v["requestId"].as_str().unwrap_or_default().to_string();
                let record = RecordedRequest {
                    url: v["request"]["url"].as_str().unwrap_or_default().to_string(),
                    method: v["request"]["method"].as_str().unwrap_or_default().to_string(),
                    resource_type: v["type"].as_str().map(str::to_string),
                    status: None,
                    error: None,
                };
                log.lock().await.record_request(id, record);
            }
        }));

        let log = self.log.clone();
        state.tasks.push(tokio::spawn(async move {
            futures::pin_mut!(responses);
            while let Some(event) = responses.next().await {
                let Ok(v) = serde_json::to_value(&*event) else { continue };
                let id = v["requestId"].as_str().unwrap_or_default().to_string();
                if let Some(status) = v["response"]["status"].as_i64() {
                    log.lock().await.record_status(&id, status);
                }
            }
        }));

        let log = self.log.clone();
        state.tasks.push(tokio::spawn(async move {
            futures::pin_mut!(failures);
            while let Some(event) = failures.next().await {
                let Ok(v) = serde_json::to_value(&*event) else { continue };
                let id = v["requestId"].as_str().unwrap_or_default().to_string();
                let error = v["errorText"].as_str().unwrap_or("failed").to_string();
                log.lock().await.record_failure(&id, error);
            }
        }));

        state.recording = true;
        debug!("network recording started");
        Ok(())
    }

    /// Stop recording; the captured log stays readable.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        for task in state.tasks.drain(..) {
            task.abort();
        }
        state.recording = false;
        debug!("network recording stopped");
    }

    pub async fn is_recording(&self) -> bool {
        self.state.lock().await.recording
    }

    /// Current records, optionally filtered by URL substring.
    pub async fn snapshot(&self, filter: Option<&str>) -> Value {
        let log = self.log.lock().await;
        let records: Vec<&RecordedRequest> = match filter {
            Some(filter) => log
                .records
                .iter()
                .filter(|r| r.url.contains(filter))
                .collect(),
            None => log.records.iter().collect(),
        };
        json!(records)
    }

    /// Drop all records; returns how many were discarded.
    pub async fn clear(&self) -> usize {
        let mut log = self.log.lock().await;
        let count = log.records.len();
        log.records.clear();
        log.by_id.clear();
        log.dropped = 0;
        count
    }
}

impl Default for NetworkRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_folds_status_and_failure_by_request_id() {
        let recorder = NetworkRecorder::new();
        {
            let mut log = recorder.log.lock().await;
            log.record_request(
                "r1".into(),
                RecordedRequest {
                    url: "https://example.com/app.js".into(),
                    method: "GET".into(),
                    resource_type: Some("Script".into()),
                    status: None,
                    error: None,
                },
            );
            log.record_status("r1", 200);
            log.record_failure("r2", "unknown".into());
        }

        let all = recorder.snapshot(None).await;
        assert_eq!(all.as_array().unwrap().len(), 1);
        assert_eq!(all[0]["status"], 200);

        let filtered = recorder.snapshot(Some("nope")).await;
        assert!(filtered.as_array().unwrap().is_empty());

        assert_eq!(recorder.clear().await, 1);
    }

    #[tokio::test]
    async fn log_is_bounded() {
        let recorder = NetworkRecorder::new();
        {
            let mut log = recorder.log.lock().await;
            for i in 0..(MAX_RECORDED + 5) {
                log.record_request(
                    format!("r{i}"),
                    RecordedRequest {
                        url: format!("https://example.com/{i}"),
                        method: "GET".into(),
                        resource_type: None,
                        status: None,
                        error: None,
                    },
                );
            }
            assert_eq!(log.records.len(), MAX_RECORDED);
            assert_eq!(log.dropped, 5);
        }
    }
}
