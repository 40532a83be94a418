use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub event: String,
    pub message: String,
    pub timestamp_ms: u128,
}

impl ProgressEvent {
    pub fn new(event: &str, message: &str) -> Self {
        Self {
            event: event.to_string(),
            message: message.to_string(),
            timestamp_ms: now_ms(),
        }
    }
}

/// Receives stage updates from a running workflow.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &str, message: &str);
}

/// Discards every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: &str, _message: &str) {}
}

impl ProgressSink for broadcast::Sender<ProgressEvent> {
    fn emit(&self, event: &str, message: &str) {
        // No subscriber is fine.
        let _ = self.send(ProgressEvent::new(event, message));
    }
}

pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}
