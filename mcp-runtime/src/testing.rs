use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::upstream::{UpstreamClient, UpstreamError};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// In-memory upstream that records every call and replays queued responses.
/// With nothing queued it answers `null`.
#[derive(Default)]
pub struct RecordingUpstream {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<VecDeque<Result<Value, UpstreamError>>>,
}

impl RecordingUpstream {
    pub fn respond(&self, response: Result<Value, UpstreamError>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl UpstreamClient for RecordingUpstream {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, UpstreamError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                method,
                path: path.to_string(),
                body,
            });
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Ok(Value::Null))
    }
}
