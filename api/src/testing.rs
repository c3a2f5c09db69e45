use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::Method;
use habitica_mcp_runtime::{
    Credentials, UpstreamClient, UpstreamConnector, UpstreamError, habitica_registry,
};
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct SeenCall {
    pub user_id: String,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Connector whose clients record every call and replay queued responses.
#[derive(Default)]
pub struct FakeConnector {
    calls: Arc<Mutex<Vec<SeenCall>>>,
    responses: Arc<Mutex<VecDeque<Result<Value, UpstreamError>>>>,
}

impl FakeConnector {
    pub fn respond(&self, response: Result<Value, UpstreamError>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<SeenCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

struct FakeClient {
    credentials: Credentials,
    calls: Arc<Mutex<Vec<SeenCall>>>,
    responses: Arc<Mutex<VecDeque<Result<Value, UpstreamError>>>>,
}

#[async_trait]
impl UpstreamClient for FakeClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, UpstreamError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SeenCall {
                user_id: self.credentials.user_id.clone(),
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

impl UpstreamConnector for FakeConnector {
    fn connect(&self, credentials: Credentials) -> Arc<dyn UpstreamClient> {
        Arc::new(FakeClient {
            credentials,
            calls: self.calls.clone(),
            responses: self.responses.clone(),
        })
    }
}

pub fn test_state(config: GatewayConfig) -> AppState {
    test_state_with(config, Arc::new(FakeConnector::default()))
}

pub fn test_state_with(config: GatewayConfig, connector: Arc<FakeConnector>) -> AppState {
    let registry = habitica_registry().expect("catalogue registers");
    AppState::new(config, registry, connector)
}
