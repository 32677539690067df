use crate::error::RequestError;
use crate::request::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Replays canned results in order and records every request it sees.
/// Once the script runs out every call fails with a transport error.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, RequestError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<HttpResponse, RequestError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for scripts made only of successful responses.
    pub fn responses(responses: Vec<(u16, &str)>) -> Self {
        Self::new(
            responses
                .into_iter()
                .map(|(status, body)| Ok(HttpResponse::new(status, body.to_string())))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RequestError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RequestError::Transport("connection refused".to_string())))
    }
}

/// Transport whose requests never complete.
#[derive(Default)]
pub struct PendingTransport {
    calls: AtomicUsize,
}

impl PendingTransport {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for PendingTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
