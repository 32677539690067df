use std::time::Duration;
use thiserror::Error;

/// Failures of the outbound request layer.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request cancelled")]
    Cancelled,
    #[error("max retries exceeded after {0} attempts")]
    RetriesExhausted(u32),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures reported by a media server provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("{server} returned status {status}: {body}")]
    Status {
        server: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode {server} response: {message}")]
    Decode { server: String, message: String },
    #[error("no matching item found for '{0}'")]
    NotFound(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("{} scrobble(s) failed: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<ProviderError>),
}

impl ProviderError {
    pub fn status(server: &str, status: u16, body: impl Into<String>) -> Self {
        ProviderError::Status {
            server: server.to_string(),
            status,
            body: body.into(),
        }
    }

    pub fn decode(server: &str, err: impl std::fmt::Display) -> Self {
        ProviderError::Decode {
            server: server.to_string(),
            message: err.to_string(),
        }
    }
}

/// Failures reported by the remote watch-history service.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("remote service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to encode payload: {0}")]
    Encode(String),
}

fn join_errors(errors: &[ProviderError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
