pub mod client;
pub mod rate_limit;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ResilientClient, DEFAULT_MAX_RETRIES, DEFAULT_RETRYABLE_STATUS};
pub use rate_limit::RateLimiter;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
