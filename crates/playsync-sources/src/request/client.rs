use crate::error::RequestError;
use crate::request::rate_limit::RateLimiter;
use crate::request::transport::{HttpRequest, HttpResponse, HttpTransport};
use playsync_config::RequestConfig;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Outbound client with header injection, rate limiting, timeouts and
/// bounded exponential backoff with jitter.
///
/// Cheap to clone; clones share the transport and the rate limiter.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn HttpTransport>,
    headers: HashMap<String, String>,
    max_retries: u32,
    timeout: Option<Duration>,
    rate_limiter: Option<Arc<RateLimiter>>,
    retryable_status: HashSet<u16>,
    initial_backoff: Duration,
    cancel: CancellationToken,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            headers: HashMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: None,
            rate_limiter: None,
            retryable_status: DEFAULT_RETRYABLE_STATUS.into_iter().collect(),
            initial_backoff: INITIAL_BACKOFF,
            cancel: CancellationToken::new(),
        }
    }

    /// Client configured from the `[request]` table.
    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &RequestConfig) -> Self {
        let mut client = Self::new(transport)
            .with_max_retries(config.max_retries)
            .with_timeout(config.timeout());
        if let Some(rate) = config.rate_limit {
            let burst = config.burst.unwrap_or(1);
            client = client.with_rate_limiter(Arc::new(RateLimiter::new(rate, burst)));
        }
        client
    }

    /// Add default headers. Headers already set on a request take precedence.
    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Add status codes that trigger a retry.
    pub fn with_retryable_status(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status.extend(codes);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Send a request, retrying transport failures and retryable statuses.
    ///
    /// A non-retryable status is returned as-is, including 4xx/5xx, and so is
    /// whatever the final attempt produced. The timeout is a single deadline
    /// for the whole call and expires with [`RequestError::Timeout`].
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    pub async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, RequestError> {
        for (key, value) in &self.headers {
            request
                .headers
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        if request.timeout.is_none() {
            request.timeout = self.timeout;
        }

        // One deadline covers rate-limit waits, every attempt and every backoff
        match request.timeout {
            Some(limit) => tokio::time::timeout(limit, self.send_with_retries(&request))
                .await
                .unwrap_or(Err(RequestError::Timeout(limit))),
            None => self.send_with_retries(&request).await,
        }
    }

    async fn send_with_retries(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
        let mut backoff = self.initial_backoff;

        for attempt in 0..=self.max_retries {
            if let Some(limiter) = &self.rate_limiter {
                limiter.acquire(&self.cancel).await?;
            }

            match self.attempt(request).await {
                Err(RequestError::Cancelled) => return Err(RequestError::Cancelled),
                Err(e) if attempt < self.max_retries => {
                    warn!(attempt = attempt + 1, error = %e, "Request failed, retrying");
                    self.sleep_backoff(backoff).await?;
                    backoff *= 2;
                }
                // Nothing was retried, so the failure itself is the answer
                Err(e) if self.max_retries == 0 => return Err(e),
                Err(e) => {
                    warn!(attempts = attempt + 1, error = %e, "Request failed, giving up");
                    return Err(RequestError::RetriesExhausted(attempt + 1));
                }
                Ok(response) => {
                    if !self.retryable_status.contains(&response.status) || attempt == self.max_retries {
                        return Ok(response);
                    }
                    debug!(
                        attempt = attempt + 1,
                        status = response.status,
                        "Retryable status, backing off"
                    );
                    drop(response);
                    self.sleep_backoff(backoff).await?;
                    backoff *= 2;
                }
            }
        }

        Err(RequestError::RetriesExhausted(self.max_retries + 1))
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(RequestError::Cancelled),
            result = self.transport.send(request.clone()) => result,
        }
    }

    async fn sleep_backoff(&self, backoff: Duration) -> Result<(), RequestError> {
        let delay = backoff + jitter(backoff);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(RequestError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Uniform in `[0, backoff / 4)`.
fn jitter(backoff: Duration) -> Duration {
    let quarter = (backoff / 4).as_millis() as u64;
    if quarter == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..quarter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::testing::{PendingTransport, ScriptedTransport};
    use tokio::time::Instant;

    fn client(transport: &Arc<ScriptedTransport>) -> ResilientClient {
        ResilientClient::new(transport.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(200, "ok")),
        ]));

        let response = client(&transport)
            .execute(HttpRequest::get("http://server/status"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "ok");
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_stops_after_max_retries() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));

        let result = client(&transport)
            .with_max_retries(2)
            .execute(HttpRequest::get("http://server/status"))
            .await;

        assert!(matches!(result, Err(RequestError::RetriesExhausted(3))));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_retryable_response_is_returned() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(503, "")),
        ]));

        let response = client(&transport)
            .with_max_retries(1)
            .execute(HttpRequest::get("http://server/status"))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_status_returned_immediately() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(HttpResponse::new(404, "missing"))]));

        let response = client(&transport)
            .execute(HttpRequest::get("http://server/missing"))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_retryable_status() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(HttpResponse::new(409, "")),
            Ok(HttpResponse::new(200, "")),
        ]));

        let response = client(&transport)
            .with_retryable_status([409])
            .execute(HttpRequest::get("http://server/conflict"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(HttpResponse::new(500, "")),
            Ok(HttpResponse::new(500, "")),
            Ok(HttpResponse::new(200, "")),
        ]));
        let start = Instant::now();

        client(&transport)
            .execute(HttpRequest::get("http://server/"))
            .await
            .unwrap();

        // 500ms + 1000ms, each with up to a quarter of jitter
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(1875));
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_and_headers_resent_on_every_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(HttpResponse::new(502, "")),
            Ok(HttpResponse::new(200, "")),
        ]));
        let request = HttpRequest::post("http://server/scrobble")
            .header("Authorization", "Bearer request")
            .json(&serde_json::json!({"progress": 45.0}))
            .unwrap();

        client(&transport)
            .with_headers([("Authorization", "Bearer default"), ("trakt-api-version", "2")])
            .execute(request)
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        for request in sent {
            assert_eq!(request.body.as_deref(), Some(br#"{"progress":45.0}"#.as_slice()));
            assert_eq!(request.headers["Authorization"], "Bearer request");
            assert_eq!(request.headers["trakt-api-version"], "2");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_applied_when_missing() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(HttpResponse::new(200, ""))]));

        client(&transport)
            .with_timeout(Duration::from_secs(7))
            .execute(HttpRequest::get("http://server/"))
            .await
            .unwrap();
        client(&transport)
            .with_timeout(Duration::from_secs(7))
            .execute(HttpRequest::get("http://server/").timeout(Duration::from_secs(1)))
            .await
            .ok();

        let sent = transport.requests();
        assert_eq!(sent[0].timeout, Some(Duration::from_secs(7)));
        assert_eq!(sent[1].timeout, Some(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let cancel = CancellationToken::new();
        let client = client(&transport).with_cancellation(cancel.clone());

        let handle = tokio::spawn(async move { client.execute(HttpRequest::get("http://server/")).await });
        tokio::task::yield_now().await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RequestError::Cancelled)));
        assert!(transport.calls() <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let config = RequestConfig {
            max_retries: 1,
            timeout: "5s".to_string(),
            rate_limit: Some(10.0),
            burst: Some(2),
        };

        let client = ResilientClient::from_config(transport.clone(), &config);
        assert_eq!(client.max_retries(), 1);
        assert!(client.execute(HttpRequest::get("http://server/")).await.is_err());
        assert_eq!(transport.calls(), 2);
        assert_eq!(transport.requests()[0].timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds_the_whole_request() {
        let transport = Arc::new(PendingTransport::default());
        let start = Instant::now();

        let result = ResilientClient::new(transport.clone())
            .with_timeout(Duration::from_secs(1))
            .execute(HttpRequest::get("http://server/hung"))
            .await;

        assert!(matches!(result, Err(RequestError::Timeout(limit)) if limit == Duration::from_secs(1)));
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1100));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_includes_backoff() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(200, "")),
        ]));
        let start = Instant::now();

        // Backoffs of 500ms and 1000ms cannot both fit in 1s
        let result = client(&transport)
            .with_timeout(Duration::from_secs(1))
            .execute(HttpRequest::get("http://server/"))
            .await;

        assert!(matches!(result, Err(RequestError::Timeout(_))));
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1100));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_pending_send() {
        let transport = Arc::new(PendingTransport::default());
        let cancel = CancellationToken::new();
        let client = ResilientClient::new(transport.clone()).with_cancellation(cancel.clone());

        let handle = tokio::spawn(async move { client.execute(HttpRequest::get("http://server/")).await });
        while transport.calls() == 0 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(RequestError::Cancelled)));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            assert!(jitter(Duration::from_millis(500)) < Duration::from_millis(125));
        }
        assert_eq!(jitter(Duration::from_millis(3)), Duration::ZERO);
    }
}
