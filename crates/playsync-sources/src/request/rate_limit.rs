use crate::error::RequestError;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Upper bound on a single refill wait. Only rates near zero reach it; the
/// limiter re-checks the bucket after each wait.
const MAX_REFILL_WAIT: Duration = Duration::from_secs(3600);

/// Token bucket shared by every caller of a client.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// `rate` requests per second; `burst` tokens may be spent at once.
    pub fn new(rate: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: rate.max(f64::MIN_POSITIVE),
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Wait for a token. Returns `Cancelled` if the token fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RequestError> {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                refill_wait(1.0 - bucket.tokens, self.rate)
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(RequestError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

/// Time until `missing` tokens accrue at `rate`, clamped to [`MAX_REFILL_WAIT`].
fn refill_wait(missing: f64, rate: f64) -> Duration {
    let secs = (missing / rate).clamp(0.0, MAX_REFILL_WAIT.as_secs_f64());
    if secs.is_nan() {
        return MAX_REFILL_WAIT;
    }
    Duration::from_secs_f64(secs)
}
