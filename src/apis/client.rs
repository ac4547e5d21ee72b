//! Base HTTP plumbing shared by the provider clients: pacing rate limiter,
//! request stats, and status-to-error mapping.

use crate::errors::ApiError;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Rate limiter for API clients
///
/// Serializes requests and spaces them at least `60 / max_per_minute`
/// seconds apart.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    last_request: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(max_per_minute: usize) -> Self {
        let min_interval = if max_per_minute > 0 {
            Duration::from_secs_f64(60.0 / max_per_minute as f64)
        } else {
            Duration::ZERO
        };

        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            last_request: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Wait until a request may be sent
    pub async fn acquire(&self) -> Result<RateLimitGuard, ApiError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ApiError::Network(format!("Rate limiter closed: {}", e)))?;

        if !self.min_interval.is_zero() {
            let mut last = self.last_request.lock().await;
            if let Some(last_time) = *last {
                let elapsed = last_time.elapsed();
                if elapsed < self.min_interval {
                    tokio::time::sleep(self.min_interval - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        Ok(RateLimitGuard { _permit: permit })
    }
}

/// RAII guard returned by [`RateLimiter::acquire`]
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}

// ============================================================================
// STATS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited: u64,
    pub average_response_time_ms: f64,
    pub last_error: Option<String>,
}

impl ApiStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64 * 100.0
    }
}

/// Per-client request counters
#[derive(Default)]
pub struct ApiStatsTracker {
    stats: Mutex<ApiStats>,
}

impl ApiStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, success: bool, elapsed_ms: f64) {
        let mut stats = self.stats.lock().await;
        let previous = stats.total_requests as f64;
        stats.total_requests += 1;
        if success {
            stats.successful_requests += 1;
        } else {
            stats.failed_requests += 1;
        }
        stats.average_response_time_ms =
            (stats.average_response_time_ms * previous + elapsed_ms) / stats.total_requests as f64;
    }

    pub async fn record_error(&self, error: &ApiError) {
        let mut stats = self.stats.lock().await;
        if matches!(error, ApiError::RateLimited { .. }) {
            stats.rate_limited += 1;
        }
        stats.last_error = Some(error.to_string());
    }

    pub async fn get_stats(&self) -> ApiStats {
        self.stats.lock().await.clone()
    }
}

// ============================================================================
// REQUEST HELPERS
// ============================================================================

pub fn build_http_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("callscope/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Parse a `Retry-After` header given in seconds
pub fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a non-success status to an [`ApiError`]
pub fn status_error(provider: &str, status: StatusCode, retry_after: Option<Duration>, body: String) -> ApiError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ApiError::RateLimited {
            provider: provider.to_string(),
            retry_after,
        }
    } else {
        ApiError::Http {
            status: status.as_u16(),
            body: truncate_body(body),
        }
    }
}

fn truncate_body(mut body: String) -> String {
    const MAX_BODY: usize = 300;
    if body.len() > MAX_BODY {
        let mut cut = MAX_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

/// Send a paced GET and decode its JSON body, recording stats
pub async fn get_json<T>(
    provider: &str,
    limiter: &RateLimiter,
    stats: &ApiStatsTracker,
    builder: reqwest::RequestBuilder,
) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let guard = limiter.acquire().await?;
    let start = Instant::now();
    let response_result = builder.send().await;
    drop(guard);
    let elapsed = start.elapsed().as_millis() as f64;

    let result = match response_result {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                response
                    .json::<T>()
                    .await
                    .map_err(|e| ApiError::Parse(format!("{}: {}", provider, e)))
            } else {
                let retry_after = parse_retry_after(&response);
                let body = response.text().await.unwrap_or_default();
                Err(status_error(provider, status, retry_after, body))
            }
        }
        Err(e) => Err(ApiError::from(e)),
    };

    stats.record_request(result.is_ok(), elapsed).await;
    if let Err(ref e) = result {
        stats.record_error(e).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_interval() {
        let limiter = RateLimiter::new(30);
        assert_eq!(limiter.min_interval, Duration::from_secs(2));
        assert_eq!(RateLimiter::new(0).min_interval, Duration::ZERO);
    }

    #[test]
    fn test_429_maps_to_rate_limited() {
        let err = status_error(
            "geckoterminal",
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(7)),
            String::new(),
        );
        assert_eq!(
            err,
            ApiError::RateLimited {
                provider: "geckoterminal".to_string(),
                retry_after: Some(Duration::from_secs(7)),
            }
        );
    }

    #[test]
    fn test_long_body_truncated() {
        let err = status_error("dexscreener", StatusCode::BAD_GATEWAY, None, "x".repeat(1000));
        match err {
            ApiError::Http { status, body } => {
                assert_eq!(status, 502);
                assert!(body.len() < 400);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stats_average() {
        let tracker = ApiStatsTracker::new();
        tracker.record_request(true, 100.0).await;
        tracker.record_request(false, 300.0).await;
        let stats = tracker.get_stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.failed_requests, 1);
        assert!((stats.average_response_time_ms - 200.0).abs() < 1e-9);
        assert!((stats.success_rate() - 50.0).abs() < 1e-9);
    }
}
