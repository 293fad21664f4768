//! Cached, retrying JSON fetches.
//!
//! [`Fetcher::get_json`] checks the cache, retries transient failures with
//! capped exponential backoff, and falls back to an expired cache entry when
//! every attempt fails.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::{ErrorKind, FetchError, Payload, TransportResult};
use crate::http::{fetch_json, fetch_json_with, HttpClient};

/// Retry bounds: `max_retries + 1` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_retry_delay_ms),
            max_delay: Duration::from_millis(config.max_retry_delay_ms),
        }
    }

    /// Delay before attempt `n` (the first retry is `n == 1`):
    /// `base * 2^(n-1)`, capped at `max_delay`. Attempt 0 has no delay.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// HTTP client + cache + retry policy.
pub struct Fetcher<C> {
    client: C,
    cache: ResponseCache,
    policy: RetryPolicy,
    /// Zero disables fresh cache reads and writes.
    cache_ttl_minutes: u64,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C, cache: ResponseCache, policy: RetryPolicy, cache_ttl_minutes: u64) -> Self {
        Self {
            client,
            cache,
            policy,
            cache_ttl_minutes,
        }
    }

    pub fn from_config(client: C, config: &Config) -> Self {
        let cache = match &config.cache_dir {
            Some(dir) => ResponseCache::on_disk(dir),
            None => ResponseCache::in_memory(),
        };
        Self::new(client, cache, RetryPolicy::from_config(config), config.cache_ttl_minutes)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn caching(&self) -> bool {
        self.cache_ttl_minutes > 0
    }

    async fn read_fresh(&self, url: &str) -> Option<Payload> {
        if !self.caching() {
            return None;
        }
        let value = self.cache.read(url, Some(self.cache_ttl_minutes)).await?;
        debug!("cache hit {}", url);
        Some(Payload::fresh(value))
    }

    async fn store(&self, url: &str, payload: &Payload) {
        if self.caching() {
            self.cache.write(url, &payload.value).await;
        }
    }

    /// Cached GET with retries and stale fallback.
    pub async fn get_json(&self, url: &str, accept: &str) -> TransportResult {
        if let Some(hit) = self.read_fresh(url).await {
            return Ok(hit);
        }

        let mut last_error: Option<FetchError> = None;
        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                let delay = self.policy.delay_before(attempt);
                warn!(
                    "retry {}/{} for {} in {:?}",
                    attempt, self.policy.max_retries, url, delay
                );
                tokio::time::sleep(delay).await;
            }

            match fetch_json(&self.client, url, accept).await {
                Ok(payload) => {
                    self.store(url, &payload).await;
                    return Ok(payload);
                }
                Err(err) => {
                    let retryable = err.is_retryable();
                    debug!("attempt {} for {} failed: {}", attempt + 1, url, err);
                    last_error = Some(err);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        if let Some(value) = self.cache.read(url, None).await {
            info!("serving stale cache for {}", url);
            return Ok(Payload { value, stale: true });
        }

        Err(last_error.unwrap_or_else(|| FetchError::new(ErrorKind::Network, url, "no attempt made")))
    }

    /// Cached GET with a single attempt and no stale fallback.
    pub async fn get_json_once(&self, url: &str, headers: &[(&str, &str)]) -> TransportResult {
        if let Some(hit) = self.read_fresh(url).await {
            return Ok(hit);
        }
        let payload = fetch_json_with(&self.client, url, headers).await?;
        self.store(url, &payload).await;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::StubClient;
    use serde_json::json;

    const URL: &str = "https://api.weather.gov/gridpoints/TOP/31,80/forecast";
    const ACCEPT: &str = "application/geo+json";

    fn instant_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn fetcher(client: StubClient, max_retries: u32) -> Fetcher<StubClient> {
        Fetcher::new(client, ResponseCache::in_memory(), instant_policy(max_retries), 10)
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy {
            max_retries: 6,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(2000),
        };
        let delays: Vec<u64> = (0..7)
            .map(|n| policy.delay_before(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![0, 250, 500, 1000, 2000, 2000, 2000]);
        assert_eq!(policy.delay_before(40), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_is_cache_hit() {
        let f = fetcher(StubClient::new().json(URL, json!({"n": 1})), 2);
        let first = f.get_json(URL, ACCEPT).await.unwrap();
        let second = f.get_json(URL, ACCEPT).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.client().calls_to(URL), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let client = StubClient::new().json(URL, json!({"n": 1}));
        let f = Fetcher::new(client, ResponseCache::in_memory(), instant_policy(0), 0);
        f.get_json(URL, ACCEPT).await.unwrap();
        f.get_json(URL, ACCEPT).await.unwrap();
        assert_eq!(f.client().calls_to(URL), 2);
    }

    #[tokio::test]
    async fn test_always_503_stops_after_max_retries_plus_one() {
        let f = fetcher(StubClient::new().respond(URL, 503, ""), 3);
        let err = f.get_json(URL, ACCEPT).await.unwrap_err();
        assert_eq!(err.status, Some(503));
        assert_eq!(f.client().calls_to(URL), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts_only() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(2000),
        };
        let client = StubClient::new().respond(URL, 503, "");
        let f = Fetcher::new(client, ResponseCache::in_memory(), policy, 10);

        let started = tokio::time::Instant::now();
        let err = f.get_json(URL, ACCEPT).await.unwrap_err();

        // 250ms before the second attempt, 500ms before the third, none after.
        assert_eq!(started.elapsed(), Duration::from_millis(750));
        assert_eq!(err.status, Some(503));
        assert_eq!(f.client().calls_to(URL), 3);
    }

    #[tokio::test]
    async fn test_404_is_not_retried() {
        let f = fetcher(StubClient::new().respond(URL, 404, "{}"), 3);
        let err = f.get_json(URL, ACCEPT).await.unwrap_err();
        assert_eq!(err.status, Some(404));
        assert_eq!(f.client().calls_to(URL), 1);
    }

    #[tokio::test]
    async fn test_parse_error_is_not_retried() {
        let f = fetcher(StubClient::new().respond(URL, 200, "{oops"), 3);
        let err = f.get_json(URL, ACCEPT).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert_eq!(f.client().calls_to(URL), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let client = StubClient::new()
            .respond(URL, 429, "")
            .respond(URL, 200, "<html>")
            .json(URL, json!({"ok": true}));
        let f = fetcher(client, 2);
        let payload = f.get_json(URL, ACCEPT).await.unwrap();
        assert_eq!(payload.value, json!({"ok": true}));
        assert!(!payload.stale);
        assert_eq!(f.client().calls_to(URL), 3);
    }

    #[tokio::test]
    async fn test_stale_fallback_after_exhausted_retries() {
        let cache = ResponseCache::in_memory();
        let old = chrono::Utc::now() - chrono::Duration::hours(5);
        cache.write_at(URL, &json!({"cached": true}), old).await;

        let f = Fetcher::new(StubClient::new().respond(URL, 500, ""), cache, instant_policy(1), 10);
        let payload = f.get_json(URL, ACCEPT).await.unwrap();
        assert!(payload.stale);
        assert_eq!(payload.value, json!({"cached": true}));
        assert_eq!(f.client().calls_to(URL), 2);
    }

    #[tokio::test]
    async fn test_stale_fallback_also_covers_non_retryable_errors() {
        let cache = ResponseCache::in_memory();
        let old = chrono::Utc::now() - chrono::Duration::hours(5);
        cache.write_at(URL, &json!({"cached": true}), old).await;

        let f = Fetcher::new(StubClient::new().respond(URL, 404, ""), cache, instant_policy(3), 10);
        let payload = f.get_json(URL, ACCEPT).await.unwrap();
        assert!(payload.stale);
        assert_eq!(f.client().calls_to(URL), 1);
    }

    #[tokio::test]
    async fn test_get_json_once_makes_single_attempt() {
        let f = fetcher(StubClient::new().respond(URL, 503, ""), 5);
        let err = f.get_json_once(URL, &[("Accept", ACCEPT)]).await.unwrap_err();
        assert_eq!(err.status, Some(503));
        assert_eq!(f.client().calls_to(URL), 1);
    }
}
