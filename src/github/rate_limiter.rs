use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;

use crate::error::{Error, Result};

/// Tracks the GitHub request quota reported in response headers.
///
/// There is no waiting here: once the quota is exhausted every request fails
/// fast with [`Error::RateLimited`] until the reset time passes.
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitState {
    remaining: u32,
    /// Unix timestamp (seconds) at which the quota resets.
    reset_at: Option<u64>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RateLimitState {
                remaining: 5000,
                reset_at: None,
            }),
        }
    }

    pub fn check(&self) -> Result<()> {
        self.check_at(unix_now())
    }

    fn check_at(&self, now: u64) -> Result<()> {
        let state = match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        };

        if state.remaining > 0 {
            return Ok(());
        }

        match state.reset_at {
            Some(reset_at) if reset_at > now => Err(Error::RateLimited(reset_at - now)),
            _ => Ok(()),
        }
    }

    pub fn update_from_headers(&self, headers: &HeaderMap) {
        let remaining = header_number::<u32>(headers, "x-ratelimit-remaining");
        let reset = header_number::<u64>(headers, "x-ratelimit-reset");

        let Some(remaining) = remaining else {
            return;
        };

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.remaining = remaining;
        if reset.is_some() {
            state.reset_at = reset;
        }

        if remaining == 0 {
            tracing::warn!("GitHub rate limit exhausted, resets at {:?}", state.reset_at);
        }
    }

    /// Seconds until the quota resets, if it is currently exhausted.
    pub fn retry_after(&self) -> Option<u64> {
        match self.check() {
            Err(Error::RateLimited(secs)) => Some(secs),
            _ => None,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(remaining: &'static str, reset: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static(remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static(reset));
        headers
    }

    #[test]
    fn test_allows_requests_with_quota_left() {
        let limiter = RateLimiter::new();
        limiter.update_from_headers(&headers("12", "2000"));
        assert!(limiter.check_at(1000).is_ok());
    }

    #[test]
    fn test_exhausted_quota_fails_until_reset() {
        let limiter = RateLimiter::new();
        limiter.update_from_headers(&headers("0", "2000"));
        assert!(matches!(limiter.check_at(1940), Err(Error::RateLimited(60))));
        assert!(limiter.check_at(2000).is_ok());
    }

    #[test]
    fn test_ignores_responses_without_quota_headers() {
        let limiter = RateLimiter::new();
        limiter.update_from_headers(&HeaderMap::new());
        assert!(limiter.check().is_ok());
        assert_eq!(limiter.retry_after(), None);
    }
}
