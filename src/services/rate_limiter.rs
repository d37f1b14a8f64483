//! Rate limiter for login attempts
//!
//! Two sliding windows guard the login endpoint:
//! - failed attempts per account email (5 per 15 minutes by default)
//! - requests per client IP (20 per minute by default)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::services::user::normalize_email;

/// Thresholds for [`LoginRateLimiter`]
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub max_failures: usize,
    pub failure_window: Duration,
    pub max_requests: usize,
    pub request_window: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            max_failures: 5,
            failure_window: Duration::minutes(15),
            max_requests: 20,
            request_window: Duration::minutes(1),
        }
    }
}

type Attempts<K> = Arc<RwLock<HashMap<K, Vec<DateTime<Utc>>>>>;

/// Login rate limiter
pub struct LoginRateLimiter {
    limits: RateLimits,
    /// Failed login attempts by normalized email
    failures: Attempts<String>,
    /// Login requests by client IP
    requests: Attempts<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(RateLimits::default())
    }

    pub fn with_limits(limits: RateLimits) -> Self {
        Self {
            limits,
            failures: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Whether the account has too many recent failures
    pub async fn is_email_limited(&self, email: &str) -> bool {
        let cutoff = Utc::now() - self.limits.failure_window;
        let mut failures = self.failures.write().await;
        match failures.get_mut(&normalize_email(email)) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.limits.max_failures
            }
            None => false,
        }
    }

    pub async fn record_failure(&self, email: &str) {
        let mut failures = self.failures.write().await;
        failures
            .entry(normalize_email(email))
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear_failures(&self, email: &str) {
        self.failures.write().await.remove(&normalize_email(email));
    }

    /// Count a request from `ip` and report whether it exceeds the limit
    pub async fn check_ip(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let cutoff = now - self.limits.request_window;
        let mut requests = self.requests.write().await;
        let times = requests.entry(ip).or_default();
        times.retain(|t| *t > cutoff);
        if times.len() >= self.limits.max_requests {
            return true;
        }
        times.push(now);
        false
    }

    /// Drop expired entries; run periodically from a background task
    pub async fn cleanup(&self) {
        let now = Utc::now();

        let failure_cutoff = now - self.limits.failure_window;
        self.failures.write().await.retain(|_, times| {
            times.retain(|t| *t > failure_cutoff);
            !times.is_empty()
        });

        let request_cutoff = now - self.limits.request_window;
        self.requests.write().await.retain(|_, times| {
            times.retain(|t| *t > request_cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> (usize, usize) {
        (self.failures.read().await.len(), self.requests.read().await.len())
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_email_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            limiter.record_failure("a@example.com").await;
            assert!(!limiter.is_email_limited("a@example.com").await);
        }
        limiter.record_failure("a@example.com").await;
        assert!(limiter.is_email_limited("a@example.com").await);
        assert!(!limiter.is_email_limited("b@example.com").await);

        limiter.clear_failures("a@example.com").await;
        assert!(!limiter.is_email_limited("a@example.com").await);
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let limiter = LoginRateLimiter::new();
        for email in ["A@Example.com", "a@example.com", "A@EXAMPLE.COM", "a@example.COM", "a@Example.com"] {
            limiter.record_failure(email).await;
        }
        assert!(limiter.is_email_limited("a@example.com").await);
    }

    #[tokio::test]
    async fn test_email_ignores_surrounding_whitespace() {
        let limiter = LoginRateLimiter::new();
        for email in [" a@example.com", "a@example.com ", "\ta@example.com", "a@example.com", "  A@example.com"] {
            limiter.record_failure(email).await;
        }
        assert!(limiter.is_email_limited("a@example.com").await);
        assert!(limiter.is_email_limited(" a@example.com\n").await);
    }

    #[tokio::test]
    async fn test_ip_limit() {
        let limiter = LoginRateLimiter::with_limits(RateLimits {
            max_requests: 3,
            ..RateLimits::default()
        });
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let other: IpAddr = "10.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(!limiter.check_ip(ip).await);
        }
        assert!(limiter.check_ip(ip).await);
        assert!(!limiter.check_ip(other).await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_cleaned() {
        let limiter = LoginRateLimiter::with_limits(RateLimits {
            failure_window: Duration::zero(),
            request_window: Duration::zero(),
            ..RateLimits::default()
        });
        limiter.record_failure("a@example.com").await;
        limiter.check_ip("127.0.0.1".parse().unwrap()).await;

        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, (0, 0));
        assert!(!limiter.is_email_limited("a@example.com").await);
    }
}
