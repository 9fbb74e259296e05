use crate::api::error::AppError;
use axum::{extract::ConnectInfo, http::HeaderMap};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::net::SocketAddr;

const MAX_TRACKED_WINDOWS: usize = 10_000;

/// Extract client IP from proxy headers, falling back to the socket peer
pub fn extract_client_ip(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(ip) = val.split(',').next()
        && !ip.trim().is_empty()
    {
        return ip.trim().to_string();
    }
    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(val) = real_ip.to_str()
        && !val.trim().is_empty()
    {
        return val.trim().to_string();
    }
    if let Some(ConnectInfo(addr)) = peer {
        return addr.ip().to_string();
    }
    "unknown".to_string()
}

#[derive(Debug, Clone)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

/// Fixed one-minute windows per (route, client).
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<(&'static str, String), Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, scope: &'static str, client: &str, per_minute: u32) -> Result<(), AppError> {
        self.check_at(scope, client, per_minute, Utc::now())
    }

    pub fn check_at(
        &self,
        scope: &'static str,
        client: &str,
        per_minute: u32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.windows.len() > MAX_TRACKED_WINDOWS {
            self.prune(now);
        }

        let mut entry = self
            .windows
            .entry((scope, client.to_string()))
            .or_insert_with(|| Window {
                started: now,
                count: 0,
            });

        if now - entry.started >= Duration::minutes(1) {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= per_minute {
            let retry_in = (entry.started + Duration::minutes(1) - now).num_seconds().max(1);
            tracing::warn!("🚦 Rate limit hit on {} for {}", scope, client);
            return Err(AppError::TooManyRequests(format!(
                "Rate limit exceeded: {} per 1 minute. Retry in {} seconds",
                per_minute, retry_in
            )));
        }

        entry.count += 1;
        Ok(())
    }

    /// Drops windows that ended before `now`.
    pub fn prune(&self, now: DateTime<Utc>) {
        self.windows
            .retain(|_, w| now - w.started < Duration::minutes(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_limit_within_window() {
        let limiter = RateLimiter::new();
        let now = Utc::now();

        for _ in 0..3 {
            assert!(limiter.check_at("login", "1.2.3.4", 3, now).is_ok());
        }
        assert!(matches!(
            limiter.check_at("login", "1.2.3.4", 3, now),
            Err(AppError::TooManyRequests(_))
        ));

        // Other clients and other routes are counted separately
        assert!(limiter.check_at("login", "5.6.7.8", 3, now).is_ok());
        assert!(limiter.check_at("reset", "1.2.3.4", 3, now).is_ok());

        let later = now + Duration::seconds(61);
        assert!(limiter.check_at("login", "1.2.3.4", 3, later).is_ok());
    }

    #[test]
    fn test_prune() {
        let limiter = RateLimiter::new();
        let now = Utc::now();
        limiter.check_at("login", "a", 1, now).unwrap();
        limiter.prune(now + Duration::minutes(2));
        assert!(limiter.windows.is_empty());
    }

    #[test]
    fn test_client_ip_headers() {
        let peer = ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 50123)));
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, None), "unknown");
        assert_eq!(extract_client_ip(&headers, Some(&peer)), "192.0.2.9");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_client_ip(&headers, Some(&peer)), "10.0.0.2");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(extract_client_ip(&headers, Some(&peer)), "203.0.113.7");
    }
}
