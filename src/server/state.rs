//! Shared handler state and the fixed-window rate limiter.

use crate::boards::BoardService;
use crate::feedback::FeedbackService;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Per-client request tracker: (request count, window start).
type ClientTracker = HashMap<String, (u64, Instant)>;

/// Returned when a client has used up its window.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimited {
    pub retry_after: Duration,
    pub next_allowed: DateTime<Utc>,
}

pub struct RateLimiter {
    tracker: Mutex<ClientTracker>,
    max_requests: u64,
    window: Duration,
    trust_proxy: bool,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
            window,
            trust_proxy: false,
        }
    }

    /// Identify clients by the first `X-Forwarded-For` hop instead of the
    /// peer address. Only safe behind a proxy that overwrites the header.
    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    pub fn trust_proxy(&self) -> bool {
        self.trust_proxy
    }

    /// Count a request from `client`. Rejected requests still count, so a
    /// client that keeps hammering stays limited until the window rolls over.
    pub async fn check(&self, client: &str) -> Result<(), RateLimited> {
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();

        // Expired windows carry no state worth keeping.
        tracker.retain(|_, (_, started)| now.duration_since(*started) < self.window);

        let entry = tracker.entry(client.to_string()).or_insert((0, now));

        let mut elapsed = now.duration_since(entry.1);
        if elapsed >= self.window {
            entry.0 = 0;
            entry.1 = now;
            elapsed = Duration::ZERO;
        }

        entry.0 += 1;
        if entry.0 > self.max_requests {
            let retry_after = self.window.saturating_sub(elapsed);
            let next_allowed = Utc::now()
                + chrono::Duration::from_std(retry_after).unwrap_or_else(|_| chrono::Duration::zero());
            Err(RateLimited {
                retry_after,
                next_allowed,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
impl RateLimiter {
    async fn tracked_clients(&self) -> usize {
        self.tracker.lock().await.len()
    }
}

pub struct AppState {
    pub boards: BoardService,
    pub feedback: FeedbackService,
    pub rate_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;
