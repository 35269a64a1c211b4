//! In-memory rate limiting for camera/audio relays.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<(Uuid, MediaKind),
//! VecDeque<Instant>>`. One limit enforced: per connection, per media
//! kind, at most `MEDIA_RATE_LIMIT_PER_CONN` events per
//! `MEDIA_RATE_LIMIT_WINDOW_MS` window (default 15 per 1000ms).
//!
//! Clients target ~10 frames/sec, so the cap only engages on
//! misbehaving senders. Over-cap events are dropped silently — media
//! relay is lossy by contract, and a rejection event would itself add
//! traffic on the congested path.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

const DEFAULT_PER_CONN_LIMIT: usize = 15;
const DEFAULT_WINDOW_MS: u64 = 1000;

/// Media stream class, limited independently per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Camera,
    Audio,
}

#[derive(Clone, Copy)]
struct MediaRateLimitConfig {
    per_conn_limit: usize,
    window: Duration,
}

impl MediaRateLimitConfig {
    fn from_env() -> Self {
        Self {
            per_conn_limit: env_parse("MEDIA_RATE_LIMIT_PER_CONN", DEFAULT_PER_CONN_LIMIT),
            window: Duration::from_millis(env_parse("MEDIA_RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS)),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// LIMITER
// =============================================================================

#[derive(Clone)]
pub struct MediaRateLimiter {
    inner: Arc<Mutex<HashMap<(Uuid, MediaKind), VecDeque<Instant>>>>,
    config: MediaRateLimitConfig,
}

impl MediaRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), config: MediaRateLimitConfig::from_env() }
    }

    /// Check the sender's window and record the event. Returns false
    /// when the event should be dropped.
    pub fn allow(&self, connection_id: Uuid, kind: MediaKind) -> bool {
        self.allow_at(connection_id, kind, Instant::now())
    }

    /// Internal: check + record with explicit timestamp (for testing).
    fn allow_at(&self, connection_id: Uuid, kind: MediaKind, now: Instant) -> bool {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let deque = inner.entry((connection_id, kind)).or_default();
        prune_window(deque, now, self.config.window);
        if deque.len() >= self.config.per_conn_limit {
            return false;
        }
        deque.push_back(now);
        true
    }

    /// Release a disconnected connection's windows.
    pub fn forget(&self, connection_id: Uuid) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.retain(|(id, _), _| *id != connection_id);
    }
}

impl Default for MediaRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
