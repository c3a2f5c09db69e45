use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Per-identity counter for the current fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

/// Outcome of a single [`RateLimiter::check_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitCheck {
    pub allowed: bool,
    pub count: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitCheck {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }
}

/// Fixed-window request counter keyed by client identity.
///
/// A window restarts only once `now - window_start` strictly exceeds the
/// window length, so a client can burst up to twice the limit across a
/// boundary. Every check counts, including ones that end up denied.
#[derive(Clone)]
pub struct RateLimiter {
    records: Arc<Mutex<HashMap<String, RateLimitRecord>>>,
    max_requests: u32,
    window: TimeDelta,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    /// Counts one request for `identity` at `now`. The read and the write
    /// happen under a single lock acquisition.
    pub fn check_at(&self, identity: &str, now: DateTime<Utc>) -> RateLimitCheck {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records
            .entry(identity.to_string())
            .and_modify(|record| {
                if now - record.window_start > self.window {
                    *record = RateLimitRecord {
                        count: 1,
                        window_start: now,
                    };
                } else {
                    record.count = record.count.saturating_add(1);
                }
            })
            .or_insert(RateLimitRecord {
                count: 1,
                window_start: now,
            });

        RateLimitCheck {
            allowed: record.count <= self.max_requests,
            count: record.count,
            limit: self.max_requests,
            reset_at: record
                .window_start
                .checked_add_signed(self.window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Drops every record whose window has fully elapsed. Returns how many
    /// were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let before = records.len();
        records.retain(|_, record| now - record.window_start <= self.window);
        before - records.len()
    }

    #[cfg(test)]
    pub fn record(&self, identity: &str) -> Option<RateLimitRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .copied()
    }

    pub fn tracked_identities(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Background task that periodically sweeps a [`RateLimiter`].
pub struct RateLimitSweeper {
    handle: JoinHandle<()>,
}

impl RateLimitSweeper {
    pub fn start(limiter: RateLimiter, every: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let removed = limiter.sweep(Utc::now());
                if removed > 0 {
                    tracing::debug!(
                        event = "rate_limit_sweep",
                        removed,
                        remaining = limiter.tracked_identities(),
                    );
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
