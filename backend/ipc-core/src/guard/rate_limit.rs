//! Per-channel request window.
//!
//! Each channel owns one window. When `rate_limit_ms` has elapsed since the
//! window opened it is reset; inside a window at most
//! `max_requests_per_window` calls are admitted.

use crate::clock::Clock;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::warn;

#[derive(Debug)]
struct RateLimitWindow {
    timestamps: Vec<u64>,
    window_start: u64,
}

impl RateLimitWindow {
    fn new(now: u64) -> Self {
        Self {
            timestamps: Vec::new(),
            window_start: now,
        }
    }
}

pub struct RateLimiter {
    windows: Mutex<HashMap<String, RateLimitWindow>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Admit or reject one call on `channel`.
    ///
    /// Read-count and append happen under one lock, so two concurrent calls on
    /// the same channel can never both take the last slot.
    pub fn try_acquire(&self, channel: &str, rate_limit_ms: u64, max_requests: u32) -> bool {
        let now = self.clock.now_ms();

        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter lock poisoned, recovering");
            poisoned.into_inner()
        });

        let window = windows
            .entry(channel.to_string())
            .or_insert_with(|| RateLimitWindow::new(now));

        if now.saturating_sub(window.window_start) >= rate_limit_ms {
            window.timestamps.clear();
            window.window_start = now;
        }

        if window.timestamps.len() >= max_requests as usize {
            return false;
        }

        window.timestamps.push(now);
        true
    }

    /// Calls admitted in the channel's current window.
    pub fn admitted_in_window(&self, channel: &str) -> usize {
        self.windows
            .lock()
            .map(|windows| windows.get(channel).map_or(0, |w| w.timestamps.len()))
            .unwrap_or_default()
    }
}
