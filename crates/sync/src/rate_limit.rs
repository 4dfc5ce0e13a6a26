//! Fixed-window limiter for submissions to the authority.

use chrono::{DateTime, TimeDelta, Utc};

/// Allows at most `max_per_window` deliveries per window.
#[derive(Debug, Clone)]
pub struct DeliveryRateLimiter {
    max_per_window: u32,
    window: TimeDelta,
    count: u32,
    window_start: Option<DateTime<Utc>>,
}

impl DeliveryRateLimiter {
    pub fn new(max_per_window: u32, window: TimeDelta) -> Self {
        Self {
            max_per_window,
            window,
            count: 0,
            window_start: None,
        }
    }

    pub fn per_minute(max: u32) -> Self {
        Self::new(max, TimeDelta::minutes(1))
    }

    /// Returns `true` and counts the delivery if allowed, `false` if limited.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> bool {
        // Reset window if expired
        match self.window_start {
            Some(start) if now - start < self.window => {}
            _ => {
                self.window_start = Some(now);
                self.count = 0;
            }
        }

        if self.count >= self.max_per_window {
            return false;
        }
        self.count += 1;
        true
    }

    /// Deliveries left in the current window.
    pub fn remaining(&self, now: DateTime<Utc>) -> u32 {
        match self.window_start {
            Some(start) if now - start < self.window => {
                self.max_per_window.saturating_sub(self.count)
            }
            _ => self.max_per_window,
        }
    }
}
