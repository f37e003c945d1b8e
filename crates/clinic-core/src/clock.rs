//! Time source used by booking rules and reconciliation stamps.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{NaiveDateTime, Utc};

use crate::util::{from_millis, to_millis, truncate_to_millis};

/// Source of "now". All timestamps are naive UTC with millisecond precision.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        truncate_to_millis(Utc::now().naive_utc())
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            millis: AtomicI64::new(to_millis(now)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.millis.store(to_millis(now), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        from_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}
