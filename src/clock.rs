//! Time sources.
//!
//! The engine reads "now" through a [`Clock`] so expiry can be tested without
//! waiting a year. Timestamps are unix seconds, like every timestamp column.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

pub const SECONDS_PER_DAY: i64 = 86_400;

pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time in unix seconds.
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Settable clock for tests and simulations. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now)),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.advance_secs(days * SECONDS_PER_DAY);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
