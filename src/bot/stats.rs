use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};

#[derive(Debug, Default)]
pub struct Stats {
    pub(crate) fetches: AtomicU64,
    pub(crate) fetch_failures: AtomicU64,
    pub(crate) updates: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) handler_failures: AtomicU64,
    started_at: Mutex<Option<DateTime<Local>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub fetches: u64,
    pub fetch_failures: u64,
    pub updates: u64,
    pub dispatched: u64,
    pub dropped: u64,
    pub handler_failures: u64,
    pub started_at: Option<DateTime<Local>>,
}

impl Stats {
    pub(crate) fn incr(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn mark_started(&self) {
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Local::now());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            started_at: *self.started_at.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl StatsSnapshot {
    pub fn uptime(&self) -> Option<chrono::Duration> {
        self.started_at.map(|at| Local::now() - at)
    }
}
