//! Counters and snapshots for monitoring a sequence

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the production loop
#[derive(Debug, Default)]
pub(crate) struct SequenceCounters {
    fetched: AtomicU64,
    replayed: AtomicU64,
    captured: AtomicU64,
    peeked: AtomicU64,
    windows_completed: AtomicU64,
    windows_aborted: AtomicU64,
    violations: AtomicU64,
}

impl SequenceCounters {
    pub(crate) fn record_fetch(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replay(&self) {
        self.replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_capture(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_peek(&self) {
        self.peeked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.windows_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_window(&self) {
        self.windows_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_violation(&self) {
        self.violations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, exhausted: bool, active: bool) -> SequenceStats {
        SequenceStats {
            items_fetched: self.fetched.load(Ordering::Relaxed),
            items_replayed: self.replayed.load(Ordering::Relaxed),
            overshoots_captured: self.captured.load(Ordering::Relaxed),
            items_peeked: self.peeked.load(Ordering::Relaxed),
            windows_completed: self.windows_completed.load(Ordering::Relaxed),
            windows_aborted: self.windows_aborted.load(Ordering::Relaxed),
            violations: self.violations.load(Ordering::Relaxed),
            exhausted,
            active,
        }
    }
}

/// Sequence statistics for monitoring and debugging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceStats {
    /// Items pulled from the source and passed through the factory
    pub items_fetched: u64,
    /// Held-back items (overshoot or peeked) handed out again
    pub items_replayed: u64,
    /// Items held back because a window predicate rejected them
    pub overshoots_captured: u64,
    /// Items handed out by `peek` and put back in front of the source
    pub items_peeked: u64,
    /// Terminal operations that ran to completion
    pub windows_completed: u64,
    /// Terminal operations cut short because the next step could not be
    /// scheduled; also counted in `windows_completed`
    pub windows_aborted: u64,
    /// Terminal operations refused because another one was running
    pub violations: u64,
    pub exhausted: bool,
    pub active: bool,
}

impl fmt::Display for SequenceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sequence(fetched={}, replayed={}, windows={}{}{})",
            self.items_fetched,
            self.items_replayed,
            self.windows_completed,
            if self.active { ", active" } else { "" },
            if self.exhausted { ", exhausted" } else { "" }
        )
    }
}
