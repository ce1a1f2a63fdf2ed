//! Shared state between the production loop and the active window

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{SequenceError, SequenceResult};
use crate::sequence_configuration::{SequenceConfig, ViolationPolicy};
use crate::sequence_metrics::SequenceCounters;

/// What the production loop should do after handing over an item
pub(crate) enum Flow<T> {
    /// Schedule the next production step
    Continue,
    /// Stay suspended and drop the handler; it has nothing left to do
    Detach,
    /// Stop and run the completion, passing the rejecting item if any
    Complete(Option<T>),
}

/// The per-item handler and completion handler installed by a window
pub(crate) trait ItemHandler<T>: Send {
    fn on_item(&mut self, item: T) -> Flow<T>;

    /// Called exactly once, with the rejecting item or `None` at exhaustion
    fn on_complete(self: Box<Self>, rejected: Option<T>);
}

/// Exclusive ownership of a sequence for the duration of a terminal operation
///
/// Dropping the guard makes the sequence safe to use again.
pub(crate) struct ActiveGuard {
    safe: Arc<AtomicBool>,
    counters: Arc<SequenceCounters>,
}

impl ActiveGuard {
    /// Release after the operation ran to completion
    pub(crate) fn release(self) {
        self.counters.record_window();
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.safe.store(true, Ordering::Release);
    }
}

pub(crate) struct Context<T> {
    handler: Mutex<Option<Box<dyn ItemHandler<T>>>>,
    exhausted: AtomicBool,
    safe: Arc<AtomicBool>,
    pub(crate) counters: Arc<SequenceCounters>,
    pub(crate) config: SequenceConfig,
}

impl<T> Context<T> {
    pub(crate) fn new(config: SequenceConfig) -> Self {
        Self {
            handler: Mutex::new(None),
            exhausted: AtomicBool::new(false),
            safe: Arc::new(AtomicBool::new(true)),
            counters: Arc::new(SequenceCounters::default()),
            config,
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.config.label
    }

    /// Take exclusive ownership, or report a concurrency violation without
    /// touching any other state
    pub(crate) fn acquire(&self) -> SequenceResult<ActiveGuard> {
        if self
            .safe
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return Ok(ActiveGuard {
                safe: Arc::clone(&self.safe),
                counters: Arc::clone(&self.counters),
            });
        }

        self.counters.record_violation();
        let err = SequenceError::ConcurrencyViolation {
            label: self.config.label.clone(),
        };
        log::error!("{}", err);
        if self.config.violation_policy == ViolationPolicy::Panic {
            panic!("{}", err);
        }
        Err(err)
    }

    pub(crate) fn is_safe(&self) -> bool {
        self.safe.load(Ordering::Acquire)
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_exhausted(&self) {
        if !self.exhausted.swap(true, Ordering::AcqRel) {
            log::debug!("[{}] source exhausted", self.label());
        }
    }

    /// Install a handler, replacing whatever a previous window left behind
    pub(crate) fn install(&self, handler: Box<dyn ItemHandler<T>>) {
        *self.handler.lock() = Some(handler);
    }

    pub(crate) fn take_handler(&self) -> Option<Box<dyn ItemHandler<T>>> {
        self.handler.lock().take()
    }

    /// Put a running handler back after it processed an item
    ///
    /// Only a peek can have been installed while the handler was out, since
    /// every other handler needs the guard the running one holds. The
    /// running handler wins and the intruding peek is dropped.
    pub(crate) fn restore(&self, handler: Box<dyn ItemHandler<T>>) {
        let displaced = self.handler.lock().replace(handler);
        if displaced.is_some() {
            log::error!(
                "[{}] peek issued while a terminal operation was running, dropping it",
                self.label()
            );
        }
    }
}
