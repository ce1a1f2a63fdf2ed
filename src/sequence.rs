//! RSequence - a lazy, pull-based sequence over a slow item source
//!
//! A [`Sequence`] owns its source and runs a single cooperative production
//! loop. Every production step hands one item to whichever window is
//! currently active and then suspends; the next step only runs when the
//! window asks for it, and always as a fresh task on the tokio runtime, so
//! the call stack never grows with the length of the source.
//!
//! Windows are created with [`Sequence::take_while`], [`Sequence::take`] and
//! [`Sequence::take_all`]. When a predicate rejects an item, the item is held
//! back in a single-item overshoot slot and becomes the first item the next
//! window sees.
//!
//! # Examples
//! ```
//! use rs2_sequence::*;
//!
//! # tokio_test::block_on(async {
//! let sequence = Sequence::from_source(IterSource::new(vec![1, 2, 3, 4, 5]));
//!
//! let head = sequence.take_while(|x| *x < 4).join_async().unwrap().await.unwrap();
//! assert_eq!(head, vec![1, 2, 3]);
//!
//! let rest = sequence.take_all().join_async().unwrap().await.unwrap();
//! assert_eq!(rest, vec![4, 5]);
//! # });
//! ```

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;

use crate::context::{Context, Flow, ItemHandler};
use crate::deferred::{self, Deferred};
use crate::error::{SequenceError, SequenceResult};
use crate::sequence_configuration::SequenceConfig;
use crate::sequence_metrics::{SequenceCounters, SequenceStats};
use crate::source::Source;
use crate::view::{Precondition, View};

/// Position of the production cursor
pub(crate) enum Cursor<T> {
    /// Pull the next item from the source
    Fetching,
    /// Hand out a held-back item before touching the source again
    Replaying(T),
}

/// Single-item slot for the item that overshot a window
pub(crate) struct OvershootSlot<T> {
    cursor: Mutex<Cursor<T>>,
    counters: Arc<SequenceCounters>,
}

impl<T> OvershootSlot<T> {
    fn new(counters: Arc<SequenceCounters>) -> Self {
        Self {
            cursor: Mutex::new(Cursor::Fetching),
            counters,
        }
    }

    /// Hold back the item that overshot a window
    pub(crate) fn hold(&self, item: T) {
        self.counters.record_capture();
        *self.cursor.lock() = Cursor::Replaying(item);
    }

    /// Put a peeked item back in front of the source
    fn hold_peeked(&self, item: T) {
        self.counters.record_peek();
        *self.cursor.lock() = Cursor::Replaying(item);
    }

    /// Take the held item, switching the cursor back to fetching
    fn replay(&self) -> Option<T> {
        match std::mem::replace(&mut *self.cursor.lock(), Cursor::Fetching) {
            Cursor::Replaying(item) => {
                self.counters.record_replay();
                Some(item)
            }
            Cursor::Fetching => None,
        }
    }
}

/// Handle used by views to resume the production loop
pub(crate) trait Resume: Send + Sync {
    /// Schedule one production step on the runtime. Never runs it inline.
    fn resume(&self) -> SequenceResult<()>;
}

/// The cooperative production loop shared by every view of a sequence
struct ProductionLoop<S: Source, T> {
    this: Weak<ProductionLoop<S, T>>,
    source: tokio::sync::Mutex<S>,
    factory: Box<dyn Fn(S::Raw) -> T + Send + Sync>,
    slot: Arc<OvershootSlot<T>>,
    context: Arc<Context<T>>,
}

impl<S, T> ProductionLoop<S, T>
where
    S: Source,
    T: Send + 'static,
{
    async fn step(self: Arc<Self>) {
        if self.context.is_exhausted() {
            self.finish();
            return;
        }

        let item = match self.slot.replay() {
            Some(item) => Some(item),
            None => self.fetch().await,
        };

        match item {
            Some(item) => self.dispatch(item),
            None => self.finish(),
        }
    }

    async fn fetch(&self) -> Option<T> {
        let raw = {
            let mut source = self.source.lock().await;
            if !source.has_next() {
                return None;
            }
            source.next().await?
        };
        self.context.counters.record_fetch();
        Some((self.factory)(raw))
    }

    fn dispatch(&self, item: T) {
        let Some(mut handler) = self.context.take_handler() else {
            log::debug!("[{}] no active window, holding item", self.context.label());
            *self.slot.cursor.lock() = Cursor::Replaying(item);
            return;
        };

        match handler.on_item(item) {
            Flow::Continue => {
                self.context.restore(handler);
                if let Err(err) = self.resume() {
                    // The window cannot go on; its completion sees `None` as
                    // if the source had ended, but the source is not marked
                    // exhausted and the abort is counted.
                    log::error!(
                        "[{}] failed to resume, window ended early: {}",
                        self.context.label(),
                        err
                    );
                    self.context.counters.record_abort();
                    if let Some(handler) = self.context.take_handler() {
                        handler.on_complete(None);
                    }
                }
            }
            Flow::Detach => {}
            Flow::Complete(rejected) => {
                log::trace!("[{}] window completed", self.context.label());
                handler.on_complete(rejected);
            }
        }
    }

    fn finish(&self) {
        self.context.mark_exhausted();
        if let Some(handler) = self.context.take_handler() {
            handler.on_complete(None);
        }
    }
}

impl<S, T> Resume for ProductionLoop<S, T>
where
    S: Source,
    T: Send + 'static,
{
    fn resume(&self) -> SequenceResult<()> {
        let runtime = Handle::try_current()?;
        let this = self.this.upgrade().ok_or(SequenceError::Abandoned)?;
        runtime.spawn(this.step());
        Ok(())
    }
}

/// Installed by `peek`: re-holds the item it receives and detaches, leaving
/// the loop suspended
struct PeekHandler<T> {
    slot: Arc<OvershootSlot<T>>,
    callback: Option<Box<dyn FnOnce(Option<T>) + Send>>,
}

impl<T> ItemHandler<T> for PeekHandler<T>
where
    T: Clone + Send + 'static,
{
    fn on_item(&mut self, item: T) -> Flow<T> {
        // The item must be back in the slot before the callback can start
        // the next window.
        self.slot.hold_peeked(item.clone());
        if let Some(callback) = self.callback.take() {
            callback(Some(item));
        }
        Flow::Detach
    }

    fn on_complete(self: Box<Self>, _rejected: Option<T>) {
        if let Some(callback) = self.callback {
            callback(None);
        }
    }
}

/// A lazy sequence over a [`Source`], producing items of type `T` through a
/// factory
pub struct Sequence<S: Source, T> {
    production: Arc<ProductionLoop<S, T>>,
}

impl<S> Sequence<S, S::Raw>
where
    S: Source,
    S::Raw: Clone,
{
    /// Create a sequence whose items are the raw source items
    pub fn from_source(source: S) -> Self {
        Self::new(source, |raw| raw)
    }
}

impl<S, T> Sequence<S, T>
where
    S: Source,
    T: Clone + Send + 'static,
{
    /// Create a new sequence with default configuration
    pub fn new<F>(source: S, factory: F) -> Self
    where
        F: Fn(S::Raw) -> T + Send + Sync + 'static,
    {
        Self::with_config(source, factory, SequenceConfig::default())
    }

    /// Create a new sequence with custom configuration
    pub fn with_config<F>(source: S, factory: F, config: SequenceConfig) -> Self
    where
        F: Fn(S::Raw) -> T + Send + Sync + 'static,
    {
        let context = Arc::new(Context::new(config));
        let slot = Arc::new(OvershootSlot::new(Arc::clone(&context.counters)));
        let production = Arc::new_cyclic(|this| ProductionLoop {
            this: this.clone(),
            source: tokio::sync::Mutex::new(source),
            factory: Box::new(factory),
            slot,
            context,
        });
        Self { production }
    }

    /// Look at the next item without consuming it
    ///
    /// The callback gets `None` once the source is exhausted; in that case
    /// it runs synchronously. Peeking is not guarded against running
    /// terminal operations and must not overlap with one.
    pub fn peek<F>(&self, callback: F) -> SequenceResult<()>
    where
        F: FnOnce(Option<T>) + Send + 'static,
    {
        let context = &self.production.context;
        if context.is_exhausted() {
            callback(None);
            return Ok(());
        }

        context.install(Box::new(PeekHandler {
            slot: Arc::clone(&self.production.slot),
            callback: Some(Box::new(callback)),
        }));
        if let Err(err) = self.production.resume() {
            drop(context.take_handler());
            return Err(err);
        }
        Ok(())
    }

    /// Future-returning form of [`Sequence::peek`]
    pub fn peek_async(&self) -> SequenceResult<Deferred<Option<T>>> {
        let (complete, result) = deferred::channel();
        self.peek(complete)?;
        Ok(result)
    }

    /// Window over the remaining items until `predicate` returns false
    ///
    /// The rejecting item stays in the sequence and is the first item the
    /// next window sees. The predicate runs exactly once per item.
    pub fn take_while<P>(&self, mut predicate: P) -> View<T>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        let slot = Arc::clone(&self.production.slot);
        let precondition = Precondition::new(move |item: &T| {
            let accepted = predicate(item);
            if !accepted {
                slot.hold(item.clone());
            }
            accepted
        });
        self.view(Some(precondition))
    }

    /// Window over the next `n` items
    ///
    /// Each call starts its own counter. Like every bounded window, the item
    /// after the last taken one is fetched and held back for the next window.
    pub fn take(&self, n: usize) -> View<T> {
        let mut remaining = n;
        self.take_while(move |_| {
            if remaining > 0 {
                remaining -= 1;
                true
            } else {
                false
            }
        })
    }

    /// Window over everything left in the source
    pub fn take_all(&self) -> View<T> {
        self.view(None)
    }

    fn view(&self, precondition: Option<Arc<Precondition<T>>>) -> View<T> {
        let production: Arc<dyn Resume> = self.production.clone();
        View::new(
            production,
            Arc::clone(&self.production.context),
            precondition,
        )
    }

    /// Whether the source has reported that it has no more items
    pub fn is_exhausted(&self) -> bool {
        self.production.context.is_exhausted()
    }

    /// Whether a terminal operation is currently running
    pub fn is_active(&self) -> bool {
        !self.production.context.is_safe()
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.production.context.config
    }

    /// Get sequence statistics for monitoring
    pub fn stats(&self) -> SequenceStats {
        let context = &self.production.context;
        context
            .counters
            .snapshot(context.is_exhausted(), !context.is_safe())
    }
}

impl<S: Source, T> std::fmt::Debug for Sequence<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let context = &self.production.context;
        f.debug_struct("Sequence")
            .field("label", &context.config.label)
            .field("exhausted", &context.is_exhausted())
            .field("active", &!context.is_safe())
            .finish()
    }
}
