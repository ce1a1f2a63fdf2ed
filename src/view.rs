//! Windows over a sequence and their terminal operations
//!
//! A [`View`] does nothing until one of its terminal operations runs:
//!
//! - [`View::each`] visits every item in the window
//! - [`View::seek`] skips past the window
//! - [`View::map`] collects transformed items
//! - [`View::join`] collects the items themselves
//!
//! Only one terminal operation may run per sequence at a time. Starting a
//! second one, on the same view or on any other view of the sequence, fails
//! with [`SequenceError::ConcurrencyViolation`] before anything is touched.
//! Completion callbacks run after the sequence has been released, so they
//! may start the next window right away.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::context::{ActiveGuard, Context, Flow, ItemHandler};
use crate::deferred::{self, Deferred};
use crate::error::{SequenceError, SequenceResult};
use crate::sequence::Resume;

/// Window predicate, already wrapped so that a rejected item is held back
pub(crate) struct Precondition<T> {
    test: Mutex<Box<dyn FnMut(&T) -> bool + Send>>,
}

impl<T> Precondition<T> {
    pub(crate) fn new<P>(test: P) -> Arc<Self>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        Arc::new(Self {
            test: Mutex::new(Box::new(test)),
        })
    }

    fn accepts(&self, item: &T) -> bool {
        let mut guard = self.test.lock();
        let test = &mut **guard;
        test(item)
    }
}

/// `None` means the window never rejects anything
fn admits<T>(precondition: &Option<Arc<Precondition<T>>>, item: &T) -> bool {
    match precondition {
        Some(precondition) => precondition.accepts(item),
        None => true,
    }
}

/// Handler behind `each` and `seek`
struct Traverse<T> {
    precondition: Option<Arc<Precondition<T>>>,
    visit: Box<dyn FnMut(T) + Send>,
    done: Box<dyn FnOnce(Option<T>) + Send>,
    guard: ActiveGuard,
}

impl<T: Send + 'static> ItemHandler<T> for Traverse<T> {
    fn on_item(&mut self, item: T) -> Flow<T> {
        if !admits(&self.precondition, &item) {
            return Flow::Complete(Some(item));
        }
        (self.visit)(item);
        Flow::Continue
    }

    fn on_complete(self: Box<Self>, rejected: Option<T>) {
        let Traverse { guard, done, .. } = *self;
        guard.release();
        done(rejected);
    }
}

/// Handler behind `map` and `join`
struct Accumulate<T, U> {
    precondition: Option<Arc<Precondition<T>>>,
    transform: Box<dyn FnMut(T) -> U + Send>,
    items: Vec<U>,
    done: Box<dyn FnOnce(Vec<U>) + Send>,
    guard: ActiveGuard,
}

impl<T, U> ItemHandler<T> for Accumulate<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    fn on_item(&mut self, item: T) -> Flow<T> {
        if !admits(&self.precondition, &item) {
            return Flow::Complete(Some(item));
        }
        self.items.push((self.transform)(item));
        Flow::Continue
    }

    // The rejecting item is already held back by the precondition.
    fn on_complete(self: Box<Self>, _rejected: Option<T>) {
        let Accumulate {
            guard, items, done, ..
        } = *self;
        guard.release();
        done(items);
    }
}

/// A window over a sequence, optionally bounded by a predicate
pub struct View<T> {
    production: Arc<dyn Resume>,
    context: Arc<Context<T>>,
    precondition: Option<Arc<Precondition<T>>>,
}

impl<T> View<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(
        production: Arc<dyn Resume>,
        context: Arc<Context<T>>,
        precondition: Option<Arc<Precondition<T>>>,
    ) -> Self {
        Self {
            production,
            context,
            precondition,
        }
    }

    /// Whether this window stops at a predicate rejection
    pub fn has_predicate(&self) -> bool {
        self.precondition.is_some()
    }

    /// Run `on_item` for every item in the window
    ///
    /// `on_done` receives the item that ended the window, or `None` when the
    /// source ran out. If the runtime goes away mid-window, `on_done` also
    /// receives `None`; tell the cases apart with [`Sequence::is_exhausted`]
    /// or `SequenceStats::windows_aborted`.
    ///
    /// [`Sequence::is_exhausted`]: crate::Sequence::is_exhausted
    pub fn each<F, D>(&self, on_item: F, on_done: D) -> SequenceResult<()>
    where
        F: FnMut(T) + Send + 'static,
        D: FnOnce(Option<T>) + Send + 'static,
    {
        self.launch(|guard| Traverse {
            precondition: self.precondition.clone(),
            visit: Box::new(on_item),
            done: Box::new(on_done),
            guard,
        })
    }

    /// Skip every item in the window
    ///
    /// Meant for views with a predicate. Without one it drains the source,
    /// logging a warning (or failing, under `strict_seek`).
    pub fn seek<D>(&self, on_done: D) -> SequenceResult<()>
    where
        D: FnOnce(Option<T>) + Send + 'static,
    {
        if self.precondition.is_none() {
            if self.context.config.strict_seek {
                return Err(SequenceError::MissingPredicate { operation: "seek" });
            }
            log::warn!(
                "[{}] seek must be used with a predicate",
                self.context.label()
            );
        }

        self.launch(|guard| Traverse {
            precondition: self.precondition.clone(),
            visit: Box::new(|_| {}),
            done: Box::new(on_done),
            guard,
        })
    }

    /// Collect `transform(item)` for every item in the window
    pub fn map<U, F, D>(&self, transform: F, on_done: D) -> SequenceResult<()>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
        D: FnOnce(Vec<U>) + Send + 'static,
    {
        self.launch(|guard| Accumulate {
            precondition: self.precondition.clone(),
            transform: Box::new(transform),
            items: Vec::new(),
            done: Box::new(on_done),
            guard,
        })
    }

    /// Collect every item in the window
    pub fn join<D>(&self, on_done: D) -> SequenceResult<()>
    where
        D: FnOnce(Vec<T>) + Send + 'static,
    {
        self.map(|item| item, on_done)
    }

    /// Future-returning form of [`View::each`]
    pub fn each_async<F>(&self, on_item: F) -> SequenceResult<Deferred<Option<T>>>
    where
        F: FnMut(T) + Send + 'static,
    {
        let (complete, result) = deferred::channel();
        self.each(on_item, complete)?;
        Ok(result)
    }

    /// Future-returning form of [`View::seek`]
    pub fn seek_async(&self) -> SequenceResult<Deferred<Option<T>>> {
        let (complete, result) = deferred::channel();
        self.seek(complete)?;
        Ok(result)
    }

    /// Future-returning form of [`View::map`]
    pub fn map_async<U, F>(&self, transform: F) -> SequenceResult<Deferred<Vec<U>>>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        let (complete, result) = deferred::channel();
        self.map(transform, complete)?;
        Ok(result)
    }

    /// Future-returning form of [`View::join`]
    pub fn join_async(&self) -> SequenceResult<Deferred<Vec<T>>> {
        let (complete, result) = deferred::channel();
        self.join(complete)?;
        Ok(result)
    }

    /// Take ownership of the sequence, install the handler and schedule the
    /// first production step
    fn launch<H, B>(&self, build: B) -> SequenceResult<()>
    where
        H: ItemHandler<T> + 'static,
        B: FnOnce(ActiveGuard) -> H,
    {
        let guard = self.context.acquire()?;
        let handler = Box::new(build(guard));

        if self.context.is_exhausted() {
            log::debug!(
                "[{}] window opened on exhausted sequence",
                self.context.label()
            );
            handler.on_complete(None);
            return Ok(());
        }

        self.context.install(handler);
        if let Err(err) = self.production.resume() {
            // Nothing ran yet; dropping the handler releases the sequence.
            drop(self.context.take_handler());
            return Err(err);
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for View<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("sequence", &self.context.config.label)
            .field("has_predicate", &self.precondition.is_some())
            .finish()
    }
}
