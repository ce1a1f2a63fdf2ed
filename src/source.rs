//! Item sources feeding a sequence
//!
//! A source answers "is there more?" synchronously and fetches the next raw
//! item asynchronously. The production loop only calls `next` after
//! `has_next` returned true.

use async_trait::async_trait;
use futures_core::stream::FusedStream;
use futures_core::Stream;
use futures_util::stream::Fuse;
use futures_util::StreamExt;

/// Main trait for ordered item sources
#[async_trait]
pub trait Source: Send + 'static {
    /// Raw item type handed to the sequence's factory
    type Raw: Send + 'static;

    /// Whether another item can be fetched. Must not consume anything.
    fn has_next(&self) -> bool;

    /// Fetch the next raw item. `None` means the source ended after all,
    /// which the loop treats exactly like `has_next` returning false.
    async fn next(&mut self) -> Option<Self::Raw>;
}

/// Source over any in-memory iterator, primed one item ahead so that
/// `has_next` is exact
pub struct IterSource<I: Iterator> {
    iter: I,
    pending: Option<I::Item>,
}

impl<I: Iterator> IterSource<I> {
    pub fn new<T>(items: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        let mut iter = items.into_iter();
        let pending = iter.next();
        Self { iter, pending }
    }
}

#[async_trait]
impl<I> Source for IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    type Raw = I::Item;

    fn has_next(&self) -> bool {
        self.pending.is_some()
    }

    async fn next(&mut self) -> Option<Self::Raw> {
        let item = self.pending.take()?;
        self.pending = self.iter.next();
        Some(item)
    }
}

/// Source over an async stream
///
/// Nothing is read ahead: `has_next` stays true until the stream has
/// actually ended, and a `next` that finds the end returns `None`.
pub struct StreamSource<St: Stream> {
    stream: Fuse<St>,
}

impl<St> StreamSource<St>
where
    St: Stream + Unpin + Send + 'static,
    St::Item: Send + 'static,
{
    pub fn new(stream: St) -> Self {
        Self {
            stream: stream.fuse(),
        }
    }
}

#[async_trait]
impl<St> Source for StreamSource<St>
where
    St: Stream + Unpin + Send + 'static,
    St::Item: Send + 'static,
{
    type Raw = St::Item;

    fn has_next(&self) -> bool {
        !self.stream.is_terminated()
    }

    async fn next(&mut self) -> Option<Self::Raw> {
        self.stream.next().await
    }
}
