//! Future adapters for the callback-based operations

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::{SequenceError, SequenceResult};

/// The eventual result of a started sequence operation
///
/// The operation is already running by the time a `Deferred` exists; awaiting
/// it only waits for the completion callback.
#[derive(Debug)]
pub struct Deferred<R> {
    receiver: oneshot::Receiver<R>,
}

impl<R> Future for Deferred<R> {
    type Output = SequenceResult<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(SequenceError::from))
    }
}

/// Create a completion callback together with the future it resolves
pub(crate) fn channel<R>() -> (impl FnOnce(R) + Send + 'static, Deferred<R>)
where
    R: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let complete = move |value: R| {
        if sender.send(value).is_err() {
            log::trace!("deferred result dropped before completion");
        }
    };
    (complete, Deferred { receiver })
}
