//! Deferred result of work queued with `enqueue_async`

use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::ExecutorError;

pub(crate) type Completer<T> = oneshot::Sender<Result<T, ExecutorError>>;

/// Resolves once the owner thread has run the work item
///
/// Awaiting or `wait`ing on the owner thread itself deadlocks, since the
/// item can only run during that thread's next drain. Use `try_take` there.
#[must_use = "dropping a Completion discards the work item's outcome"]
#[derive(Debug)]
pub struct Completion<T> {
    receiver: oneshot::Receiver<Result<T, ExecutorError>>,
}

impl<T> Completion<T> {
    pub(crate) fn pair() -> (Completer<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// Block the calling thread until the work item has run
    pub fn wait(self) -> Result<T, ExecutorError> {
        futures::executor::block_on(self)
    }

    /// Non-blocking check; `None` while the item is still queued
    pub fn try_take(&mut self) -> Option<Result<T, ExecutorError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Some(Err(ExecutorError::Dropped)),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, ExecutorError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(ExecutorError::Dropped)))
    }
}
