//! Asynchronous request bus
//!
//! Same registration and reduction rules as `RequestBus`, but responders
//! return deferred values and the whole chain runs on a worker thread.
//! Every responder is called in registration order and every future is
//! driven to completion. Each responder's panic is caught separately, so a
//! failing responder never takes another one's value with it.
//!
//! With `Last`, the result handler only waits for the last-registered
//! responder; earlier futures finish on another worker and their failures
//! are logged. With `Collect`, the handler waits for all of them.
//!
//! The result handler runs on the worker thread. Callers that need the value
//! on the owner thread must hop through the `ThreadAffineExecutor`
//! themselves.

use futures::executor::block_on;
use futures::future::{self, join_all, BoxFuture, FutureExt};
use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use super::reduce::{Last, Outcome, Reduce};
use super::registry::Registry;
use super::subscribers::AsyncResponder;
use super::workers::Workers;
use crate::error::{panic_message, DispatchError};
use crate::name::Name;

const LOG_TARGET: &str = "catalog_dispatch::dispatch";

pub struct AsyncRequestBus<I, O, R = Last> {
    registry: Registry<AsyncResponder<I, O>>,
    workers: Workers,
    _reduce: PhantomData<fn() -> R>,
}

impl<I, O, R: Reduce<O>> AsyncRequestBus<I, O, R> {
    pub fn new() -> Self {
        Self::with_workers(Workers::Global)
    }

    pub fn with_workers(workers: Workers) -> Self {
        Self {
            registry: Registry::new(),
            workers,
            _reduce: PhantomData,
        }
    }

    pub fn register(&self, name: impl Into<Name>, responder: AsyncResponder<I, O>) {
        self.registry.register(name.into(), responder);
    }

    pub fn unregister(&self, name: impl AsRef<str>, responder: &AsyncResponder<I, O>) {
        self.registry.unregister(name.as_ref(), responder);
    }

    pub fn subscriber_count(&self, name: impl AsRef<str>) -> usize {
        self.registry.subscriber_count(name.as_ref())
    }

    pub fn names(&self) -> Vec<Name> {
        self.registry.names()
    }

    pub fn clear(&self) {
        self.registry.clear();
    }
}

impl<I, O, R> AsyncRequestBus<I, O, R>
where
    I: Send + 'static,
    O: Send + 'static,
    R: Reduce<O>,
{
    /// Dispatch the chain for `name` to a worker and return immediately
    ///
    /// `on_result` receives the reduced outcome: under `Last`, the
    /// last-registered responder's value, or `Err` if that responder
    /// panicked. It is never called when nothing is registered under `name`.
    pub fn raise(
        &self,
        name: impl AsRef<str>,
        param: I,
        on_result: impl FnOnce(Result<R::Output, DispatchError>) + Send + 'static,
    ) {
        let name = name.as_ref();
        let chain = self.registry.chain(name);
        if chain.is_empty() {
            tracing::trace!(target: LOG_TARGET, name, "async request with no responders");
            return;
        }

        tracing::debug!(target: LOG_TARGET, name, responders = chain.len(), "async request");
        let name = Name::new(name);
        let workers = self.workers.clone();
        self.workers.spawn(move || {
            let mut pending: Vec<_> = chain
                .iter()
                .map(|responder| start(&name, responder, &param))
                .collect();

            let outcomes = if R::LAST_ONLY {
                let last = pending.pop();
                if !pending.is_empty() {
                    workers.spawn(move || {
                        block_on(join_all(pending));
                    });
                }
                last.map(|future| vec![block_on(future)]).unwrap_or_default()
            } else {
                block_on(join_all(pending))
            };

            if let Some(result) = R::reduce_outcomes(outcomes) {
                on_result(result);
            }
        });
    }
}

/// Call `responder` and wrap its future so that a panic in either becomes an
/// `Err` outcome
fn start<I: 'static, O>(
    name: &Name,
    responder: &AsyncResponder<I, O>,
    param: &I,
) -> BoxFuture<'static, Outcome<O>>
where
    O: Send + 'static,
{
    let name = name.clone();
    match panic::catch_unwind(AssertUnwindSafe(|| responder.call(param))) {
        Ok(deferred) => AssertUnwindSafe(deferred)
            .catch_unwind()
            .map(move |outcome| outcome.map_err(|payload| failure(&name, payload)))
            .boxed(),
        Err(payload) => future::ready(Err(failure(&name, payload))).boxed(),
    }
}

fn failure(name: &Name, payload: Box<dyn Any + Send>) -> DispatchError {
    let message = panic_message(payload.as_ref());
    tracing::error!(
        target: LOG_TARGET,
        name = %name,
        "Responder panicked during async request: {}",
        message
    );
    DispatchError::SubscriberPanicked {
        name: name.clone(),
        message,
    }
}

impl<O, R> AsyncRequestBus<(), O, R>
where
    O: Send + 'static,
    R: Reduce<O>,
{
    /// `raise` for responders that take no input
    pub fn fetch(
        &self,
        name: impl AsRef<str>,
        on_result: impl FnOnce(Result<R::Output, DispatchError>) + Send + 'static,
    ) {
        self.raise(name, (), on_result);
    }
}

impl<I, O, R: Reduce<O>> Default for AsyncRequestBus<I, O, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O, R> Clone for AsyncRequestBus<I, O, R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            workers: self.workers.clone(),
            _reduce: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::reduce::Collect;
    use crate::config::WorkerConfig;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    #[test]
    fn test_last_registered_result_delivered() {
        let bus = AsyncRequestBus::<u32, u32>::new();
        let (side_tx, side_rx) = unbounded();

        bus.register(
            "FetchProducts",
            AsyncResponder::new(move |n: &u32| {
                let side_tx = side_tx.clone();
                let n = *n;
                async move {
                    let _ = side_tx.send(n + 1);
                    n + 1
                }
            }),
        );
        bus.register(
            "FetchProducts",
            AsyncResponder::new(|n: &u32| {
                let n = *n;
                async move { n * 100 }
            }),
        );

        let (tx, rx) = unbounded();
        bus.raise("FetchProducts", 2, move |result| {
            let _ = tx.send(result);
        });

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Ok(200));
        // the earlier responder still runs for its side effect
        assert_eq!(side_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 3);
    }

    #[test]
    fn test_handler_runs_on_worker_thread() {
        let bus = AsyncRequestBus::<(), u8>::new();
        bus.register("n", AsyncResponder::producer(|| async { 1 }));

        let (tx, rx) = unbounded();
        let caller = std::thread::current().id();
        bus.fetch("n", move |_| {
            let _ = tx.send(std::thread::current().id());
        });

        let thread = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(thread, caller);
    }

    #[test]
    fn test_unregistered_name_never_calls_handler() {
        let bus = AsyncRequestBus::<(), u8>::new();
        let (tx, rx) = unbounded::<()>();

        bus.fetch("missing", move |_| {
            let _ = tx.send(());
        });

        // the handler was dropped without running, closing the channel
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_panicking_future_is_reported() {
        let bus = AsyncRequestBus::<(), u8>::new();
        bus.register(
            "n",
            AsyncResponder::<(), u8>::producer(|| async { panic!("server unreachable") }),
        );

        let (tx, rx) = unbounded();
        bus.fetch("n", move |result| {
            let _ = tx.send(result);
        });

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            result,
            Err(DispatchError::SubscriberPanicked {
                name: Name::from("n"),
                message: "server unreachable".to_string(),
            })
        );
    }

    #[test]
    fn test_collect_reducer() {
        let bus = AsyncRequestBus::<(), u8, Collect>::new();
        bus.register("n", AsyncResponder::producer(|| async { 1 }));
        bus.register("n", AsyncResponder::producer(|| async { 2 }));

        let (tx, rx) = unbounded();
        bus.fetch("n", move |result| {
            let _ = tx.send(result);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(vec![1, 2]));
    }

    #[test]
    fn test_earlier_panic_does_not_replace_last_value() {
        let bus = AsyncRequestBus::<(), u32>::new();
        bus.register(
            "n",
            AsyncResponder::<(), u32>::producer(|| async { panic!("side effect failed") }),
        );
        bus.register("n", AsyncResponder::producer(|| async { 2 }));

        let (tx, rx) = unbounded();
        bus.fetch("n", move |result| {
            let _ = tx.send(result);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(2));
    }

    #[test]
    fn test_earlier_panic_while_calling_is_contained() {
        let bus = AsyncRequestBus::<u32, u32>::new();
        bus.register(
            "n",
            AsyncResponder::new(|_: &u32| -> futures::future::Ready<u32> { panic!("bad input") }),
        );
        bus.register(
            "n",
            AsyncResponder::new(|n: &u32| {
                let n = *n;
                async move { n + 1 }
            }),
        );

        let (tx, rx) = unbounded();
        bus.raise("n", 4, move |result| {
            let _ = tx.send(result);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(5));
    }

    #[test]
    fn test_stalled_earlier_responder_does_not_block_last() {
        let config = WorkerConfig {
            threads: 2,
            thread_name: "async-request-test".to_string(),
        };
        let bus = AsyncRequestBus::<(), u32>::with_workers(Workers::from_config(&config).unwrap());
        bus.register("n", AsyncResponder::producer(futures::future::pending::<u32>));
        bus.register("n", AsyncResponder::producer(|| async { 7 }));

        let (tx, rx) = unbounded();
        bus.fetch("n", move |result| {
            let _ = tx.send(result);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(7));
    }

    #[test]
    fn test_collect_keeps_values_of_completed_responders() {
        let bus = AsyncRequestBus::<(), u8, Collect>::new();
        bus.register("n", AsyncResponder::producer(|| async { 1 }));
        bus.register(
            "n",
            AsyncResponder::<(), u8>::producer(|| async { panic!("one failed") }),
        );
        bus.register("n", AsyncResponder::producer(|| async { 3 }));

        let (tx, rx) = unbounded();
        bus.fetch("n", move |result| {
            let _ = tx.send(result);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(vec![1, 3]));
    }
}
