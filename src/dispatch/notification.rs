//! Notification bus
//!
//! Fire-and-forget pub/sub keyed by name. Every listener registered under a
//! name is invoked in registration order as one chain:
//!
//! - `raise` runs the chain on the calling thread. A panicking listener is
//!   not caught; it unwinds to the caller and the listeners after it do not
//!   run for that raise.
//! - `raise_async` runs the chain on a worker thread and returns
//!   immediately. A panic there cannot reach the caller; it is logged, and
//!   `raise_async_with` also hands it to a completion callback.

use std::panic::{self, AssertUnwindSafe};

use super::registry::Registry;
use super::subscribers::Listener;
use super::workers::Workers;
use crate::error::{panic_message, DispatchError};
use crate::name::Name;

const LOG_TARGET: &str = "catalog_dispatch::dispatch";

/// Pub/sub bus for payloads of type `A`
pub struct NotificationBus<A> {
    registry: Registry<Listener<A>>,
    workers: Workers,
}

/// Notification bus without payload
pub type Signal = NotificationBus<()>;

impl<A> NotificationBus<A> {
    /// Create a bus that runs async chains on rayon's global pool
    pub fn new() -> Self {
        Self::with_workers(Workers::Global)
    }

    pub fn with_workers(workers: Workers) -> Self {
        Self {
            registry: Registry::new(),
            workers,
        }
    }

    /// Append `listener` to the chain for `name`
    pub fn register(&self, name: impl Into<Name>, listener: Listener<A>) {
        self.registry.register(name.into(), listener);
    }

    /// Remove one registration of `listener`; no-op if it is not registered
    pub fn unregister(&self, name: impl AsRef<str>, listener: &Listener<A>) {
        self.registry.unregister(name.as_ref(), listener);
    }

    /// Invoke every listener for `name` on this thread, in registration order
    pub fn raise(&self, name: impl AsRef<str>, args: A) {
        let name = name.as_ref();
        let chain = self.registry.chain(name);
        if chain.is_empty() {
            tracing::trace!(target: LOG_TARGET, name, "raise with no listeners");
            return;
        }

        tracing::debug!(target: LOG_TARGET, name, listeners = chain.len(), "raise");
        for listener in &chain {
            listener.call(&args);
        }
    }

    pub fn subscriber_count(&self, name: impl AsRef<str>) -> usize {
        self.registry.subscriber_count(name.as_ref())
    }

    /// Names that currently have at least one listener, sorted
    pub fn names(&self) -> Vec<Name> {
        self.registry.names()
    }

    /// Drop every registration on this bus
    pub fn clear(&self) {
        self.registry.clear();
    }
}

impl<A: Send + 'static> NotificationBus<A> {
    /// Run the chain for `name` on a worker thread and return immediately
    ///
    /// The chain is captured now; registrations made after this call do not
    /// affect it. Overlapping calls for one name are not ordered.
    pub fn raise_async(&self, name: impl AsRef<str>, args: A) {
        self.spawn_chain(name.as_ref(), args, None);
    }

    /// Like `raise_async`, reporting the outcome to `on_done` on the worker
    ///
    /// `on_done` is not called when nothing is registered under `name`.
    pub fn raise_async_with(
        &self,
        name: impl AsRef<str>,
        args: A,
        on_done: impl FnOnce(Result<(), DispatchError>) + Send + 'static,
    ) {
        self.spawn_chain(name.as_ref(), args, Some(Box::new(on_done)));
    }

    fn spawn_chain(
        &self,
        name: &str,
        args: A,
        on_done: Option<Box<dyn FnOnce(Result<(), DispatchError>) + Send>>,
    ) {
        let chain = self.registry.chain(name);
        if chain.is_empty() {
            tracing::trace!(target: LOG_TARGET, name, "async raise with no listeners");
            return;
        }

        tracing::debug!(target: LOG_TARGET, name, listeners = chain.len(), "raise_async");
        let name = Name::new(name);
        self.workers.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                for listener in &chain {
                    listener.call(&args);
                }
            }));

            let result = outcome.map_err(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    target: LOG_TARGET,
                    name = %name,
                    "Listener panicked during async raise: {}",
                    message
                );
                DispatchError::SubscriberPanicked { name, message }
            });

            if let Some(on_done) = on_done {
                on_done(result);
            }
        });
    }
}

impl NotificationBus<()> {
    /// `raise` for the no-payload bus
    pub fn emit(&self, name: impl AsRef<str>) {
        self.raise(name, ());
    }

    /// `raise_async` for the no-payload bus
    pub fn emit_async(&self, name: impl AsRef<str>) {
        self.raise_async(name, ());
    }
}

impl<A> Default for NotificationBus<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for NotificationBus<A> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            workers: self.workers.clone(),
        }
    }
}
