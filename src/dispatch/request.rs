//! Synchronous request bus
//!
//! Subscribers compute a value from the request parameter. On `raise` every
//! responder registered under the name runs, in registration order, on the
//! calling thread; the reducer then picks what reaches the result handler.
//! With the default `Last` reducer the handler only ever sees the value of
//! the last-registered responder, even though all of them ran.

use std::marker::PhantomData;

use super::reduce::{Last, Reduce};
use super::registry::Registry;
use super::subscribers::Responder;
use crate::name::Name;

const LOG_TARGET: &str = "catalog_dispatch::dispatch";

pub struct RequestBus<I, O, R = Last> {
    registry: Registry<Responder<I, O>>,
    _reduce: PhantomData<fn() -> R>,
}

impl<I, O, R: Reduce<O>> RequestBus<I, O, R> {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            _reduce: PhantomData,
        }
    }

    pub fn register(&self, name: impl Into<Name>, responder: Responder<I, O>) {
        self.registry.register(name.into(), responder);
    }

    pub fn unregister(&self, name: impl AsRef<str>, responder: &Responder<I, O>) {
        self.registry.unregister(name.as_ref(), responder);
    }

    /// Run the responder chain for `name` and pass the reduced value to
    /// `on_result`. `on_result` never runs when nothing is registered.
    ///
    /// A panicking responder unwinds to the caller; later responders and
    /// `on_result` do not run.
    pub fn raise(&self, name: impl AsRef<str>, param: I, on_result: impl FnOnce(R::Output)) {
        if let Some(output) = self.request(name, param) {
            on_result(output);
        }
    }

    /// Same as `raise`, returning the reduced value instead
    pub fn request(&self, name: impl AsRef<str>, param: I) -> Option<R::Output> {
        let name = name.as_ref();
        let chain = self.registry.chain(name);
        if chain.is_empty() {
            tracing::trace!(target: LOG_TARGET, name, "request with no responders");
            return None;
        }

        tracing::debug!(target: LOG_TARGET, name, responders = chain.len(), "request");
        let results: Vec<O> = chain.iter().map(|responder| responder.call(&param)).collect();
        R::reduce(results)
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

impl<O, R: Reduce<O>> RequestBus<(), O, R> {
    /// `raise` for responders that take no input
    pub fn fetch(&self, name: impl AsRef<str>, on_result: impl FnOnce(R::Output)) {
        self.raise(name, (), on_result);
    }
}

impl<I, O, R: Reduce<O>> Default for RequestBus<I, O, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O, R> Clone for RequestBus<I, O, R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            _reduce: PhantomData,
        }
    }
}
