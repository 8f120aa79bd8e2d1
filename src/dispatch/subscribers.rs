//! Subscriber handles and ordered subscriber sets
//!
//! Closures cannot be compared, so every registered callable is wrapped in a
//! reference-counted handle. Two handles are the same subscriber when they
//! share one allocation: clone a handle to register it again or to
//! unregister it later.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Identity comparison used by `SubscriberSet::remove`
pub trait Subscriber: Clone {
    fn same(&self, other: &Self) -> bool;
}

/// Fire-and-forget listener for a `NotificationBus<A>`
pub struct Listener<A> {
    f: Arc<dyn Fn(&A) + Send + Sync>,
}

impl<A> Listener<A> {
    pub fn new(f: impl Fn(&A) + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    pub(crate) fn call(&self, args: &A) {
        (self.f)(args)
    }
}

impl Listener<()> {
    /// Listener for the no-payload bus
    pub fn signal(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::new(move |_: &()| f())
    }
}

/// Subscriber of a `RequestBus<I, O>` that computes a value
pub struct Responder<I, O> {
    f: Arc<dyn Fn(&I) -> O + Send + Sync>,
}

impl<I, O> Responder<I, O> {
    pub fn new(f: impl Fn(&I) -> O + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    pub(crate) fn call(&self, param: &I) -> O {
        (self.f)(param)
    }
}

impl<O: 'static> Responder<(), O> {
    /// Responder that takes no input
    pub fn producer(f: impl Fn() -> O + Send + Sync + 'static) -> Self {
        Self::new(move |_: &()| f())
    }
}

/// Subscriber of an `AsyncRequestBus<I, O>` that returns a deferred value
pub struct AsyncResponder<I, O> {
    f: Arc<dyn Fn(&I) -> BoxFuture<'static, O> + Send + Sync>,
}

impl<I: 'static, O: 'static> AsyncResponder<I, O> {
    /// Wrap a closure that returns any `Send` future
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(&I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        Self {
            f: Arc::new(move |param: &I| -> BoxFuture<'static, O> { Box::pin(f(param)) }),
        }
    }

    pub(crate) fn call(&self, param: &I) -> BoxFuture<'static, O> {
        (self.f)(param)
    }
}

impl<O: 'static> AsyncResponder<(), O> {
    pub fn producer<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        Self::new(move |_: &()| f())
    }
}

// Manual impls: derives would demand `A: Clone` / `A: Debug`.
macro_rules! handle_impls {
    ($ty:ident < $($p:ident),+ >) => {
        impl<$($p),+> Clone for $ty<$($p),+> {
            fn clone(&self) -> Self {
                Self { f: Arc::clone(&self.f) }
            }
        }

        impl<$($p),+> Subscriber for $ty<$($p),+> {
            fn same(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.f, &other.f)
            }
        }

        impl<$($p),+> fmt::Debug for $ty<$($p),+> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:p})", stringify!($ty), Arc::as_ptr(&self.f) as *const ())
            }
        }
    };
}

handle_impls!(Listener<A>);
handle_impls!(Responder<I, O>);
handle_impls!(AsyncResponder<I, O>);

/// Ordered multiset of subscribers registered under one name
#[derive(Debug)]
pub struct SubscriberSet<S> {
    entries: Vec<S>,
}

impl<S: Subscriber> SubscriberSet<S> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append, keeping registration order; duplicates are allowed
    pub fn push(&mut self, subscriber: S) {
        self.entries.push(subscriber);
    }

    /// Remove the first matching instance, returning whether one was found
    pub fn remove(&mut self, subscriber: &S) -> bool {
        match self.entries.iter().position(|s| s.same(subscriber)) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Copy of the current chain, in registration order
    pub fn snapshot(&self) -> Vec<S> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Subscriber> Default for SubscriberSet<S> {
    fn default() -> Self {
        Self::new()
    }
}
