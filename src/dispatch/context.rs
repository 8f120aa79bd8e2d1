//! Dispatch context
//!
//! Owns one bus per generic instantiation, created lazily on first access
//! and kept until the context is dropped. `notifications::<A>()` and
//! `notifications::<B>()` are different buses, so the same name used with
//! different payload types never collides. The context is cloned into
//! whatever needs to register or raise instead of living in a global.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use super::async_request::AsyncRequestBus;
use super::notification::{NotificationBus, Signal};
use super::reduce::{Last, Reduce};
use super::request::RequestBus;
use super::workers::Workers;
use crate::config::DispatchConfig;
use crate::error::ConfigError;

type BusMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

#[derive(Clone)]
pub struct DispatchContext {
    buses: Arc<RwLock<BusMap>>,
    workers: Workers,
}

impl DispatchContext {
    /// Context whose async paths use rayon's global pool
    pub fn new() -> Self {
        Self::with_workers(Workers::Global)
    }

    pub fn with_workers(workers: Workers) -> Self {
        Self {
            buses: Arc::new(RwLock::new(HashMap::new())),
            workers,
        }
    }

    /// Context with a dedicated worker pool sized from configuration
    pub fn from_config(config: &DispatchConfig) -> Result<Self, ConfigError> {
        let workers = Workers::from_config(&config.workers)
            .map_err(|e| ConfigError::Invalid(format!("worker pool: {}", e)))?;
        Ok(Self::with_workers(workers))
    }

    pub fn notifications<A: 'static>(&self) -> NotificationBus<A> {
        self.bus(NotificationBus::with_workers)
    }

    /// The no-payload notification bus
    pub fn signals(&self) -> Signal {
        self.notifications::<()>()
    }

    pub fn requests<I: 'static, O: 'static>(&self) -> RequestBus<I, O> {
        self.requests_with::<I, O, Last>()
    }

    /// Request bus with an explicit reducer; a distinct bus per reducer
    pub fn requests_with<I: 'static, O: 'static, R: Reduce<O>>(&self) -> RequestBus<I, O, R> {
        self.bus(|_| RequestBus::new())
    }

    pub fn async_requests<I: 'static, O: 'static>(&self) -> AsyncRequestBus<I, O> {
        self.async_requests_with::<I, O, Last>()
    }

    pub fn async_requests_with<I: 'static, O: 'static, R: Reduce<O>>(
        &self,
    ) -> AsyncRequestBus<I, O, R> {
        self.bus(AsyncRequestBus::with_workers)
    }

    pub fn workers(&self) -> &Workers {
        &self.workers
    }

    /// Number of bus instantiations created so far
    pub fn bus_count(&self) -> usize {
        self.buses.read().len()
    }

    fn bus<B>(&self, make: impl FnOnce(Workers) -> B) -> B
    where
        B: Clone + Send + Sync + 'static,
    {
        let key = TypeId::of::<B>();
        if let Some(bus) = self.buses.read().get(&key).and_then(|b| b.downcast_ref::<B>()) {
            return bus.clone();
        }

        let mut buses = self.buses.write();
        let entry = buses.entry(key).or_insert_with(|| {
            tracing::debug!(
                target: "catalog_dispatch::context",
                "Creating bus {}",
                std::any::type_name::<B>()
            );
            Box::new(make(self.workers.clone()))
        });
        match entry.downcast_ref::<B>() {
            Some(bus) => bus.clone(),
            None => unreachable!("bus map is keyed by the bus TypeId"),
        }
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchContext")
            .field("buses", &self.bus_count())
            .field("workers", &self.workers)
            .finish()
    }
}
