//! Application managers
//!
//! Managers are the long-lived components that hook themselves onto the
//! buses at startup and unhook on shutdown. The set of managers is an
//! explicit list assembled by the host, so there is no runtime discovery.

use crate::dispatch::DispatchContext;

pub trait Manager: Send {
    fn name(&self) -> &str;

    /// Register listeners and responders
    fn attach(&mut self, ctx: &DispatchContext);

    /// Unregister everything `attach` registered
    fn detach(&mut self, ctx: &DispatchContext);
}

/// Ordered list of managers
pub struct ManagerSet {
    managers: Vec<Box<dyn Manager>>,
    attached: bool,
}

impl ManagerSet {
    pub fn builder() -> ManagerSetBuilder {
        ManagerSetBuilder {
            managers: Vec::new(),
        }
    }

    /// Attach every manager, in list order
    pub fn attach_all(&mut self, ctx: &DispatchContext) {
        if self.attached {
            tracing::warn!(target: "catalog_dispatch::manager", "Managers already attached");
            return;
        }
        for manager in &mut self.managers {
            tracing::debug!(target: "catalog_dispatch::manager", "Attaching {}", manager.name());
            manager.attach(ctx);
        }
        self.attached = true;
    }

    /// Detach every manager, in reverse list order
    pub fn detach_all(&mut self, ctx: &DispatchContext) {
        if !self.attached {
            return;
        }
        for manager in self.managers.iter_mut().rev() {
            tracing::debug!(target: "catalog_dispatch::manager", "Detaching {}", manager.name());
            manager.detach(ctx);
        }
        self.attached = false;
    }

    pub fn names(&self) -> Vec<&str> {
        self.managers.iter().map(|m| m.name()).collect()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

pub struct ManagerSetBuilder {
    managers: Vec<Box<dyn Manager>>,
}

impl ManagerSetBuilder {
    pub fn with(mut self, manager: impl Manager + 'static) -> Self {
        self.managers.push(Box::new(manager));
        self
    }

    pub fn build(self) -> ManagerSet {
        ManagerSet {
            managers: self.managers,
            attached: false,
        }
    }
}
