//! In-process coordination for the catalog application.
//!
//! Components talk to each other through name-keyed buses held by a
//! [`DispatchContext`], and hand work back to the main loop's thread through
//! the [`ThreadAffineExecutor`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod logging;
pub mod manager;
pub mod name;

pub use config::DispatchConfig;
pub use dispatch::{
    AsyncRequestBus, AsyncResponder, Collect, DispatchContext, Last, Listener, NotificationBus,
    Reduce, RequestBus, Responder, Signal, Workers,
};
pub use error::{AppResult, ConfigError, DispatchError, ExecutorError};
pub use executor::{
    Completion, DrainReport, ExecutorHandle, Sequence, Stages, Step, ThreadAffineExecutor, WorkItem,
};
pub use manager::{Manager, ManagerSet};
pub use name::Name;
