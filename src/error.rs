//! Library errors using thiserror for structured error handling.
//!
//! An unregistered name is not an error anywhere in this crate: raising on it
//! is a no-op and result handlers simply never fire.

use thiserror::Error;

use crate::name::Name;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Subscriber chain for '{name}' panicked: {message}")]
    SubscriberPanicked { name: Name, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("No thread-affine executor instance; install one on the owner thread before queueing work")]
    NotInitialized,

    #[error("Executor drained from a thread that does not own it")]
    NotOwnerThread,

    #[error("Queued work panicked: {0}")]
    WorkPanicked(String),

    #[error("Executor dropped before the work item ran")]
    Dropped,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
