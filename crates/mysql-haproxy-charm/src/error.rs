//! Error types for the charm.
//!
//! This module defines all errors that can occur while handling a hook.

use mysql_haproxy_pebble::PebbleError;
use thiserror::Error;

/// A result type using `CharmError`.
pub type Result<T> = std::result::Result<T, CharmError>;

/// Errors that can occur while handling a hook.
#[derive(Debug, Error)]
pub enum CharmError {
    /// The workload's Pebble API failed.
    #[error("workload error: {0}")]
    Workload(#[from] PebbleError),

    /// A host hook tool exited unsuccessfully or could not be run.
    #[error("hook tool {tool} failed: {message}")]
    HookTool {
        /// The hook tool that was invoked.
        tool: String,
        /// Error output or spawn failure.
        message: String,
    },

    /// The charm configuration could not be read.
    #[error("invalid charm config: {0}")]
    Config(String),

    /// The deferred event store could not be read or written.
    #[error("deferred event store error: {0}")]
    DeferredStore(String),
}

impl CharmError {
    /// Returns true if the workload endpoint was unreachable.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Workload(e) if e.is_connection())
    }

    /// Returns true if this error might be resolved by retrying the hook.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Workload(e) => e.is_retriable(),
            Self::HookTool { .. } | Self::DeferredStore(_) => true,
            Self::Config(_) => false,
        }
    }
}
