//! The host runtime boundary.
//!
//! The charm reads its configuration from, and reports status to, the host
//! that dispatches hooks. [`JujuHostRuntime`] does this through the Juju
//! hook tools.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::CharmConfig;
use crate::error::{CharmError, Result};
use crate::status::UnitStatus;

/// Trait for the capabilities the host runtime provides to a hook.
///
/// This trait abstracts the hook tools, allowing for in-memory
/// implementations in tests.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    /// Read the current charm configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or parsed.
    async fn config(&self) -> Result<CharmConfig>;

    /// Report the unit's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the status.
    async fn set_status(&self, status: &UnitStatus) -> Result<()>;
}

/// Host runtime backed by the Juju hook tools on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct JujuHostRuntime;

impl JujuHostRuntime {
    /// Create a new hook tool runtime.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run a hook tool and return its standard output.
    async fn run(tool: &str, args: &[&str]) -> Result<Vec<u8>> {
        debug!(tool, ?args, "Running hook tool");

        let output = Command::new(tool)
            .args(args)
            .output()
            .await
            .map_err(|e| CharmError::HookTool {
                tool: tool.to_string(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(CharmError::HookTool {
                tool: tool.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl HostRuntime for JujuHostRuntime {
    async fn config(&self) -> Result<CharmConfig> {
        let stdout = Self::run("config-get", &["--format=json"]).await?;
        let doc = String::from_utf8(stdout).map_err(|e| CharmError::Config(e.to_string()))?;
        CharmConfig::from_json(&doc)
    }

    async fn set_status(&self, status: &UnitStatus) -> Result<()> {
        Self::run("status-set", &[status.name(), status.message()]).await?;
        Ok(())
    }
}

/// A mock host that serves a fixed config and records reported statuses.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// A mock host runtime kept in memory.
    #[derive(Debug, Default)]
    pub struct MockHost {
        config: Mutex<CharmConfig>,
        statuses: Mutex<Vec<UnitStatus>>,
    }

    impl MockHost {
        /// Create a new mock host with the default config.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a new mock host with the given config.
        #[must_use]
        pub fn with_config(config: CharmConfig) -> Self {
            Self {
                config: Mutex::new(config),
                statuses: Mutex::default(),
            }
        }

        /// Replace the config served to hooks.
        pub fn update_config(&self, config: CharmConfig) {
            *self.config.lock() = config;
        }

        /// The most recently reported status.
        #[must_use]
        pub fn status(&self) -> Option<UnitStatus> {
            self.statuses.lock().last().cloned()
        }

        /// Every status reported so far, oldest first.
        #[must_use]
        pub fn statuses(&self) -> Vec<UnitStatus> {
            self.statuses.lock().clone()
        }
    }

    #[async_trait]
    impl HostRuntime for MockHost {
        async fn config(&self) -> Result<CharmConfig> {
            Ok(self.config.lock().clone())
        }

        async fn set_status(&self, status: &UnitStatus) -> Result<()> {
            self.statuses.lock().push(status.clone());
            Ok(())
        }
    }
}
