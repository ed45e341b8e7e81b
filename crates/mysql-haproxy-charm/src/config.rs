//! Charm configuration types.
//!
//! [`CharmConfig`] holds the operator-facing settings read from the host's
//! configuration store on every hook. [`DispatchConfig`] holds the process
//! environment the host sets up for a single dispatch.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{CharmError, Result};
use crate::workload::WORKLOAD_CONTAINER_NAME;

/// Operator settings for the MySQL backend.
///
/// Values are interpolated into the rendered HAProxy config verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CharmConfig {
    /// Hostname of the MySQL service.
    #[serde(default = "CharmConfig::default_mysql_host")]
    pub mysql_host: String,

    /// Port of the MySQL service.
    #[serde(default = "CharmConfig::default_mysql_port")]
    pub mysql_port: i64,
}

impl CharmConfig {
    fn default_mysql_host() -> String {
        "mysql".to_string()
    }

    const fn default_mysql_port() -> i64 {
        3306
    }

    /// Create a config with the given host and port.
    #[must_use]
    pub fn new(mysql_host: impl Into<String>, mysql_port: i64) -> Self {
        Self {
            mysql_host: mysql_host.into(),
            mysql_port,
        }
    }

    /// Parse the JSON printed by `config-get --format=json`.
    ///
    /// Missing keys take their defaults; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CharmError::Config` if the document is not a JSON object or a
    /// value has the wrong type.
    pub fn from_json(doc: &str) -> Result<Self> {
        serde_json::from_str(doc).map_err(|e| CharmError::Config(e.to_string()))
    }
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            mysql_host: Self::default_mysql_host(),
            mysql_port: Self::default_mysql_port(),
        }
    }
}

/// Environment for a single hook dispatch.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Hook path set by the host, e.g. `hooks/config-changed`.
    pub dispatch_path: Option<String>,
    /// Workload container named by a `pebble-ready` hook.
    pub workload_name: Option<String>,
    /// Directory the charm is unpacked into.
    pub charm_dir: PathBuf,
    /// Unix socket of the workload's Pebble.
    pub pebble_socket: PathBuf,
    /// Base URL of a Pebble HTTP endpoint; used instead of the socket when set.
    pub pebble_url: Option<String>,
    /// File holding events deferred by earlier dispatches.
    pub deferred_events_path: PathBuf,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let charm_dir = PathBuf::from(".");
        Self {
            dispatch_path: None,
            workload_name: None,
            deferred_events_path: Self::deferred_events_path_in(&charm_dir),
            charm_dir,
            pebble_socket: Self::pebble_socket_for(WORKLOAD_CONTAINER_NAME),
            pebble_url: None,
        }
    }
}

impl DispatchConfig {
    fn deferred_events_path_in(charm_dir: &std::path::Path) -> PathBuf {
        charm_dir.join(".unit-state").join("deferred.json")
    }

    /// Pebble socket of a sidecar container, as mounted into the charm container.
    #[must_use]
    pub fn pebble_socket_for(container: &str) -> PathBuf {
        PathBuf::from("/charm/containers")
            .join(container)
            .join("pebble.socket")
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `JUJU_DISPATCH_PATH`: hook being dispatched
    /// - `JUJU_WORKLOAD_NAME`: container named by a `pebble-ready` hook
    /// - `JUJU_CHARM_DIR`: charm directory (default: current directory)
    /// - `PEBBLE_SOCKET`: Pebble unix socket
    ///   (default: `/charm/containers/mysql-haproxy/pebble.socket`)
    /// - `PEBBLE_URL`: base URL of a Pebble HTTP endpoint, overrides the socket
    /// - `DEFERRED_EVENTS_PATH`: deferred event store
    ///   (default: `$JUJU_CHARM_DIR/.unit-state/deferred.json`)
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.dispatch_path = std::env::var("JUJU_DISPATCH_PATH").ok();
        config.workload_name = std::env::var("JUJU_WORKLOAD_NAME").ok();

        if let Ok(val) = std::env::var("JUJU_CHARM_DIR") {
            config.charm_dir = PathBuf::from(val);
            config.deferred_events_path = Self::deferred_events_path_in(&config.charm_dir);
        }
        if let Ok(val) = std::env::var("PEBBLE_SOCKET") {
            config.pebble_socket = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("PEBBLE_URL") {
            config.pebble_url = Some(val);
        }
        if let Ok(val) = std::env::var("DEFERRED_EVENTS_PATH") {
            config.deferred_events_path = PathBuf::from(val);
        }

        config
    }
}
