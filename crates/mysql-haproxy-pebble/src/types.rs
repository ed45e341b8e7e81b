//! Plan, layer and service types for the Pebble API.
//!
//! These mirror the YAML documents Pebble accepts and returns. Field names
//! follow Pebble's kebab-case wire format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a service definition in a layer is combined with the existing plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Override {
    /// Replace the existing entry wholesale.
    Replace,
    /// Overlay the fields that are set onto the existing entry.
    Merge,
}

/// Whether a service is started by `autostart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Startup {
    /// Started by `autostart`.
    Enabled,
    /// Left alone by `autostart`.
    Disabled,
    /// Not specified in the layer.
    #[default]
    #[serde(rename = "")]
    Unknown,
}

/// A single service definition within a layer or plan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Service {
    /// Combination strategy for this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#override: Option<Override>,
    /// Short summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Command line used to launch the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Autostart policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<Startup>,
    /// Environment passed to the process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// User the process runs as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Service {
    /// Overlay the fields set on `other` onto this entry.
    pub fn merge(&mut self, other: &Self) {
        if other.r#override.is_some() {
            self.r#override = other.r#override;
        }
        if other.summary.is_some() {
            self.summary.clone_from(&other.summary);
        }
        if other.description.is_some() {
            self.description.clone_from(&other.description);
        }
        if other.command.is_some() {
            self.command.clone_from(&other.command);
        }
        if other.startup.is_some() {
            self.startup = other.startup;
        }
        if other.user.is_some() {
            self.user.clone_from(&other.user);
        }
        self.environment
            .extend(other.environment.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Returns true if this service is started by `autostart`.
    #[must_use]
    pub fn is_startup_enabled(&self) -> bool {
        self.startup == Some(Startup::Enabled)
    }
}

/// A named, mergeable fragment of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Layer {
    /// Short summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Service definitions keyed by service name.
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

impl Layer {
    /// Render this layer as a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// The full set of service definitions currently registered in Pebble.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Plan {
    /// Service definitions keyed by service name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, Service>,
}

impl Plan {
    /// Parse a plan from the YAML returned by `GET /v1/plan`.
    ///
    /// An empty document or `{}` is an empty plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid plan.
    pub fn from_yaml(doc: &str) -> crate::Result<Self> {
        if doc.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(doc)?)
    }

    /// Render this plan as a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Apply a layer on top of this plan.
    ///
    /// Entries marked `replace` (or unmarked) overwrite the existing entry;
    /// entries marked `merge` overlay their set fields.
    pub fn combine(&mut self, layer: &Layer) {
        for (name, service) in &layer.services {
            match (service.r#override, self.services.get_mut(name)) {
                (Some(Override::Merge), Some(existing)) => existing.merge(service),
                _ => {
                    self.services.insert(name.clone(), service.clone());
                }
            }
        }
    }
}

/// Run-state of a service as reported by Pebble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Process is running.
    Active,
    /// Process is not running.
    #[default]
    Inactive,
    /// Process exited and Pebble is waiting to restart it.
    Backoff,
    /// Process failed and will not be restarted.
    Error,
}

/// Information about a service returned by `GET /v1/services`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name.
    pub name: String,
    /// Autostart policy.
    #[serde(default)]
    pub startup: Startup,
    /// Current run-state.
    pub current: ServiceStatus,
}

impl ServiceInfo {
    /// Returns true if the service process is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current == ServiceStatus::Active
    }
}

/// Options for writing a file into the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOptions {
    /// Unix permission bits.
    pub permissions: u32,
    /// Owning user name.
    pub user: Option<String>,
    /// Owning group name.
    pub group: Option<String>,
    /// Create missing parent directories.
    pub make_dirs: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            permissions: 0o644,
            user: None,
            group: None,
            make_dirs: false,
        }
    }
}

/// A change record returned by `GET /v1/changes/{id}/wait`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    /// Change identifier.
    pub id: String,
    /// Change kind, e.g. `start` or `stop`.
    #[serde(default)]
    pub kind: String,
    /// Status string, e.g. `Done` or `Error`.
    #[serde(default)]
    pub status: String,
    /// Whether the change has finished.
    #[serde(default)]
    pub ready: bool,
    /// Error message if the change failed.
    #[serde(default)]
    pub err: Option<String>,
}
