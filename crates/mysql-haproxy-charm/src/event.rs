//! Lifecycle events delivered by the host.

use serde::{Deserialize, Serialize};

/// Suffix of the hook fired when a container's Pebble becomes reachable.
const PEBBLE_READY_SUFFIX: &str = "-pebble-ready";

/// A lifecycle event this charm handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HookEvent {
    /// The named container's Pebble is up.
    PebbleReady {
        /// Container name.
        workload: String,
    },
    /// The charm configuration changed.
    ConfigChanged,
}

impl HookEvent {
    /// Parse an event from the host's dispatch path.
    ///
    /// Accepts `hooks/<name>` or a bare hook name. For `pebble-ready`
    /// hooks, `workload_name` takes precedence over the name embedded in the
    /// hook. Returns `None` for hooks this charm does not observe.
    #[must_use]
    pub fn from_dispatch_path(dispatch_path: &str, workload_name: Option<&str>) -> Option<Self> {
        let hook = dispatch_path.rsplit('/').next().unwrap_or(dispatch_path);

        if hook == "config-changed" {
            return Some(Self::ConfigChanged);
        }

        hook.strip_suffix(PEBBLE_READY_SUFFIX)
            .filter(|name| !name.is_empty())
            .map(|name| Self::PebbleReady {
                workload: workload_name.unwrap_or(name).to_string(),
            })
    }

    /// The hook name of this event.
    #[must_use]
    pub fn hook_name(&self) -> String {
        match self {
            Self::PebbleReady { workload } => format!("{workload}{PEBBLE_READY_SUFFIX}"),
            Self::ConfigChanged => "config-changed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_changed() {
        assert_eq!(
            HookEvent::from_dispatch_path("hooks/config-changed", None),
            Some(HookEvent::ConfigChanged)
        );
        assert_eq!(
            HookEvent::from_dispatch_path("config-changed", None),
            Some(HookEvent::ConfigChanged)
        );
    }

    #[test]
    fn parse_pebble_ready() {
        assert_eq!(
            HookEvent::from_dispatch_path("hooks/mysql-haproxy-pebble-ready", None),
            Some(HookEvent::PebbleReady {
                workload: "mysql-haproxy".to_string()
            })
        );
        assert_eq!(
            HookEvent::from_dispatch_path("hooks/foo-pebble-ready", Some("mysql-haproxy")),
            Some(HookEvent::PebbleReady {
                workload: "mysql-haproxy".to_string()
            })
        );
    }

    #[test]
    fn unobserved_hooks() {
        assert_eq!(HookEvent::from_dispatch_path("hooks/install", None), None);
        assert_eq!(HookEvent::from_dispatch_path("hooks/update-status", None), None);
        assert_eq!(HookEvent::from_dispatch_path("hooks/-pebble-ready", None), None);
    }

    #[test]
    fn hook_names() {
        let event = HookEvent::PebbleReady {
            workload: "mysql-haproxy".to_string(),
        };
        assert_eq!(event.hook_name(), "mysql-haproxy-pebble-ready");
        assert_eq!(HookEvent::ConfigChanged.hook_name(), "config-changed");
    }
}
