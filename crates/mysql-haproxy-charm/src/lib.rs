//! Lifecycle controller for an HAProxy workload fronting MySQL.
//!
//! This crate renders HAProxy backend config from the charm settings, pushes
//! it into the workload container, and keeps the HAProxy service supervised
//! by the container's Pebble in line with its desired definition.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Host runtime (hook dispatch, status)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MysqlHaproxyCharm                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐   │
//! │  │   Config    │ │  Workload   │ │    Process          │   │
//! │  │   Renderer  │ │  Pusher     │ │    Reconciler       │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!        ┌──────────────┐             ┌──────────────┐
//!        │ HostRuntime  │             │   Workload   │
//!        │ (hook tools) │             │   (Pebble)   │
//!        └──────────────┘             └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use mysql_haproxy_charm::{DeferredEventStore, HookEvent, JujuHostRuntime, MysqlHaproxyCharm};
//! use mysql_haproxy_pebble::HttpPebbleClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let workload = Arc::new(HttpPebbleClient::with_socket(
//!     "/charm/containers/mysql-haproxy/pebble.socket",
//! )?);
//! let charm = MysqlHaproxyCharm::new(workload, Arc::new(JujuHostRuntime::new()));
//!
//! let store = DeferredEventStore::new(".unit-state/deferred.json");
//! charm.dispatch(&store, Some(HookEvent::ConfigChanged)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Events
//!
//! - `mysql-haproxy-pebble-ready`: install the service layer, push the
//!   config, autostart, report `active`.
//! - `config-changed`: if Pebble is unreachable, report `waiting` and
//!   defer; otherwise push the config, reconcile the service, report
//!   `active`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod charm;
pub mod config;
pub mod defer;
pub mod error;
pub mod event;
pub mod host;
pub mod reconcile;
pub mod render;
pub mod status;
pub mod workload;

pub use charm::{HookOutcome, MysqlHaproxyCharm};
pub use config::{CharmConfig, DispatchConfig};
pub use defer::{DeferredEvent, DeferredEventStore};
pub use error::{CharmError, Result};
pub use event::HookEvent;
pub use host::{HostRuntime, JujuHostRuntime};
pub use reconcile::{ProcessState, ReconcileOutcome};
pub use render::render_backend_config;
pub use status::UnitStatus;

#[cfg(any(test, feature = "test-utils"))]
pub use host::mock::MockHost;
