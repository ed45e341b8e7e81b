//! Pebble workload client for the MySQL HAProxy charm.
//!
//! This crate provides the [`Workload`] trait and [`HttpPebbleClient`]
//! implementation for driving a container's Pebble process supervisor. It
//! handles:
//!
//! - Plan inspection and layer management
//! - Service start, stop and autostart (waiting on the resulting change)
//! - Pushing files into the container filesystem
//! - Reachability checks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Charm event handlers                         │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Workload (trait)                             │
//! │        ┌─────────────────┐        ┌──────────────────┐          │
//! │        │ HttpPebbleClient│        │   MockWorkload   │          │
//! │        └─────────────────┘        └──────────────────┘          │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Pebble REST API (/v1/...)                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mysql_haproxy_pebble::{HttpPebbleClient, Workload};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpPebbleClient::new("http://localhost:4000")?;
//!
//! if client.can_connect().await {
//!     let plan = client.get_plan().await?;
//!     println!("{} services in plan", plan.services.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature to use [`MockWorkload`], which keeps the
//! plan, files and service run-state in memory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::{HttpPebbleClient, Workload};
pub use error::{PebbleError, Result};
pub use types::{
    Change, Layer, Override, Plan, PushOptions, Service, ServiceInfo, ServiceStatus, Startup,
};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{CallCounts, MockFile, MockOperation, MockWorkload};
