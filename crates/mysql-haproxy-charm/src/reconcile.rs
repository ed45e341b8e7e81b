//! Process reconciliation.
//!
//! Brings the supervised HAProxy process in line with the desired layer.
//!
//! # State Machine
//!
//! ```text
//!        ┌──────────┐  add layer   ┌──────────┐
//!        │  Absent  │─────────────▶│ Stopped  │
//!        └──────────┘              └────┬─────┘
//!                                       │ start
//!                                       ▼
//!                                  ┌──────────┐
//!                 plan drifted ───▶│ Running  │
//!                 (stop + start)   └──────────┘
//! ```
//!
//! A plan that already matches the desired services is left alone, so
//! repeated reconciles with the same layer restart the process at most once.

use mysql_haproxy_pebble::{Layer, PebbleError, Workload};
use tracing::{debug, error, info};

use crate::error::Result;

/// Observed state of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// The service is not in the plan.
    Absent,
    /// The service is defined but not running.
    Stopped,
    /// The service is running.
    Running,
}

/// What a reconcile pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The plan already matched; nothing was touched.
    Unchanged,
    /// The layer was applied and the service (re)started.
    Restarted {
        /// Whether the service had to be stopped first.
        was_running: bool,
    },
}

/// Observe the state of the named service.
///
/// # Errors
///
/// Returns an error if the workload cannot be queried.
pub async fn observe<W>(workload: &W, service_name: &str) -> Result<ProcessState>
where
    W: Workload + ?Sized,
{
    match workload.get_service(service_name).await {
        Ok(info) if info.is_running() => Ok(ProcessState::Running),
        Ok(_) => Ok(ProcessState::Stopped),
        Err(PebbleError::ServiceNotFound(_)) => Ok(ProcessState::Absent),
        Err(e) => Err(e.into()),
    }
}

/// Make the running service reflect `desired`.
///
/// If the plan's services differ from the layer's, the layer is combined
/// into the plan under the service's label, a running service is stopped,
/// and the service is started.
///
/// # Errors
///
/// Returns an error if any workload call fails. The failure is logged here;
/// the caller decides what status to report.
pub async fn reconcile<W>(
    workload: &W,
    service_name: &str,
    desired: &Layer,
) -> Result<ReconcileOutcome>
where
    W: Workload + ?Sized,
{
    restart_if_changed(workload, service_name, desired)
        .await
        .inspect_err(|e| error!(service = service_name, error = %e, "Could not restart service"))
}

async fn restart_if_changed<W>(
    workload: &W,
    service_name: &str,
    desired: &Layer,
) -> Result<ReconcileOutcome>
where
    W: Workload + ?Sized,
{
    let plan = workload.get_plan().await?;

    if plan.services == desired.services {
        debug!(service = service_name, "Plan is up to date");
        return Ok(ReconcileOutcome::Unchanged);
    }

    workload.add_layer(service_name, desired, true).await?;

    let was_running = observe(workload, service_name).await? == ProcessState::Running;
    if was_running {
        workload.stop(&[service_name]).await?;
    }
    workload.start(&[service_name]).await?;

    info!(service = service_name, was_running, "Restarted service with updated plan");

    Ok(ReconcileOutcome::Restarted { was_running })
}
