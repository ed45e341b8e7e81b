//! Charm event handlers.
//!
//! This module provides [`MysqlHaproxyCharm`], which binds the observed
//! lifecycle events to the render, push and reconcile steps and reports the
//! resulting unit status.

use std::sync::Arc;

use mysql_haproxy_pebble::Workload;
use tracing::{debug, error, info, warn};

use crate::config::CharmConfig;
use crate::defer::{enqueue, DeferredEventStore};
use crate::error::Result;
use crate::event::HookEvent;
use crate::host::HostRuntime;
use crate::reconcile::{reconcile, ReconcileOutcome};
use crate::status::UnitStatus;
use crate::workload::{haproxy_layer, push_haproxy_config, SERVICE_NAME, WORKLOAD_CONTAINER_NAME};

/// Status message once HAProxy has been started by `pebble-ready`.
pub const STARTED_MESSAGE: &str = "HAProxy started in the workload container";

/// How a handler finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// The event was fully handled.
    Completed,
    /// The event must be redelivered on a later dispatch.
    Deferred,
}

/// Status message while the workload container is unreachable.
#[must_use]
pub fn waiting_message() -> String {
    format!("Waiting for {WORKLOAD_CONTAINER_NAME} container to start")
}

/// The MySQL HAProxy charm.
///
/// Holds the workload and host handles every handler needs; no other state
/// survives between events.
pub struct MysqlHaproxyCharm<W: Workload, H: HostRuntime> {
    workload: Arc<W>,
    host: Arc<H>,
}

impl<W: Workload, H: HostRuntime> MysqlHaproxyCharm<W, H> {
    /// Create a new charm over the given workload and host.
    #[must_use]
    pub fn new(workload: Arc<W>, host: Arc<H>) -> Self {
        Self { workload, host }
    }

    /// Get a reference to the workload.
    #[must_use]
    pub fn workload(&self) -> &W {
        &self.workload
    }

    /// Get a reference to the host runtime.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Handle a single event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be handled and was not
    /// deferred.
    pub async fn handle(&self, event: &HookEvent) -> Result<HookOutcome> {
        match event {
            HookEvent::PebbleReady { workload } => self.on_pebble_ready(workload).await,
            HookEvent::ConfigChanged => self.on_config_changed().await,
        }
    }

    /// Re-emit deferred events, then handle `current`, and persist whatever
    /// is still deferred.
    ///
    /// If any handler fails the store is left untouched, so every pending
    /// event is retried by the next dispatch.
    ///
    /// # Errors
    ///
    /// Returns the first handler or store error.
    pub async fn dispatch(
        &self,
        store: &DeferredEventStore,
        current: Option<HookEvent>,
    ) -> Result<()> {
        let pending = store.load()?;
        let had_pending = !pending.is_empty();
        let mut still_deferred = Vec::new();

        for deferred in pending {
            debug!(
                hook = %deferred.event.hook_name(),
                deferred_at = %deferred.deferred_at,
                "Re-emitting deferred event"
            );
            match self.handle(&deferred.event).await? {
                HookOutcome::Completed => {}
                HookOutcome::Deferred => still_deferred.push(deferred),
            }
        }

        if let Some(event) = current {
            if self.handle(&event).await? == HookOutcome::Deferred {
                let hook = event.hook_name();
                if !enqueue(&mut still_deferred, event) {
                    debug!(%hook, "Event is already deferred");
                }
            }
        }

        if had_pending || !still_deferred.is_empty() {
            store.save(&still_deferred)?;
        }

        Ok(())
    }

    /// Define and start the HAProxy service.
    ///
    /// Pebble is reachable when this hook fires, so workload failures are
    /// not guarded and propagate to the host.
    async fn on_pebble_ready(&self, workload_name: &str) -> Result<HookOutcome> {
        if workload_name != WORKLOAD_CONTAINER_NAME {
            debug!(workload = workload_name, "Ignoring pebble-ready for unknown container");
            return Ok(HookOutcome::Completed);
        }

        self.workload
            .add_layer(SERVICE_NAME, &haproxy_layer(), true)
            .await?;

        let config = self.host.config().await?;
        push_haproxy_config(&*self.workload, &config).await?;

        self.workload.autostart().await?;

        self.host
            .set_status(&UnitStatus::active(STARTED_MESSAGE))
            .await?;

        info!(service = SERVICE_NAME, "Started HAProxy in the workload container");

        Ok(HookOutcome::Completed)
    }

    /// Push the new config and restart HAProxy if its plan changed.
    async fn on_config_changed(&self) -> Result<HookOutcome> {
        if !self.workload.can_connect().await {
            return self.wait_for_workload().await;
        }

        let config = self.host.config().await?;

        match self.apply(&config).await {
            Ok(outcome) => {
                debug!(?outcome, "Applied charm config");
            }
            Err(e) if e.is_connection() => {
                error!(error = %e, "Lost connection to the workload container");
                return self.wait_for_workload().await;
            }
            Err(e) => return Err(e),
        }

        self.host.set_status(&UnitStatus::active("")).await?;

        Ok(HookOutcome::Completed)
    }

    async fn apply(&self, config: &CharmConfig) -> Result<ReconcileOutcome> {
        push_haproxy_config(&*self.workload, config).await?;
        reconcile(&*self.workload, SERVICE_NAME, &haproxy_layer()).await
    }

    async fn wait_for_workload(&self) -> Result<HookOutcome> {
        self.host
            .set_status(&UnitStatus::waiting(waiting_message()))
            .await?;

        warn!(
            container = WORKLOAD_CONTAINER_NAME,
            "Workload container is not reachable, deferring event"
        );

        Ok(HookOutcome::Deferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::workload::HAPROXY_BACKEND_CONFIG_PATH;
    use mysql_haproxy_pebble::{MockOperation, MockWorkload, Override, Startup};
    use tempfile::TempDir;

    fn setup() -> MysqlHaproxyCharm<MockWorkload, MockHost> {
        MysqlHaproxyCharm::new(Arc::new(MockWorkload::new()), Arc::new(MockHost::new()))
    }

    fn pebble_ready() -> HookEvent {
        HookEvent::PebbleReady {
            workload: WORKLOAD_CONTAINER_NAME.to_string(),
        }
    }

    #[test]
    fn waiting_message_names_container() {
        assert_eq!(
            waiting_message(),
            "Waiting for mysql-haproxy container to start"
        );
    }

    #[tokio::test]
    async fn pebble_ready_starts_haproxy() {
        let charm = setup();
        assert!(charm.workload().plan().services.is_empty());

        let outcome = charm.handle(&pebble_ready()).await.unwrap();
        assert_eq!(outcome, HookOutcome::Completed);

        let plan = charm.workload().plan();
        assert_eq!(plan.services.len(), 1);
        let service = &plan.services[SERVICE_NAME];
        assert_eq!(service.r#override, Some(Override::Replace));
        assert_eq!(service.summary.as_deref(), Some("mysql haproxy"));
        assert_eq!(service.command.as_deref(), Some("haproxy -f /configs"));
        assert_eq!(service.startup, Some(Startup::Enabled));

        assert!(charm.workload().is_running(SERVICE_NAME));
        assert!(charm.workload().file(HAPROXY_BACKEND_CONFIG_PATH).is_some());
        assert_eq!(
            charm.host().status(),
            Some(UnitStatus::active(STARTED_MESSAGE))
        );
    }

    #[tokio::test]
    async fn pebble_ready_other_container_is_ignored() {
        let charm = setup();
        let event = HookEvent::PebbleReady {
            workload: "sidecar".to_string(),
        };

        assert_eq!(charm.handle(&event).await.unwrap(), HookOutcome::Completed);
        assert!(charm.workload().plan().services.is_empty());
        assert!(charm.host().status().is_none());
    }

    #[tokio::test]
    async fn pebble_ready_unreachable_propagates() {
        let charm = setup();
        charm.workload().set_connected(false);

        let err = charm.handle(&pebble_ready()).await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn config_changed_unreachable_defers() {
        let charm = setup();
        charm.workload().set_connected(false);

        let outcome = charm.handle(&HookEvent::ConfigChanged).await.unwrap();

        assert_eq!(outcome, HookOutcome::Deferred);
        assert_eq!(
            charm.host().status(),
            Some(UnitStatus::waiting(waiting_message()))
        );
        assert_eq!(charm.workload().calls().push, 0);
        assert_eq!(charm.workload().calls().get_plan, 0);
    }

    #[tokio::test]
    async fn config_changed_connection_lost_during_reconcile_defers() {
        let charm = setup();
        charm.workload().drop_connection_on(MockOperation::GetPlan);

        let outcome = charm.handle(&HookEvent::ConfigChanged).await.unwrap();

        assert_eq!(outcome, HookOutcome::Deferred);
        assert_eq!(charm.workload().calls().push, 1);
        assert_eq!(charm.workload().calls().get_plan, 1);
        assert_eq!(
            charm.host().statuses(),
            vec![UnitStatus::waiting(waiting_message())]
        );
    }

    #[tokio::test]
    async fn config_changed_connection_lost_during_push_defers() {
        let charm = setup();
        charm.workload().drop_connection_on(MockOperation::Push);

        let outcome = charm.handle(&HookEvent::ConfigChanged).await.unwrap();

        assert_eq!(outcome, HookOutcome::Deferred);
        assert_eq!(charm.workload().calls().get_plan, 0);
        assert_eq!(
            charm.host().status(),
            Some(UnitStatus::waiting(waiting_message()))
        );
    }

    #[tokio::test]
    async fn config_changed_pushes_and_reconciles_once() {
        let charm = setup();
        charm.host().update_config(CharmConfig::new("mysql", 3307));

        let outcome = charm.handle(&HookEvent::ConfigChanged).await.unwrap();

        assert_eq!(outcome, HookOutcome::Completed);
        assert_eq!(charm.workload().calls().push, 1);
        assert_eq!(charm.workload().calls().get_plan, 1);
        assert_eq!(charm.host().status(), Some(UnitStatus::active("")));

        let file = charm.workload().file(HAPROXY_BACKEND_CONFIG_PATH).unwrap();
        let content = String::from_utf8(file.content).unwrap();
        assert!(content.contains("server mysql mysql:3307 check"));
    }

    #[tokio::test]
    async fn config_changed_after_ready_does_not_restart() {
        let charm = setup();
        charm.handle(&pebble_ready()).await.unwrap();
        charm.workload().reset_calls();

        charm.handle(&HookEvent::ConfigChanged).await.unwrap();

        assert_eq!(charm.workload().calls().push, 1);
        assert_eq!(charm.workload().calls().start, 0);
        assert_eq!(charm.workload().calls().stop, 0);
    }

    #[tokio::test]
    async fn dispatch_persists_and_replays_deferred() {
        let dir = TempDir::new().unwrap();
        let store = DeferredEventStore::new(dir.path().join("deferred.json"));
        let charm = setup();

        charm.workload().set_connected(false);
        charm
            .dispatch(&store, Some(HookEvent::ConfigChanged))
            .await
            .unwrap();
        charm
            .dispatch(&store, Some(HookEvent::ConfigChanged))
            .await
            .unwrap();
        assert_eq!(store.load().unwrap().len(), 1);

        charm.workload().set_connected(true);
        charm.dispatch(&store, None).await.unwrap();

        assert!(store.load().unwrap().is_empty());
        assert_eq!(charm.workload().calls().push, 1);
        assert_eq!(charm.host().status(), Some(UnitStatus::active("")));
    }
}
