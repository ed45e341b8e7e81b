//! MySQL HAProxy charm - hook dispatch entry point
//!
//! The host runs this binary once per hook with `JUJU_DISPATCH_PATH` set.
//! Deferred events from earlier dispatches are handled first, then the
//! current one. A non-zero exit marks the hook as failed so the host
//! retries it.

use std::sync::Arc;

use mysql_haproxy_charm::{
    DeferredEventStore, DispatchConfig, HookEvent, JujuHostRuntime, MysqlHaproxyCharm,
};
use mysql_haproxy_pebble::HttpPebbleClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Hook stderr ends up in the host's debug log
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mysql_haproxy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = DispatchConfig::from_env();

    let event = config
        .dispatch_path
        .as_deref()
        .and_then(|path| HookEvent::from_dispatch_path(path, config.workload_name.as_deref()));

    match &event {
        Some(event) => tracing::info!(hook = %event.hook_name(), "Dispatching hook"),
        None => tracing::debug!(
            dispatch_path = ?config.dispatch_path,
            "Hook is not observed, only re-emitting deferred events"
        ),
    }

    let workload = match &config.pebble_url {
        Some(url) => HttpPebbleClient::new(url)?,
        None => HttpPebbleClient::with_socket(&config.pebble_socket)?,
    };
    let workload = Arc::new(workload);
    let host = Arc::new(JujuHostRuntime::new());
    let charm = MysqlHaproxyCharm::new(workload, host);

    let store = DeferredEventStore::new(&config.deferred_events_path);
    if let Err(e) = charm.dispatch(&store, event).await {
        tracing::error!(error = %e, retriable = e.is_retriable(), "Hook failed");
        return Err(e.into());
    }

    Ok(())
}
