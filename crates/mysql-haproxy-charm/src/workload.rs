//! The HAProxy workload: its Pebble layer and config file.

use mysql_haproxy_pebble::{Layer, Override, PushOptions, Service, Startup, Workload};
use tracing::{debug, info};

use crate::config::CharmConfig;
use crate::error::Result;
use crate::render::render_backend_config;

/// Name of the workload container.
pub const WORKLOAD_CONTAINER_NAME: &str = "mysql-haproxy";

/// Name of the HAProxy service, also used as its layer label.
pub const SERVICE_NAME: &str = "mysql-haproxy";

/// Where the rendered backend config is written inside the container.
pub const HAPROXY_BACKEND_CONFIG_PATH: &str = "/configs/haproxy.cfg";

/// Account that owns the backend config.
pub const HAPROXY_USERNAME: &str = "haproxy";

/// Permission bits of the backend config.
pub const HAPROXY_CONFIG_PERMISSIONS: u32 = 0o600;

/// Command Pebble runs for the HAProxy service.
pub const HAPROXY_COMMAND: &str = "haproxy -f /configs";

/// The Pebble layer defining the HAProxy service.
///
/// The definition is static: it does not depend on the charm config.
#[must_use]
pub fn haproxy_layer() -> Layer {
    let mut layer = Layer {
        summary: Some("mysql haproxy layer".to_string()),
        description: Some("pebble config layer for mysql haproxy".to_string()),
        ..Default::default()
    };
    layer.services.insert(
        SERVICE_NAME.to_string(),
        Service {
            r#override: Some(Override::Replace),
            summary: Some("mysql haproxy".to_string()),
            command: Some(HAPROXY_COMMAND.to_string()),
            startup: Some(Startup::Enabled),
            ..Default::default()
        },
    );
    layer
}

/// Ownership and mode for the backend config file.
#[must_use]
pub fn haproxy_config_push_options() -> PushOptions {
    PushOptions {
        permissions: HAPROXY_CONFIG_PERMISSIONS,
        user: Some(HAPROXY_USERNAME.to_string()),
        group: None,
        make_dirs: true,
    }
}

/// Render the backend config and write it into the workload.
///
/// The file is overwritten on every call.
///
/// # Errors
///
/// Returns `CharmError::Workload` if the write fails, including when the
/// workload is unreachable.
pub async fn push_haproxy_config<W>(workload: &W, config: &CharmConfig) -> Result<()>
where
    W: Workload + ?Sized,
{
    debug!(
        path = HAPROXY_BACKEND_CONFIG_PATH,
        "Pushing new HAProxy config file to the workload container"
    );

    let rendered = render_backend_config(config);
    workload
        .push(
            HAPROXY_BACKEND_CONFIG_PATH,
            rendered.as_bytes(),
            &haproxy_config_push_options(),
        )
        .await?;

    info!(
        path = HAPROXY_BACKEND_CONFIG_PATH,
        mysql_host = %config.mysql_host,
        mysql_port = config.mysql_port,
        "Pushed new HAProxy config file to the workload container"
    );

    Ok(())
}
