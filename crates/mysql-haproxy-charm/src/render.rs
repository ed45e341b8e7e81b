//! HAProxy backend config rendering.
//!
//! The rendered document is a pure function of the MySQL host and port: two
//! TCP backends, writers then readers, each health-checked by an external
//! script.

use crate::config::CharmConfig;

/// Script HAProxy runs to health-check each MySQL server.
pub const HEALTH_CHECK_COMMAND: &str = "/usr/local/bin/check_mysql.sh";

/// Backend sections, in the order they are rendered.
pub const BACKENDS: [&str; 2] = ["mysql-writers", "mysql-readers"];

/// Render the HAProxy backend config for the given settings.
#[must_use]
pub fn render_backend_config(config: &CharmConfig) -> String {
    render_backends(&config.mysql_host, config.mysql_port)
}

/// Render the HAProxy backend config for a MySQL server at `host:port`.
///
/// Host and port are interpolated as given.
#[must_use]
pub fn render_backends(host: &str, port: i64) -> String {
    BACKENDS
        .iter()
        .map(|name| backend_stanza(name, host, port))
        .collect::<Vec<_>>()
        .join("\n")
}

fn backend_stanza(name: &str, host: &str, port: i64) -> String {
    format!(
        "backend {name}
    mode tcp
    option srvtcpka
    balance roundrobin
    option external-check
    external-check command {HEALTH_CHECK_COMMAND}
    server mysql {host}:{port} check
"
    )
}
