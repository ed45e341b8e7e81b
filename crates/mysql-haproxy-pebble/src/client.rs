//! Workload trait and HTTP client for the Pebble API.
//!
//! The [`Workload`] trait is the full set of operations the charm needs from
//! a managed container. [`HttpPebbleClient`] implements it against Pebble's
//! REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PebbleError, Result};
use crate::types::{Change, Layer, Plan, PushOptions, ServiceInfo};

/// Trait for workload container operations.
///
/// This trait abstracts the Pebble client interface, allowing for
/// in-memory implementations in tests.
#[async_trait]
pub trait Workload: Send + Sync {
    /// Check whether the Pebble endpoint is reachable.
    async fn can_connect(&self) -> bool;

    /// Write `content` to `path` inside the workload.
    ///
    /// # Errors
    ///
    /// Returns `PebbleError::Connection` if the endpoint is unreachable.
    async fn push(&self, path: &str, content: &[u8], options: &PushOptions) -> Result<()>;

    /// Fetch the current plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the plan cannot be parsed.
    async fn get_plan(&self) -> Result<Plan>;

    /// Add a layer to the plan under `label`.
    ///
    /// With `combine` set, an existing layer with the same label is combined
    /// with the new one instead of being rejected.
    ///
    /// # Errors
    ///
    /// Returns `PebbleError::LayerExists` if the label exists and `combine`
    /// is false.
    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()>;

    /// Get the run-state of a single service.
    ///
    /// # Errors
    ///
    /// Returns `PebbleError::ServiceNotFound` if the service is not in the plan.
    async fn get_service(&self, name: &str) -> Result<ServiceInfo>;

    /// Start the named services and wait for the change to finish.
    ///
    /// # Errors
    ///
    /// Returns `PebbleError::ChangeFailed` if Pebble could not start them.
    async fn start(&self, services: &[&str]) -> Result<()>;

    /// Stop the named services and wait for the change to finish.
    ///
    /// # Errors
    ///
    /// Returns `PebbleError::ChangeFailed` if Pebble could not stop them.
    async fn stop(&self, services: &[&str]) -> Result<()>;

    /// Start every service whose startup policy is `enabled`.
    ///
    /// # Errors
    ///
    /// Returns `PebbleError::ChangeFailed` if Pebble could not start them.
    async fn autostart(&self) -> Result<()>;
}

/// HTTP client for a workload's Pebble API.
#[derive(Debug, Clone)]
pub struct HttpPebbleClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPebbleClient {
    /// Create a new Pebble client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the Pebble API (e.g., "http://localhost:4000")
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = build_client(reqwest::Client::builder())?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client that talks to Pebble over its unix socket.
    ///
    /// Sidecar containers expose Pebble only at
    /// `/charm/containers/<container>/pebble.socket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    #[cfg(unix)]
    pub fn with_socket(socket: impl AsRef<std::path::Path>) -> Result<Self> {
        let client = build_client(reqwest::Client::builder().unix_socket(socket.as_ref()))?;
        // Host is ignored by the socket connector but required by the URL
        Ok(Self::with_client(client, SOCKET_AUTHORITY))
    }

    /// Create a new Pebble client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Get the base URL of the Pebble API.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Issue a service action and wait for the resulting change.
    async fn service_action(&self, action: &str, services: &[&str]) -> Result<()> {
        let response = self
            .client
            .post(self.url("/v1/services"))
            .json(&ServicesRequest { action, services })
            .send()
            .await?;

        let change_id = async_change(response).await?;
        debug!(action, change = %change_id, ?services, "Waiting for service change");
        self.wait_change(&change_id).await
    }

    async fn wait_change(&self, change_id: &str) -> Result<()> {
        let response = self
            .client
            .get(self.url(&format!("/v1/changes/{change_id}/wait")))
            .send()
            .await?;

        let change: Change = sync_result(response).await?;
        match change.err {
            Some(message) => Err(PebbleError::ChangeFailed {
                id: change.id,
                message,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(unix)]
const SOCKET_AUTHORITY: &str = "http://localhost";

fn build_client(builder: reqwest::ClientBuilder) -> Result<reqwest::Client> {
    builder
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| PebbleError::Connection(format!("Failed to create HTTP client: {e}")))
}

/// Response envelope shared by every Pebble endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    change: Option<String>,
    result: Option<T>,
}

/// Result of an error envelope.
#[derive(Debug, Deserialize)]
struct ErrorResult {
    message: String,
}

/// Request body for `POST /v1/services`.
#[derive(Debug, Serialize)]
struct ServicesRequest<'a> {
    action: &'a str,
    services: &'a [&'a str],
}

/// Request body for `POST /v1/layers`.
#[derive(Debug, Serialize)]
struct LayersRequest<'a> {
    action: &'static str,
    combine: bool,
    label: &'a str,
    format: &'static str,
    layer: String,
}

/// The `request` part of a `POST /v1/files` write.
#[derive(Debug, Serialize)]
struct FilesRequest<'a> {
    action: &'static str,
    files: Vec<WriteFile<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct WriteFile<'a> {
    path: &'a str,
    make_dirs: bool,
    permissions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<&'a str>,
}

/// Per-file outcome of a `POST /v1/files` write.
#[derive(Debug, Deserialize)]
struct FileResult {
    path: String,
    #[serde(default)]
    error: Option<ErrorResult>,
}

/// Build an error from a non-success response body.
fn api_error(status: u16, body: &[u8]) -> PebbleError {
    let message = serde_json::from_slice::<Envelope<ErrorResult>>(body)
        .ok()
        .and_then(|e| e.result)
        .map_or_else(|| format!("Pebble returned status {status}"), |r| r.message);

    PebbleError::Api { status, message }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<Envelope<T>> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }

    serde_json::from_slice(&body).map_err(|e| PebbleError::Decode(e.to_string()))
}

/// Decode the `result` of a sync response.
async fn sync_result<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    read_envelope::<T>(response)
        .await?
        .result
        .ok_or_else(|| PebbleError::Decode("response has no result".to_string()))
}

/// Decode the change id of an async response.
async fn async_change(response: reqwest::Response) -> Result<String> {
    read_envelope::<serde_json::Value>(response)
        .await?
        .change
        .ok_or_else(|| PebbleError::Decode("async response has no change id".to_string()))
}

#[async_trait]
impl Workload for HttpPebbleClient {
    async fn can_connect(&self) -> bool {
        match self.client.get(self.url("/v1/system-info")).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(status = %resp.status(), "Pebble system-info returned non-success status");
                false
            }
            Err(e) => {
                debug!(error = %e, "Pebble is not reachable");
                false
            }
        }
    }

    async fn push(&self, path: &str, content: &[u8], options: &PushOptions) -> Result<()> {
        let request = FilesRequest {
            action: "write",
            files: vec![WriteFile {
                path,
                make_dirs: options.make_dirs,
                permissions: format!("{:03o}", options.permissions),
                user: options.user.as_deref(),
                group: options.group.as_deref(),
            }],
        };
        let request =
            serde_json::to_string(&request).map_err(|e| PebbleError::Decode(e.to_string()))?;

        let form = multipart::Form::new().text("request", request).part(
            "files",
            multipart::Part::bytes(content.to_vec()).file_name(path.to_string()),
        );

        let response = self
            .client
            .post(self.url("/v1/files"))
            .multipart(form)
            .send()
            .await?;

        let results: Vec<FileResult> = sync_result(response).await?;
        for result in results {
            if let Some(error) = result.error {
                warn!(path = %result.path, error = %error.message, "Pebble rejected file write");
                return Err(PebbleError::PathError {
                    path: result.path,
                    message: error.message,
                });
            }
        }

        Ok(())
    }

    async fn get_plan(&self) -> Result<Plan> {
        let response = self
            .client
            .get(self.url("/v1/plan"))
            .query(&[("format", "yaml")])
            .send()
            .await?;

        let doc: String = sync_result(response).await?;
        Plan::from_yaml(&doc)
    }

    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        let request = LayersRequest {
            action: "add",
            combine,
            label,
            format: "yaml",
            layer: layer.to_yaml()?,
        };

        let response = self
            .client
            .post(self.url("/v1/layers"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        match read_envelope::<serde_json::Value>(response).await {
            Ok(_) => Ok(()),
            Err(PebbleError::Api { message, .. })
                if status == reqwest::StatusCode::BAD_REQUEST
                    && message.contains("already exists") =>
            {
                Err(PebbleError::LayerExists(label.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn get_service(&self, name: &str) -> Result<ServiceInfo> {
        let response = self
            .client
            .get(self.url("/v1/services"))
            .query(&[("names", name)])
            .send()
            .await?;

        let services: Vec<ServiceInfo> = sync_result(response).await?;
        services
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| PebbleError::ServiceNotFound(name.to_string()))
    }

    async fn start(&self, services: &[&str]) -> Result<()> {
        self.service_action("start", services).await
    }

    async fn stop(&self, services: &[&str]) -> Result<()> {
        self.service_action("stop", services).await
    }

    async fn autostart(&self) -> Result<()> {
        self.service_action("autostart", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Override, Service, ServiceStatus, Startup};
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sync(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "type": "sync",
            "status-code": 200,
            "status": "OK",
            "result": result,
        }))
    }

    fn accepted(change: &str) -> ResponseTemplate {
        ResponseTemplate::new(202).set_body_json(json!({
            "type": "async",
            "status-code": 202,
            "status": "Accepted",
            "change": change,
            "result": null,
        }))
    }

    fn error(status: u16, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(json!({
            "type": "error",
            "status-code": status,
            "status": "Error",
            "result": { "message": message },
        }))
    }

    async fn setup() -> (MockServer, HttpPebbleClient) {
        let server = MockServer::start().await;
        let client = HttpPebbleClient::new(server.uri()).unwrap();
        (server, client)
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = HttpPebbleClient::new("http://localhost:4000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:4000");
    }

    #[tokio::test]
    async fn can_connect_reachable() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v1/system-info"))
            .respond_with(sync(json!({ "version": "1.10.0" })))
            .mount(&server)
            .await;

        assert!(client.can_connect().await);
    }

    #[tokio::test]
    async fn can_connect_unreachable() {
        // Nothing listens on port 9 locally.
        let client = HttpPebbleClient::new("http://127.0.0.1:9").unwrap();
        assert!(!client.can_connect().await);
    }

    /// Serve one HTTP/1.1 response on `listener` and return the raw request head.
    #[cfg(unix)]
    async fn serve_once(listener: tokio::net::UnixListener, body: serde_json::Value) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut stream, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut chunk = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&chunk[..n]);
        }

        let body = body.to_string();
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();

        String::from_utf8(head).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn socket_client_reaches_pebble() {
        let dir = tempfile::TempDir::new().unwrap();
        let socket = dir.path().join("pebble.socket");
        let listener = tokio::net::UnixListener::bind(&socket).unwrap();
        let server = tokio::spawn(serve_once(
            listener,
            json!({
                "type": "sync",
                "status-code": 200,
                "status": "OK",
                "result": [{ "name": "mysql-haproxy", "startup": "enabled", "current": "active" }],
            }),
        ));

        let client = HttpPebbleClient::with_socket(&socket).unwrap();
        assert_eq!(client.base_url(), "http://localhost");

        let info = client.get_service("mysql-haproxy").await.unwrap();
        assert!(info.is_running());

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /v1/services?names=mysql-haproxy HTTP/1.1\r\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn socket_client_missing_socket_is_unreachable() {
        let dir = tempfile::TempDir::new().unwrap();
        let client = HttpPebbleClient::with_socket(dir.path().join("pebble.socket")).unwrap();

        assert!(!client.can_connect().await);
        let err = client.get_plan().await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_connection_error() {
        let client = HttpPebbleClient::new("http://127.0.0.1:9").unwrap();
        let err = client.get_plan().await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn get_plan_parses_yaml_result() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v1/plan"))
            .and(query_param("format", "yaml"))
            .respond_with(sync(json!(
                "services:\n  mysql-haproxy:\n    override: replace\n    summary: mysql haproxy\n    command: haproxy -f /configs\n    startup: enabled\n"
            )))
            .mount(&server)
            .await;

        let plan = client.get_plan().await.unwrap();
        let service = &plan.services["mysql-haproxy"];
        assert_eq!(service.r#override, Some(Override::Replace));
        assert_eq!(service.command.as_deref(), Some("haproxy -f /configs"));
        assert_eq!(service.startup, Some(Startup::Enabled));
    }

    #[tokio::test]
    async fn get_plan_empty() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v1/plan"))
            .respond_with(sync(json!("{}\n")))
            .mount(&server)
            .await;

        assert!(client.get_plan().await.unwrap().services.is_empty());
    }

    #[tokio::test]
    async fn add_layer_sends_combine_request() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/layers"))
            .and(body_string_contains("\"combine\":true"))
            .and(body_string_contains("\"label\":\"mysql-haproxy\""))
            .and(body_string_contains("\"format\":\"yaml\""))
            .respond_with(sync(json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        let mut layer = Layer::default();
        layer.services.insert(
            "mysql-haproxy".to_string(),
            Service {
                command: Some("haproxy -f /configs".to_string()),
                ..Default::default()
            },
        );

        client
            .add_layer("mysql-haproxy", &layer, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_layer_existing_label() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/layers"))
            .respond_with(error(400, "layer \"mysql-haproxy\" already exists"))
            .mount(&server)
            .await;

        let err = client
            .add_layer("mysql-haproxy", &Layer::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, PebbleError::LayerExists(label) if label == "mysql-haproxy"));
    }

    #[tokio::test]
    async fn get_service_found() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v1/services"))
            .and(query_param("names", "mysql-haproxy"))
            .respond_with(sync(json!([
                { "name": "mysql-haproxy", "startup": "enabled", "current": "active" }
            ])))
            .mount(&server)
            .await;

        let info = client.get_service("mysql-haproxy").await.unwrap();
        assert_eq!(info.current, ServiceStatus::Active);
        assert!(info.is_running());
    }

    #[tokio::test]
    async fn get_service_missing() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v1/services"))
            .respond_with(sync(json!([])))
            .mount(&server)
            .await;

        let err = client.get_service("mysql-haproxy").await.unwrap_err();
        assert!(matches!(err, PebbleError::ServiceNotFound(_)));
    }

    #[tokio::test]
    async fn start_waits_for_change() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/services"))
            .and(body_json(json!({ "action": "start", "services": ["mysql-haproxy"] })))
            .respond_with(accepted("7"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/changes/7/wait"))
            .respond_with(sync(json!({
                "id": "7", "kind": "start", "status": "Done", "ready": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        client.start(&["mysql-haproxy"]).await.unwrap();
    }

    #[tokio::test]
    async fn autostart_sends_empty_service_list() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/services"))
            .and(body_json(json!({ "action": "autostart", "services": [] })))
            .respond_with(accepted("3"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/changes/3/wait"))
            .respond_with(sync(json!({ "id": "3", "status": "Done", "ready": true })))
            .mount(&server)
            .await;

        client.autostart().await.unwrap();
    }

    #[tokio::test]
    async fn failed_change_is_reported() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/services"))
            .respond_with(accepted("9"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/changes/9/wait"))
            .respond_with(sync(json!({
                "id": "9",
                "kind": "stop",
                "status": "Error",
                "ready": true,
                "err": "cannot stop service"
            })))
            .mount(&server)
            .await;

        let err = client.stop(&["mysql-haproxy"]).await.unwrap_err();
        assert!(matches!(err, PebbleError::ChangeFailed { ref id, .. } if id == "9"));
    }

    #[tokio::test]
    async fn push_sends_multipart_write() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .and(body_string_contains("\"action\":\"write\""))
            .and(body_string_contains("\"make-dirs\":true"))
            .and(body_string_contains("\"permissions\":\"600\""))
            .and(body_string_contains("\"user\":\"haproxy\""))
            .and(body_string_contains("backend mysql-writers"))
            .respond_with(sync(json!([{ "path": "/configs/haproxy.cfg" }])))
            .expect(1)
            .mount(&server)
            .await;

        let options = PushOptions {
            permissions: 0o600,
            user: Some("haproxy".to_string()),
            group: None,
            make_dirs: true,
        };
        client
            .push("/configs/haproxy.cfg", b"backend mysql-writers\n", &options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn push_reports_file_error() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(sync(json!([{
                "path": "/configs/haproxy.cfg",
                "error": { "kind": "permission-denied", "message": "permission denied" }
            }])))
            .mount(&server)
            .await;

        let err = client
            .push("/configs/haproxy.cfg", b"", &PushOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PebbleError::PathError { ref path, .. } if path == "/configs/haproxy.cfg"));
    }

    #[tokio::test]
    async fn error_envelope_message() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v1/plan"))
            .respond_with(error(500, "internal failure"))
            .mount(&server)
            .await;

        let err = client.get_plan().await.unwrap_err();
        match err {
            PebbleError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal failure");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
