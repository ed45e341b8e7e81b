//! A mock workload for testing without a real Pebble endpoint.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::Workload;
use crate::error::{PebbleError, Result};
use crate::types::{Layer, Plan, PushOptions, ServiceInfo, ServiceStatus, Startup};

/// A file written into the mock workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFile {
    /// File content.
    pub content: Vec<u8>,
    /// Options the file was written with.
    pub options: PushOptions,
}

/// Counters for calls made against the mock workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Calls to `push`.
    pub push: usize,
    /// Calls to `get_plan`.
    pub get_plan: usize,
    /// Calls to `add_layer`.
    pub add_layer: usize,
    /// Calls to `start`.
    pub start: usize,
    /// Calls to `stop`.
    pub stop: usize,
    /// Calls to `autostart`.
    pub autostart: usize,
}

/// A workload operation, used to inject connection loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOperation {
    /// `push`
    Push,
    /// `get_plan`
    GetPlan,
    /// `add_layer`
    AddLayer,
    /// `get_service`
    GetService,
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `autostart`
    Autostart,
}

impl CallCounts {
    fn record(&mut self, op: MockOperation) {
        match op {
            MockOperation::Push => self.push += 1,
            MockOperation::GetPlan => self.get_plan += 1,
            MockOperation::AddLayer => self.add_layer += 1,
            MockOperation::Start => self.start += 1,
            MockOperation::Stop => self.stop += 1,
            MockOperation::Autostart => self.autostart += 1,
            MockOperation::GetService => {}
        }
    }
}

#[derive(Debug, Default)]
struct State {
    connected: bool,
    layers: Vec<String>,
    plan: Plan,
    running: HashMap<String, ServiceStatus>,
    files: BTreeMap<String, MockFile>,
    calls: CallCounts,
    drop_on: Option<MockOperation>,
}

/// A mock workload that keeps its plan, files and services in memory.
///
/// The workload starts reachable with an empty plan.
#[derive(Debug)]
pub struct MockWorkload {
    state: Mutex<State>,
}

impl Default for MockWorkload {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                connected: true,
                ..State::default()
            }),
        }
    }
}

impl MockWorkload {
    /// Create a new reachable mock workload with an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the Pebble endpoint reachable or unreachable.
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Lose the connection when `op` is next called.
    ///
    /// That call fails with `PebbleError::Connection` and the workload stays
    /// unreachable until [`set_connected`](Self::set_connected) is called.
    pub fn drop_connection_on(&self, op: MockOperation) {
        self.state.lock().drop_on = Some(op);
    }

    /// Replace the current plan without going through a layer.
    pub fn set_plan(&self, plan: Plan) {
        self.state.lock().plan = plan;
    }

    /// Force the run-state of a service.
    pub fn set_service_status(&self, name: &str, status: ServiceStatus) {
        self.state.lock().running.insert(name.to_string(), status);
    }

    /// Get the current plan.
    #[must_use]
    pub fn plan(&self) -> Plan {
        self.state.lock().plan.clone()
    }

    /// Get a file written into the workload.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<MockFile> {
        self.state.lock().files.get(path).cloned()
    }

    /// Returns true if the named service is running.
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.state.lock().running.get(name) == Some(&ServiceStatus::Active)
    }

    /// Get the call counters.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    /// Reset the call counters.
    pub fn reset_calls(&self) {
        self.state.lock().calls = CallCounts::default();
    }
}

impl State {
    /// Record a call to `op` and fail if the workload is unreachable.
    fn begin(&mut self, op: MockOperation) -> Result<()> {
        self.calls.record(op);
        if self.drop_on == Some(op) {
            self.drop_on = None;
            self.connected = false;
        }
        self.ensure_connected()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(PebbleError::Connection(
                "mock workload is unreachable".to_string(),
            ))
        }
    }

    fn ensure_in_plan(&self, name: &str) -> Result<()> {
        if self.plan.services.contains_key(name) {
            Ok(())
        } else {
            Err(PebbleError::Api {
                status: 400,
                message: format!("service {name:?} does not exist"),
            })
        }
    }
}

#[async_trait]
impl Workload for MockWorkload {
    async fn can_connect(&self) -> bool {
        self.state.lock().connected
    }

    async fn push(&self, path: &str, content: &[u8], options: &PushOptions) -> Result<()> {
        let mut state = self.state.lock();
        state.begin(MockOperation::Push)?;

        let parent_exists = match path.rsplit_once('/') {
            Some(("", _)) | None => true,
            Some((parent, _)) => state
                .files
                .keys()
                .any(|p| p.starts_with(&format!("{parent}/"))),
        };
        if !options.make_dirs && !parent_exists {
            return Err(PebbleError::PathError {
                path: path.to_string(),
                message: "parent directory does not exist".to_string(),
            });
        }

        state.files.insert(
            path.to_string(),
            MockFile {
                content: content.to_vec(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    async fn get_plan(&self) -> Result<Plan> {
        let mut state = self.state.lock();
        state.begin(MockOperation::GetPlan)?;
        Ok(state.plan.clone())
    }

    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.begin(MockOperation::AddLayer)?;

        let exists = state.layers.iter().any(|l| l == label);
        if exists && !combine {
            return Err(PebbleError::LayerExists(label.to_string()));
        }
        if !exists {
            state.layers.push(label.to_string());
        }

        state.plan.combine(layer);
        Ok(())
    }

    async fn get_service(&self, name: &str) -> Result<ServiceInfo> {
        let mut state = self.state.lock();
        state.begin(MockOperation::GetService)?;

        let service = state
            .plan
            .services
            .get(name)
            .ok_or_else(|| PebbleError::ServiceNotFound(name.to_string()))?;

        Ok(ServiceInfo {
            name: name.to_string(),
            startup: service.startup.unwrap_or(Startup::Unknown),
            current: state.running.get(name).copied().unwrap_or_default(),
        })
    }

    async fn start(&self, services: &[&str]) -> Result<()> {
        let mut state = self.state.lock();
        state.begin(MockOperation::Start)?;

        for name in services {
            state.ensure_in_plan(name)?;
        }
        for name in services {
            state
                .running
                .insert((*name).to_string(), ServiceStatus::Active);
        }
        Ok(())
    }

    async fn stop(&self, services: &[&str]) -> Result<()> {
        let mut state = self.state.lock();
        state.begin(MockOperation::Stop)?;

        for name in services {
            state.ensure_in_plan(name)?;
        }
        for name in services {
            state
                .running
                .insert((*name).to_string(), ServiceStatus::Inactive);
        }
        Ok(())
    }

    async fn autostart(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.begin(MockOperation::Autostart)?;

        let enabled: Vec<String> = state
            .plan
            .services
            .iter()
            .filter(|(_, s)| s.is_startup_enabled())
            .map(|(name, _)| name.clone())
            .collect();
        for name in enabled {
            state.running.insert(name, ServiceStatus::Active);
        }
        Ok(())
    }
}
