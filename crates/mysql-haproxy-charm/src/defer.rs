//! Deferred event store.
//!
//! Events a handler could not finish are persisted between dispatches and
//! re-emitted, oldest first, before the event of the next dispatch.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CharmError, Result};
use crate::event::HookEvent;

/// An event waiting to be redelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredEvent {
    /// The deferred event.
    pub event: HookEvent,
    /// When it was first deferred.
    pub deferred_at: DateTime<Utc>,
}

impl DeferredEvent {
    /// Record `event` as deferred now.
    #[must_use]
    pub fn now(event: HookEvent) -> Self {
        Self {
            event,
            deferred_at: Utc::now(),
        }
    }
}

/// JSON file holding deferred events.
#[derive(Debug, Clone)]
pub struct DeferredEventStore {
    path: PathBuf,
}

impl DeferredEventStore {
    /// Create a store backed by the file at `path`.
    ///
    /// The file and its parent directory are created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the pending events, oldest first.
    ///
    /// A missing file is an empty queue.
    ///
    /// # Errors
    ///
    /// Returns `CharmError::DeferredStore` if the file cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<Vec<DeferredEvent>> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                CharmError::DeferredStore(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(CharmError::DeferredStore(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Replace the pending events.
    ///
    /// The file is written to a sibling and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns `CharmError::DeferredStore` if the file cannot be written.
    pub fn save(&self, events: &[DeferredEvent]) -> Result<()> {
        let store_err = |e: std::io::Error| {
            CharmError::DeferredStore(format!("{}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(store_err)?;
        }

        let bytes = serde_json::to_vec_pretty(events)
            .map_err(|e| CharmError::DeferredStore(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(store_err)?;
        fs::rename(&tmp, &self.path).map_err(store_err)?;

        Ok(())
    }
}

/// Add `event` to `queue` unless an equal event is already pending.
///
/// Returns true if the event was added.
pub(crate) fn enqueue(queue: &mut Vec<DeferredEvent>, event: HookEvent) -> bool {
    if queue.iter().any(|pending| pending.event == event) {
        return false;
    }
    queue.push(DeferredEvent::now(event));
    true
}
