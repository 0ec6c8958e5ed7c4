//! Host doubles: a fixed module table and a recording listener.

use crate::host::{HostModules, UpdateCompletedEvent, UpdateCompletionListener};
use std::collections::HashMap;
use std::sync::Mutex;

/// [`HostModules`] answering from a fixed table.
#[derive(Debug, Default)]
pub struct StaticHostModules {
    versions: Mutex<HashMap<String, String>>,
    host_version: Option<String>,
}

impl StaticHostModules {
    /// Empty table, no host version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host's own version.
    #[must_use]
    pub fn with_host_version(mut self, version: &str) -> Self {
        self.host_version = Some(version.to_string());
        self
    }

    /// Add an installed component.
    #[must_use]
    pub fn with_component(self, name: &str, version: &str) -> Self {
        self.set_component(name, version);
        self
    }

    /// Change an installed component's version.
    pub fn set_component(&self, name: &str, version: &str) {
        self.versions.lock().unwrap().insert(name.to_string(), version.to_string());
    }
}

impl HostModules for StaticHostModules {
    fn installed_version(&self, component: &str) -> Option<String> {
        self.versions.lock().unwrap().get(component).cloned()
    }

    fn host_version(&self) -> Option<String> {
        self.host_version.clone()
    }
}

/// Listener that records every event with the name of the delivering thread.
#[derive(Debug, Default)]
pub struct RecordingListener {
    deliveries: Mutex<Vec<(UpdateCompletedEvent, Option<String>)>>,
}

impl RecordingListener {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<UpdateCompletedEvent> {
        self.deliveries.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    /// Events with the name of the thread that delivered each one.
    pub fn deliveries(&self) -> Vec<(UpdateCompletedEvent, Option<String>)> {
        self.deliveries.lock().unwrap().clone()
    }
}

impl UpdateCompletionListener for RecordingListener {
    fn on_update_completed(&self, event: &UpdateCompletedEvent) {
        let thread = std::thread::current().name().map(ToString::to_string);
        self.deliveries.lock().unwrap().push((event.clone(), thread));
    }
}
