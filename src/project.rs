//! Project - the set of configured devices and its on-disk snapshot

use crate::device_config::{DeviceConfig, Routed};
use crate::error::{EngineError, Result};
use crate::wire::WireEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// All configured devices, in the order they were added
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    devices: Vec<DeviceConfig>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[DeviceConfig] {
        &self.devices
    }

    pub fn add_device(&mut self, device: DeviceConfig) -> Result<()> {
        if self.device(device.id()).is_some() {
            return Err(EngineError::DuplicateDevice(device.id().to_string()));
        }

        debug!("Added device {}", device.id());
        self.devices.push(device);
        Ok(())
    }

    /// Remove a device and stop every other device sharing with it
    pub fn remove_device(&mut self, device_id: &str) -> Result<DeviceConfig> {
        let index = self
            .devices
            .iter()
            .position(|d| d.id() == device_id)
            .ok_or_else(|| EngineError::UnknownDevice(device_id.to_string()))?;

        let removed = self.devices.remove(index);
        for device in &mut self.devices {
            device.stop_sharing(device_id);
        }

        debug!("Removed device {}", device_id);
        Ok(removed)
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.id() == device_id)
    }

    pub fn device_mut(&mut self, device_id: &str) -> Option<&mut DeviceConfig> {
        self.devices.iter_mut().find(|d| d.id() == device_id)
    }

    /// Keyboard channel of every device that has a keyboard
    fn keyboard_channels(&self) -> HashMap<String, u8> {
        self.devices
            .iter()
            .filter_map(|d| d.keyboard().map(|kb| (d.id().to_string(), kb.channel)))
            .collect()
    }

    /// Route an event coming from `device_id`
    pub fn handle_message(&mut self, device_id: &str, event: WireEvent) -> Result<Routed> {
        let peers = if event.is_sustain() {
            self.keyboard_channels()
        } else {
            HashMap::new()
        };
        let device = self
            .device_mut(device_id)
            .ok_or_else(|| EngineError::UnknownDevice(device_id.to_string()))?;

        device.route(event, &peers)
    }

    /// Copy of the project with every input in the unbound state
    pub fn without_state(&self) -> Self {
        Self {
            devices: self.devices.iter().map(DeviceConfig::without_state).collect(),
        }
    }

    pub async fn save_to_file(&self, path: impl AsRef<Path>, include_state: bool) -> anyhow::Result<()> {
        ProjectSnapshot::from_project(self, include_state)
            .save_to_file(path)
            .await
    }

    pub async fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(ProjectSnapshot::load_from_file(path).await?.project)
    }
}

/// Project snapshot for JSON serialization
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Version of the snapshot format
    pub version: String,
    /// Milliseconds since epoch
    pub timestamp: u64,
    /// Were propagator states saved?
    pub include_state: bool,
    #[serde(flatten)]
    pub project: Project,
}

impl ProjectSnapshot {
    /// Current snapshot format version
    pub const VERSION: &'static str = "1.0.0";

    pub fn from_project(project: &Project, include_state: bool) -> Self {
        let project = if include_state {
            project.clone()
        } else {
            project.without_state()
        };

        Self {
            version: Self::VERSION.to_string(),
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            include_state,
            project,
        }
    }

    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        use anyhow::Context;

        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize project snapshot")?;

        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write project to {}", path.display()))?;

        info!(
            "Project saved to {} ({} devices)",
            path.display(),
            self.project.devices.len()
        );
        Ok(())
    }

    pub async fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read project file: {}", path.display()))?;

        let snapshot: ProjectSnapshot =
            serde_json::from_str(&json).context("Failed to parse project JSON")?;

        info!(
            "Project loaded from {} (version: {}, {} devices)",
            path.display(),
            snapshot.version,
            snapshot.project.devices.len()
        );

        Ok(snapshot)
    }
}
