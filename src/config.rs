//! Application configuration
//!
//! Loads the YAML file describing which devices to instantiate (from their
//! driver descriptors) or which saved project to resume.

use crate::device_config::{device_id_for, DeviceConfig};
use crate::driver::DeviceDriver;
use crate::project::Project;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::fs;
use tracing::info;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Saved project to load instead of building one from drivers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Save propagator state along with the configuration
    #[serde(default = "default_include_state")]
    pub include_state: bool,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

/// One device to instantiate from its driver
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Nth connected device of the same model
    #[serde(default)]
    pub occurrence: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Ids of the devices sustain events are mirrored to
    #[serde(default)]
    pub share_sustain: Vec<String>,
    pub driver: DeviceDriver,
}

impl DeviceEntry {
    pub fn id(&self) -> String {
        device_id_for(&self.driver.name, self.occurrence)
    }
}

fn default_include_state() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() && self.project.is_none() {
            anyhow::bail!("Either a project file or at least one device must be configured");
        }

        if let Some(project) = &self.project {
            if project.is_empty() {
                anyhow::bail!("Project path cannot be empty");
            }
        }

        let mut ids = HashSet::new();
        for (idx, entry) in self.devices.iter().enumerate() {
            if entry.driver.name.is_empty() {
                anyhow::bail!("Device {} name cannot be empty", idx);
            }

            let id = entry.id();
            if !ids.insert(id.clone()) {
                anyhow::bail!("Device '{}' is configured twice", id);
            }

            Self::validate_driver(&entry.driver)
                .with_context(|| format!("Invalid driver for device '{}'", id))?;
        }

        for entry in &self.devices {
            for target in &entry.share_sustain {
                if !ids.contains(target) {
                    anyhow::bail!(
                        "Device '{}' shares sustain with unknown device '{}'",
                        entry.id(),
                        target
                    );
                }
            }
        }

        Ok(())
    }

    fn validate_driver(driver: &DeviceDriver) -> Result<()> {
        if let Some(keyboard) = &driver.keyboard {
            if keyboard.channel > 15 {
                anyhow::bail!("Keyboard channel {} is invalid (must be 0-15)", keyboard.channel);
            }
        }

        for (idx, input) in driver.inputs.iter().enumerate() {
            if input.channel > 15 {
                anyhow::bail!("Input {} channel {} is invalid (must be 0-15)", idx, input.channel);
            }
            if input.number > 127 {
                anyhow::bail!("Input {} number {} is invalid (must be 0-127)", idx, input.number);
            }
            if input.value.map_or(false, |v| v > 127) {
                anyhow::bail!("Input {} value is invalid (must be 0-127)", idx);
            }

            for color in &input.available_colors {
                if color.value > 127 {
                    anyhow::bail!(
                        "Color '{}' of input {} has invalid value {} (must be 0-127)",
                        color.name,
                        idx,
                        color.value
                    );
                }
            }
        }

        Ok(())
    }

    /// Fresh project from the configured drivers
    pub fn to_project(&self) -> Result<Project> {
        let mut project = Project::new();

        for entry in &self.devices {
            let id = entry.id();
            let mut device = DeviceConfig::from_driver(&entry.driver, entry.occurrence)
                .with_context(|| format!("Failed to build device '{}'", id))?;

            if let Some(nickname) = &entry.nickname {
                device.set_nickname(nickname.clone());
            }
            for target in &entry.share_sustain {
                device.share_with(target.clone());
            }

            project
                .add_device(device)
                .with_context(|| format!("Failed to add device '{}'", id))?;
        }

        Ok(project)
    }

    /// Saved project if one is configured, otherwise a fresh one
    pub async fn build_project(&self) -> Result<Project> {
        match &self.project {
            Some(path) => Project::load_from_file(path).await,
            None => {
                let project = self.to_project()?;
                info!("Built project from {} device drivers", project.devices().len());
                Ok(project)
            }
        }
    }
}
