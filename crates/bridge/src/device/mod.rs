// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Installation, gateway and device feature access over the authorized client.

pub mod directory;
pub mod feature;
pub mod poll;

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use directory::DeviceDirectory;
pub use feature::{Feature, FeatureValue};

/// Standard `{ "data": ... }` envelope of the resource API.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub id: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub installation_type: Option<String>,
    #[serde(default)]
    pub aggregated_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    pub serial: String,
    #[serde(default)]
    pub gateway_type: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub aggregated_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartComponent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Thermostat,
    #[default]
    TemperatureSensor,
}

/// One device the bridge polls, as configured by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub name: String,
    pub feature: String,
    pub device_id: String,
    #[serde(default, rename = "type")]
    pub kind: DeviceKind,
}

impl DeviceConfig {
    /// Burner features report on/off state instead of a temperature.
    pub fn is_burner(&self) -> bool {
        is_burner_feature(&self.feature)
    }
}

pub fn is_burner_feature(feature: &str) -> bool {
    feature.contains("burners")
}

/// Load the device list from a JSON file. Entries without a name are skipped.
pub fn load_devices(path: &Path) -> anyhow::Result<Vec<DeviceConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading device list {}", path.display()))?;
    let devices: Vec<DeviceConfig> = serde_json::from_str(&content)
        .with_context(|| format!("parsing device list {}", path.display()))?;
    Ok(devices
        .into_iter()
        .filter(|d| {
            if d.name.is_empty() {
                tracing::error!(feature = %d.feature, "device name is not set, skipping");
            }
            !d.name.is_empty()
        })
        .collect())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
