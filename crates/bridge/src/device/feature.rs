// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A device feature as returned by the features API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    #[serde(default)]
    pub feature: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default)]
    pub properties: HashMap<String, FeatureProperty>,
    #[serde(default)]
    pub commands: HashMap<String, FeatureCommand>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureProperty {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCommand {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_executable: bool,
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

/// The reading the bridge takes from one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FeatureValue {
    Temperature(f64),
    Active(bool),
}

impl Feature {
    /// Parse a feature body, with or without the `data` envelope.
    pub fn from_body(body: &[u8]) -> serde_json::Result<Self> {
        let mut value: Value = serde_json::from_slice(body)?;
        if let Value::Object(ref mut map) = value {
            if map.get("data").is_some_and(Value::is_object) {
                if let Some(data) = map.remove("data") {
                    return serde_json::from_value(data);
                }
            }
        }
        serde_json::from_value(value)
    }

    /// `properties.value.value`, else `properties.temperature.value`.
    pub fn temperature(&self) -> Option<f64> {
        ["value", "temperature"]
            .iter()
            .find_map(|key| self.properties.get(*key).and_then(|p| p.value.as_f64()))
    }

    /// `properties.active.value`.
    pub fn active(&self) -> Option<bool> {
        self.properties.get("active").and_then(|p| p.value.as_bool())
    }
}

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;
