// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::device::{DeviceConfig, DeviceDirectory, DeviceKind, FeatureValue};
use crate::error::DeviceError;

/// Result of reading one configured device.
#[derive(Debug)]
pub struct DeviceReading {
    pub name: String,
    pub feature: String,
    pub kind: DeviceKind,
    pub value: Result<FeatureValue, DeviceError>,
}

/// Read every device once, in order. One failing device does not stop the rest.
pub async fn poll_once(directory: &DeviceDirectory, devices: &[DeviceConfig]) -> Vec<DeviceReading> {
    let mut readings = Vec::with_capacity(devices.len());
    for device in devices {
        let value = directory.current_value(&device.device_id, &device.feature).await;
        match value {
            Ok(FeatureValue::Temperature(t)) => {
                info!(device = %device.name, kind = ?device.kind, feature = %device.feature, temperature = t, "reading")
            }
            Ok(FeatureValue::Active(on)) => {
                info!(device = %device.name, kind = ?device.kind, feature = %device.feature, active = on, "reading")
            }
            Err(ref e) => warn!(device = %device.name, feature = %device.feature, err = %e, "device read failed"),
        }
        readings.push(DeviceReading {
            name: device.name.clone(),
            feature: device.feature.clone(),
            kind: device.kind,
            value,
        });
    }
    readings
}

/// Poll `devices` every `interval` until `shutdown` fires. A zero interval is
/// treated as one millisecond.
pub fn spawn_poller(
    directory: DeviceDirectory,
    devices: Vec<DeviceConfig>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval.max(Duration::from_millis(1)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {}
            }
            if devices.is_empty() {
                continue;
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = poll_once(&directory, &devices) => {}
            }
        }
    })
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
