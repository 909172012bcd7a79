// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const WRAPPED: &str = r#"{
    "data": {
        "feature": "heating.boiler.sensors.temperature.main",
        "deviceId": "0",
        "isEnabled": true,
        "isReady": true,
        "properties": {
            "status": {"type": "string", "value": "connected"},
            "value": {"type": "number", "value": 52.5, "unit": "celsius"}
        },
        "commands": {}
    }
}"#;

#[test]
fn wrapped_temperature_is_read_from_value() -> anyhow::Result<()> {
    let feature = Feature::from_body(WRAPPED.as_bytes())?;
    assert_eq!(feature.feature, "heating.boiler.sensors.temperature.main");
    assert!(feature.is_enabled);
    assert_eq!(feature.temperature(), Some(52.5));
    assert_eq!(feature.active(), None);
    Ok(())
}

#[test]
fn bare_body_falls_back_to_temperature_property() -> anyhow::Result<()> {
    let body = r#"{"feature": "heating.circuits.0.temperature",
        "properties": {"temperature": {"type": "number", "value": 21, "unit": "celsius"}}}"#;
    let feature = Feature::from_body(body.as_bytes())?;
    assert_eq!(feature.temperature(), Some(21.0));
    Ok(())
}

#[test]
fn burner_state_is_read_from_active() -> anyhow::Result<()> {
    let body = r#"{"data": {"feature": "heating.burners.0",
        "properties": {"active": {"type": "boolean", "value": true}},
        "commands": {"setActive": {"uri": "https://x/commands/setActive", "name": "setActive",
            "isExecutable": true, "params": {"active": {"type": "boolean", "required": true}}}}}}"#;
    let feature = Feature::from_body(body.as_bytes())?;
    assert_eq!(feature.active(), Some(true));
    assert_eq!(feature.temperature(), None);
    assert!(feature.commands.get("setActive").is_some_and(|c| c.is_executable));
    Ok(())
}

#[test]
fn feature_without_properties_has_no_reading() -> anyhow::Result<()> {
    let feature = Feature::from_body(br#"{"data": {"feature": "heating", "commands": {}}}"#)?;
    assert_eq!(feature.temperature(), None);
    assert_eq!(feature.active(), None);
    Ok(())
}

#[test]
fn non_json_body_is_an_error() {
    assert!(Feature::from_body(b"<html>").is_err());
}
