// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn missing_file_is_created_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested/settings.json");
    let store = FileTokenStore::new(&path);

    assert_eq!(store.load(), PersistedStorage::default());
    assert_eq!(std::fs::read_to_string(&path)?, "{}");
    Ok(())
}

#[test]
fn corrupt_file_loads_as_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "not json")?;

    let store = FileTokenStore::new(&path);
    assert_eq!(store.load(), PersistedStorage::default());
    // Left untouched for the operator to inspect.
    assert_eq!(std::fs::read_to_string(&path)?, "not json");
    Ok(())
}

#[test]
fn save_then_load_uses_camel_case_field() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.json");
    let store = FileTokenStore::new(&path);

    store.save(&PersistedStorage { refresh_token: Some("R".into()), ..Default::default() });

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(raw, serde_json::json!({ "refreshToken": "R" }));
    assert_eq!(store.load().refresh_token.as_deref(), Some("R"));
    Ok(())
}

#[test]
fn unknown_fields_are_tolerated() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"refreshToken":"R","other":1}"#)?;

    let store = FileTokenStore::new(&path);
    let mut storage = store.load();
    assert_eq!(storage.refresh_token.as_deref(), Some("R"));

    storage.refresh_token = Some("R2".into());
    store.save(&storage);
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(raw, serde_json::json!({ "refreshToken": "R2", "other": 1 }));
    Ok(())
}

#[test]
fn save_into_unwritable_location_is_swallowed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    // Parent "directory" is a regular file, so create_dir_all fails.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "x")?;
    let store = FileTokenStore::new(blocker.join("settings.json"));

    store.save(&PersistedStorage { refresh_token: Some("R".into()), ..Default::default() });
    assert_eq!(store.load(), PersistedStorage::default());
    Ok(())
}
