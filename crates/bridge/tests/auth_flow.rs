// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end authentication flows against in-process identity and resource stubs.

use std::sync::Arc;

use vicare_bridge::credential::session::AuthSession;
use vicare_bridge::credential::store::{FileTokenStore, TokenStore};
use vicare_bridge::credential::{AuthEvent, AuthState};
use vicare_bridge::device::{DeviceDirectory, FeatureValue};
use vicare_bridge::test_support::{
    auth_config, complete_login, expired_token_body, token_body, MockApiServer, MockTokenServer,
};
use vicare_bridge::transport::{build_http_client, AuthorizedRequestClient};

#[tokio::test]
async fn login_persists_and_next_start_is_silent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("vicare-settings.json");
    let idp = MockTokenServer::start(vec![
        (200, token_body("A1", Some("R1"))),
        (200, token_body("A2", None)),
    ])
    .await?;

    // First start: nothing stored, browser login.
    let first = AuthSession::new(auth_config(&idp.token_url()), Arc::new(FileTokenStore::new(&path)))?;
    let browser = complete_login(first.subscribe(), "CODE");
    first.authenticate().await?;
    browser.await??;
    assert_eq!(FileTokenStore::new(&path).load().refresh_token.as_deref(), Some("R1"));

    // Second start: refresh from the file, no listener.
    let second = AuthSession::new(auth_config(&idp.token_url()), Arc::new(FileTokenStore::new(&path)))?;
    let mut events = second.subscribe();
    let set = second.authenticate().await?;

    assert_eq!(set.access_token, "A2");
    assert_eq!(set.refresh_token, "R1");
    assert_eq!(second.state().await, AuthState::Authenticated);
    assert!(matches!(events.try_recv(), Ok(AuthEvent::Refreshed)));
    assert_eq!(idp.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn callback_port_is_released_after_login() -> anyhow::Result<()> {
    let idp = MockTokenServer::start(vec![(200, token_body("A1", Some("R1")))]).await?;
    let dir = tempfile::tempdir()?;
    let store = Arc::new(FileTokenStore::new(dir.path().join("vicare-settings.json")));
    let session = AuthSession::new(auth_config(&idp.token_url()), store)?;

    let mut events = session.subscribe();
    let browser = complete_login(session.subscribe(), "CODE");
    session.start_interactive_login().await?;
    browser.await??;

    let redirect_uri = match events.recv().await? {
        AuthEvent::LoginRequired { redirect_uri, .. } => redirect_uri,
        other => anyhow::bail!("expected login event, got {other:?}"),
    };
    let addr = redirect_uri.trim_start_matches("http://");
    tokio::net::TcpListener::bind(addr).await?;
    Ok(())
}

#[tokio::test]
async fn expired_token_mid_session_is_transparent() -> anyhow::Result<()> {
    let idp = MockTokenServer::start(vec![
        (200, token_body("A1", Some("R1"))),
        (200, token_body("A2", Some("R2"))),
    ])
    .await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("vicare-settings.json");
    let session = AuthSession::new(auth_config(&idp.token_url()), Arc::new(FileTokenStore::new(&path)))?;
    let browser = complete_login(session.subscribe(), "CODE");
    session.authenticate().await?;
    browser.await??;

    let api = MockApiServer::start(vec![
        (200, r#"{"data":[{"id":7}]}"#.to_owned()),
        (200, r#"{"data":[{"serial":"S7"}]}"#.to_owned()),
        (401, expired_token_body()),
        (200, r#"{"data":{"properties":{"value":{"type":"number","value":19.5}}}}"#.to_owned()),
    ])
    .await?;
    let timeout = std::time::Duration::from_secs(5);
    let client = AuthorizedRequestClient::new(session, build_http_client(timeout)?, timeout);
    let directory = DeviceDirectory::discover(client, &api.url("")).await?;

    let value = directory.current_value("0", "heating.sensors.temperature.outside").await?;

    assert_eq!(value, FeatureValue::Temperature(19.5));
    let seen = api.recorded();
    assert_eq!(seen[3].authorization.as_deref(), Some("Bearer A2"));
    // Rotated refresh token reached the file.
    assert_eq!(FileTokenStore::new(&path).load().refresh_token.as_deref(), Some("R2"));
    Ok(())
}
