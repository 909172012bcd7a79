// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::test_support::{
    auth_config, authenticated_client, expired_token_body, token_body, MemoryTokenStore,
    MockApiServer, MockTokenServer,
};
use crate::transport::build_http_client;

#[tokio::test]
async fn expired_token_is_refreshed_and_retried() -> anyhow::Result<()> {
    let (client, idp) = authenticated_client(vec![(200, token_body("A2", None))]).await?;
    let api = MockApiServer::start(vec![
        (401, expired_token_body()),
        (200, r#"{"data":{"ok":true}}"#.to_owned()),
    ])
    .await?;

    let resp = client.get(&api.url("/data")).await?;

    assert!(resp.is_success());
    assert!(resp.text().contains("\"ok\":true"));
    let seen = api.recorded();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer A1"));
    assert_eq!(seen[1].authorization.as_deref(), Some("Bearer A2"));
    // One silent login refresh plus one on expiry.
    assert_eq!(idp.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn persistent_expiry_gives_up_after_max_attempts() -> anyhow::Result<()> {
    let (client, idp) = authenticated_client(vec![(200, token_body("A2", None))]).await?;
    let api = MockApiServer::start(vec![(401, expired_token_body())]).await?;

    let result = client.get(&api.url("/data")).await;

    assert!(matches!(result, Err(AuthError::RefreshExhausted { attempts: MAX_ATTEMPTS })));
    assert_eq!(api.recorded().len(), MAX_ATTEMPTS as usize);
    // No refresh after the final attempt.
    assert_eq!(idp.call_count(), MAX_ATTEMPTS);
    Ok(())
}

#[tokio::test]
async fn expiry_signal_is_detected_on_any_status() -> anyhow::Result<()> {
    let (client, idp) = authenticated_client(vec![(200, token_body("A2", None))]).await?;
    let api = MockApiServer::start(vec![
        (200, expired_token_body()),
        (200, r#"{"data":[]}"#.to_owned()),
    ])
    .await?;

    client.get(&api.url("/data")).await?;

    assert_eq!(api.recorded().len(), 2);
    assert_eq!(idp.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn expiry_is_detected_when_other_envelope_fields_are_mistyped() -> anyhow::Result<()> {
    let (client, idp) = authenticated_client(vec![(200, token_body("A2", None))]).await?;
    let api = MockApiServer::start(vec![
        (401, r#"{"error":"EXPIRED TOKEN","statusCode":"401","viErrorId":42}"#.to_owned()),
        (200, r#"{"data":{"ok":true}}"#.to_owned()),
    ])
    .await?;

    let resp = client.get(&api.url("/data")).await?;

    assert!(resp.is_success());
    let seen = api.recorded();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].authorization.as_deref(), Some("Bearer A2"));
    assert_eq!(idp.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn other_api_errors_pass_through_without_refresh() -> anyhow::Result<()> {
    let (client, idp) = authenticated_client(vec![]).await?;
    let api = MockApiServer::start(vec![(
        500,
        r#"{"error":"INTERNAL SERVER ERROR","statusCode":500}"#.to_owned(),
    )])
    .await?;

    let resp = client.get(&api.url("/data")).await?;

    assert_eq!(resp.status.as_u16(), 500);
    assert_eq!(resp.api_error().map(|e| e.error).as_deref(), Some("INTERNAL SERVER ERROR"));
    assert_eq!(api.recorded().len(), 1);
    assert_eq!(idp.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_refresh_aborts_the_call() -> anyhow::Result<()> {
    let (client, _idp) =
        authenticated_client(vec![(400, r#"{"error":"invalid_grant"}"#.to_owned())]).await?;
    let api = MockApiServer::start(vec![(401, expired_token_body())]).await?;

    let result = client.get(&api.url("/data")).await;

    assert!(matches!(result, Err(AuthError::Refresh { .. })));
    assert_eq!(api.recorded().len(), 1);
    Ok(())
}

#[tokio::test]
async fn caller_authorization_header_is_replaced() -> anyhow::Result<()> {
    let (client, _idp) = authenticated_client(vec![]).await?;
    let api = MockApiServer::start(vec![(200, "{}".to_owned())]).await?;

    let config = RequestConfig::json(serde_json::json!({"selected": ["1"]}))
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer forged"));
    client.call(Method::PUT, &api.url("/selected"), config).await?;

    let seen = api.recorded();
    assert_eq!(seen[0].method, "PUT");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer A1"));
    assert_eq!(seen[0].body, r#"{"selected":["1"]}"#);
    Ok(())
}

#[tokio::test]
async fn call_before_login_is_rejected() -> anyhow::Result<()> {
    let idp = MockTokenServer::start(vec![(200, token_body("A1", None))]).await?;
    let session =
        AuthSession::new(auth_config(&idp.token_url()), Arc::new(MemoryTokenStore::default()))?;
    let timeout = Duration::from_secs(5);
    let client = AuthorizedRequestClient::new(session, build_http_client(timeout)?, timeout);
    let api = MockApiServer::start(vec![(200, "{}".to_owned())]).await?;

    let result = client.get(&api.url("/data")).await;

    assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    assert!(api.recorded().is_empty());
    Ok(())
}

#[tokio::test]
async fn slow_api_surfaces_as_timeout() -> anyhow::Result<()> {
    let idp = MockTokenServer::start(vec![(200, token_body("A1", None))]).await?;
    let session = AuthSession::new(
        auth_config(&idp.token_url()),
        Arc::new(MemoryTokenStore::with_refresh_token("R")),
    )?;
    session.authenticate().await?;
    let timeout = Duration::from_millis(100);
    let client = AuthorizedRequestClient::new(session, build_http_client(timeout)?, timeout);
    let api =
        MockApiServer::start_with_delay(vec![(200, "{}".to_owned())], Duration::from_secs(2))
            .await?;

    let result = client.get(&api.url("/data")).await;

    assert!(matches!(result, Err(AuthError::Timeout { what: "API request", .. })));
    assert_eq!(idp.call_count(), 1);
    Ok(())
}
