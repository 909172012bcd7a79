// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: stub servers, an in-memory token store, and
//! a scripted browser for the interactive login.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::routing::post;
use axum::{Form, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::credential::store::{PersistedStorage, TokenStore};
use crate::credential::{AuthConfig, AuthEvent};
use crate::credential::session::AuthSession;
use crate::transport::{build_http_client, AuthorizedRequestClient};

/// [`TokenStore`] kept in memory that counts saves.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    storage: Mutex<PersistedStorage>,
    saves: AtomicU32,
}

impl MemoryTokenStore {
    pub fn with_refresh_token(token: &str) -> Self {
        let storage = PersistedStorage { refresh_token: Some(token.to_owned()), ..Default::default() };
        Self { storage: Mutex::new(storage), saves: AtomicU32::new(0) }
    }

    pub fn save_count(&self) -> u32 {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PersistedStorage {
        self.storage.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> PersistedStorage {
        self.snapshot()
    }

    fn save(&self, storage: &PersistedStorage) {
        self.saves.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.storage.lock() {
            *guard = storage.clone();
        }
    }
}

/// Serve `router` on an ephemeral localhost port.
pub async fn spawn_router(router: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    Ok(addr)
}

/// Stub `/token` endpoint replaying scripted `(status, body)` responses.
pub struct MockTokenServer {
    pub addr: SocketAddr,
    pub calls: Arc<AtomicU32>,
    /// Form bodies received, in order.
    pub requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl MockTokenServer {
    pub async fn start(responses: Vec<(u16, String)>) -> anyhow::Result<Self> {
        Self::start_with_delay(responses, Duration::ZERO).await
    }

    /// Like [`MockTokenServer::start`] but each response is held back by `delay`.
    pub async fn start_with_delay(
        responses: Vec<(u16, String)>,
        delay: Duration,
    ) -> anyhow::Result<Self> {
        let calls = Arc::new(AtomicU32::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(responses);

        let app = Router::new().route(
            "/token",
            post({
                let calls = Arc::clone(&calls);
                let requests = Arc::clone(&requests);
                move |Form(form): Form<HashMap<String, String>>| {
                    let calls = Arc::clone(&calls);
                    let requests = Arc::clone(&requests);
                    let resps = Arc::clone(&responses);
                    async move {
                        let idx = calls.fetch_add(1, Ordering::Relaxed) as usize;
                        if let Ok(mut reqs) = requests.lock() {
                            reqs.push(form);
                        }
                        tokio::time::sleep(delay).await;
                        // Past the script, repeat the last response.
                        let (status, body) = resps
                            .get(idx)
                            .or_else(|| resps.last())
                            .cloned()
                            .unwrap_or((500, "{}".to_owned()));
                        (
                            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                            body,
                        )
                    }
                }
            }),
        );

        let addr = spawn_router(app).await?;
        Ok(Self { addr, calls, requests })
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn request(&self, idx: usize) -> Option<HashMap<String, String>> {
        self.requests.lock().ok().and_then(|r| r.get(idx).cloned())
    }
}

/// A request seen by [`MockApiServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Stub resource API replaying scripted `(status, body)` responses in order,
/// whatever the path.
pub struct MockApiServer {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockApiServer {
    pub async fn start(responses: Vec<(u16, String)>) -> anyhow::Result<Self> {
        Self::start_with_delay(responses, Duration::ZERO).await
    }

    pub async fn start_with_delay(
        responses: Vec<(u16, String)>,
        delay: Duration,
    ) -> anyhow::Result<Self> {
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(responses);

        let app = Router::new().fallback({
            let requests = Arc::clone(&requests);
            move |method: Method, uri: Uri, headers: HeaderMap, body: String| {
                let requests = Arc::clone(&requests);
                let resps = Arc::clone(&responses);
                async move {
                    let authorization = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let idx = match requests.lock() {
                        Ok(mut reqs) => {
                            reqs.push(RecordedRequest {
                                method: method.to_string(),
                                path: uri.path().to_owned(),
                                authorization,
                                body,
                            });
                            reqs.len() - 1
                        }
                        Err(_) => 0,
                    };
                    tokio::time::sleep(delay).await;
                    let (status, body) = resps
                        .get(idx)
                        .or_else(|| resps.last())
                        .cloned()
                        .unwrap_or((500, "{}".to_owned()));
                    (
                        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                        [(header::CONTENT_TYPE, "application/json")],
                        body,
                    )
                }
            }
        });

        let addr = spawn_router(app).await?;
        Ok(Self { addr, requests })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

/// Body the resource API returns for an expired access token.
pub fn expired_token_body() -> String {
    serde_json::json!({
        "viErrorId": "req-1",
        "statusCode": 401,
        "errorType": "TOKEN_EXPIRED",
        "message": "Token expired",
        "error": "EXPIRED TOKEN",
    })
    .to_string()
}

/// JSON body of a successful token response.
pub fn token_body(access: &str, refresh: Option<&str>) -> String {
    let mut body = serde_json::json!({
        "access_token": access,
        "expires_in": 3600,
        "token_type": "Bearer",
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::String(refresh.to_owned());
    }
    body.to_string()
}

/// Auth config pointing at a stub identity provider, callback on an ephemeral port.
pub fn auth_config(token_url: &str) -> AuthConfig {
    let mut config = AuthConfig::new("test-client", "http://127.0.0.1:9/idp/v3");
    config.token_url = token_url.to_owned();
    config.redirect_host = Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
    config.callback_port = 0;
    config.login_timeout = Duration::from_secs(5);
    config.http_timeout = Duration::from_secs(5);
    config
}

/// Client whose session already holds access token `A1`, with `refreshes`
/// scripted on the token endpoint behind the initial silent refresh.
pub async fn authenticated_client(
    refreshes: Vec<(u16, String)>,
) -> anyhow::Result<(AuthorizedRequestClient, MockTokenServer)> {
    let mut script = vec![(200, token_body("A1", None))];
    script.extend(refreshes);
    let idp = MockTokenServer::start(script).await?;
    let session = AuthSession::new(
        auth_config(&idp.token_url()),
        Arc::new(MemoryTokenStore::with_refresh_token("R")),
    )?;
    session.authenticate().await?;
    let timeout = Duration::from_secs(5);
    Ok((AuthorizedRequestClient::new(session, build_http_client(timeout)?, timeout), idp))
}

/// Play the browser: wait for the login URL, then hit the redirect with `code`.
///
/// Resolves to the authorize URL that was published.
pub fn complete_login(
    mut events: broadcast::Receiver<AuthEvent>,
    code: &'static str,
) -> JoinHandle<anyhow::Result<String>> {
    tokio::spawn(async move {
        loop {
            if let AuthEvent::LoginRequired { auth_url, redirect_uri } = events.recv().await? {
                let resp = build_http_client(Duration::from_secs(5))?
                    .get(format!("{redirect_uri}/?code={code}"))
                    .send()
                    .await?;
                anyhow::ensure!(resp.status().is_success(), "callback returned {}", resp.status());
                return Ok(auth_url);
            }
        }
    })
}

/// Extract a query parameter from a URL built by `build_auth_url`.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_owned())
    })
}
