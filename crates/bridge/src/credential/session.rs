// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication session: interactive PKCE login, silent refresh, and the
//! shared access token every authorized request reads.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::credential::callback::CallbackListener;
use crate::credential::oauth::{build_auth_url, TokenResponse, TokenSet};
use crate::credential::pkce::PkcePair;
use crate::credential::store::TokenStore;
use crate::credential::{AuthConfig, AuthEvent, AuthState, Credentials};
use crate::error::AuthError;
use crate::transport::build_http_client;

const MISSING_TOKENS: &str = "token response is missing access_token or refresh_token";

/// Mutable token state. Only the login and refresh paths write it.
struct SessionTokens {
    state: AuthState,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: u64,
    token_type: String,
    /// Bumped on every token update; keys the single-flight refresh.
    generation: u64,
}

impl SessionTokens {
    fn apply(&mut self, set: &TokenSet) {
        self.access_token = Some(set.access_token.clone());
        self.refresh_token = Some(set.refresh_token.clone());
        self.expires_in = set.expires_in;
        self.token_type = set.token_type.clone();
        self.state = AuthState::Authenticated;
        self.generation += 1;
    }

    fn current(&self) -> Option<TokenSet> {
        Some(TokenSet {
            access_token: self.access_token.clone()?,
            refresh_token: self.refresh_token.clone()?,
            expires_in: self.expires_in,
            token_type: self.token_type.clone(),
        })
    }
}

/// Owns the OAuth exchanges and the current token set.
pub struct AuthSession {
    config: AuthConfig,
    http: reqwest::Client,
    store: Arc<dyn TokenStore>,
    tokens: RwLock<SessionTokens>,
    /// Serializes refreshes so concurrent expiries share one token request.
    refresh_gate: Mutex<()>,
    /// Held for the whole interactive login; one callback listener at a time.
    login_gate: Mutex<()>,
    event_tx: broadcast::Sender<AuthEvent>,
}

impl AuthSession {
    pub fn new(config: AuthConfig, store: Arc<dyn TokenStore>) -> Result<Arc<Self>, AuthError> {
        let http = build_http_client(config.http_timeout).map_err(AuthError::Transport)?;
        Ok(Self::with_http_client(config, store, http))
    }

    pub fn with_http_client(
        config: AuthConfig,
        store: Arc<dyn TokenStore>,
        http: reqwest::Client,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(16);
        Arc::new(Self {
            config,
            http,
            store,
            tokens: RwLock::new(SessionTokens {
                state: AuthState::Unauthenticated,
                access_token: None,
                refresh_token: None,
                expires_in: 0,
                token_type: String::new(),
                generation: 0,
            }),
            refresh_gate: Mutex::new(()),
            login_gate: Mutex::new(()),
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.event_tx.subscribe()
    }

    pub async fn state(&self) -> AuthState {
        self.tokens.read().await.state
    }

    /// Current access token and the generation it belongs to.
    pub async fn access_token(&self) -> Option<(String, u64)> {
        let tokens = self.tokens.read().await;
        tokens.access_token.clone().map(|t| (t, tokens.generation))
    }

    pub async fn token_generation(&self) -> u64 {
        self.tokens.read().await.generation
    }

    /// Seed a refresh token obtained elsewhere (e.g. from storage).
    pub async fn set_refresh_token(&self, refresh_token: String) {
        self.tokens.write().await.refresh_token = Some(refresh_token);
    }

    /// Reach `Authenticated`: silent refresh from the stored refresh token,
    /// interactive login when there is none or it was rejected.
    pub async fn authenticate(&self) -> Result<TokenSet, AuthError> {
        let stored = self.store.load();
        match stored.refresh_token.filter(|t| !t.is_empty()) {
            Some(refresh_token) => {
                info!("found refresh token in storage");
                self.set_refresh_token(refresh_token).await;
                match self.refresh().await {
                    Ok(set) => return Ok(set),
                    Err(e) => warn!(err = %e, "stored refresh token unusable, starting interactive login"),
                }
            }
            None => info!("no stored refresh token, starting interactive login"),
        }
        self.start_interactive_login().await
    }

    /// Run the browser-based authorization-code + PKCE flow.
    ///
    /// A fresh verifier/challenge pair is generated on every call. The new
    /// refresh token is persisted on success.
    pub async fn start_interactive_login(&self) -> Result<TokenSet, AuthError> {
        let _login = self.login_gate.lock().await;
        info!("starting interactive authentication");

        let pkce = PkcePair::generate();
        let host = match self.config.redirect_host {
            Some(ip) => ip,
            None => discover_local_ip().await,
        };
        let mut listener = CallbackListener::start(host, self.config.callback_port).await?;
        let credentials = Credentials {
            client_id: self.config.client_id.clone(),
            redirect_uri: format!("http://{}", listener.local_addr()),
        };
        debug!(redirect_uri = %credentials.redirect_uri, "using redirect URI");

        let auth_url = build_auth_url(
            &self.config.authorize_url,
            &credentials.client_id,
            &credentials.redirect_uri,
            &pkce.code_challenge,
        );
        self.tokens.write().await.state = AuthState::AwaitingUserCode;
        info!(auth_url = %auth_url, "open this URL in a browser to authenticate");
        let _ = self.event_tx.send(AuthEvent::LoginRequired {
            auth_url: auth_url.clone(),
            redirect_uri: credentials.redirect_uri.clone(),
        });

        let result = match listener.wait_for_code(self.config.login_timeout).await {
            Ok(code) => self.exchange_code(&credentials, &pkce, &code).await,
            Err(e) => Err(e),
        };

        let set = match result {
            Ok(set) => set,
            Err(e) => {
                self.tokens.write().await.state = AuthState::Unauthenticated;
                error!(err = %e, auth_url = %auth_url, "authentication failed, re-authenticate with a new login");
                return Err(e);
            }
        };

        self.tokens.write().await.apply(&set);
        self.persist_refresh_token(&set.refresh_token);
        let _ = self.event_tx.send(AuthEvent::Authenticated);
        info!("authentication successful");
        Ok(set)
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh(&self) -> Result<TokenSet, AuthError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Refresh unless another caller already did since `observed_generation`.
    ///
    /// Concurrent callers that saw the same expired token queue on the gate;
    /// the first one refreshes and the rest reuse its result.
    pub async fn refresh_after(&self, observed_generation: u64) -> Result<TokenSet, AuthError> {
        let _gate = self.refresh_gate.lock().await;
        {
            let tokens = self.tokens.read().await;
            if tokens.generation != observed_generation {
                if let Some(set) = tokens.current() {
                    debug!("token already refreshed by a concurrent caller");
                    return Ok(set);
                }
            }
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<TokenSet, AuthError> {
        let refresh_token =
            self.tokens.read().await.refresh_token.clone().ok_or(AuthError::NoRefreshToken)?;

        debug!("refreshing authorization");
        match self.request_refresh(&refresh_token).await {
            Ok((set, rotated)) => {
                self.tokens.write().await.apply(&set);
                if rotated {
                    self.persist_refresh_token(&set.refresh_token);
                }
                let _ = self.event_tx.send(AuthEvent::Refreshed);
                info!("successfully refreshed authorization");
                Ok(set)
            }
            Err(e) => {
                error!(err = %e, "error refreshing authorization");
                let _ = self.event_tx.send(AuthEvent::RefreshFailed { error: e.to_string() });
                Err(e)
            }
        }
    }

    /// POST the refresh grant. Returns the new set and whether the provider
    /// sent a refresh token along with it.
    async fn request_refresh(&self, refresh_token: &str) -> Result<(TokenSet, bool), AuthError> {
        let timeout = self.config.http_timeout;
        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AuthError::transport(e, "token refresh", timeout))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| AuthError::transport(e, "token refresh", timeout))?;
        if !status.is_success() {
            return Err(AuthError::Refresh { status, body });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        let rotated = token.refresh_token.is_some();
        let set = TokenSet::from_response(token, Some(refresh_token))
            .ok_or_else(|| AuthError::Refresh { status, body: MISSING_TOKENS.to_owned() })?;
        Ok((set, rotated))
    }

    async fn exchange_code(
        &self,
        credentials: &Credentials,
        pkce: &PkcePair,
        code: &str,
    ) -> Result<TokenSet, AuthError> {
        debug!("exchanging authorization code for access token");
        let timeout = self.config.http_timeout;
        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("redirect_uri", credentials.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
                ("code_verifier", pkce.code_verifier.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AuthError::transport(e, "code exchange", timeout))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| AuthError::transport(e, "code exchange", timeout))?;
        if !status.is_success() {
            return Err(AuthError::Exchange { status, body });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        TokenSet::from_response(token, None)
            .ok_or_else(|| AuthError::Exchange { status, body: MISSING_TOKENS.to_owned() })
    }

    fn persist_refresh_token(&self, refresh_token: &str) {
        let mut storage = self.store.load();
        storage.refresh_token = Some(refresh_token.to_owned());
        self.store.save(&storage);
    }
}

/// The host's outbound IPv4 address, falling back to loopback.
async fn discover_local_ip() -> IpAddr {
    match outbound_ipv4().await {
        Ok(ip) => ip,
        Err(e) => {
            warn!(err = %e, "could not discover local IPv4 address, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// Connecting a UDP socket selects a route without sending anything.
async fn outbound_ipv4() -> std::io::Result<IpAddr> {
    let socket = tokio::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).await?;
    Ok(socket.local_addr()?.ip())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
