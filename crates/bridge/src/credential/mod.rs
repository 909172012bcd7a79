// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth2 authorization-code + PKCE login, token refresh and persistence.
//!
//! [`session::AuthSession`] owns the tokens. It restores a refresh token from
//! the [`store::TokenStore`] on startup and falls back to an interactive
//! browser login, captured by a [`callback::CallbackListener`], when that
//! does not work.

pub mod callback;
pub mod oauth;
pub mod pkce;
pub mod session;
pub mod store;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Callback port registered with the identity provider.
pub const DEFAULT_CALLBACK_PORT: u16 = 4200;

/// Default identity provider base URL.
pub const DEFAULT_IAM_URL: &str = "https://iam.viessmann-climatesolutions.com/idp/v3";

/// Client identity for one login. `redirect_uri` depends on the bound callback address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub redirect_uri: String,
}

/// Settings consumed by [`session::AuthSession`].
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Host for the callback listener. Discovered when unset.
    pub redirect_host: Option<std::net::IpAddr>,
    pub callback_port: u16,
    /// How long to wait for the browser redirect.
    pub login_timeout: Duration,
    /// Timeout applied to each token endpoint request.
    pub http_timeout: Duration,
}

impl AuthConfig {
    /// Config with `/authorize` and `/token` derived from the provider base URL.
    pub fn new(client_id: impl Into<String>, iam_url: &str) -> Self {
        let base = iam_url.trim_end_matches('/');
        Self {
            client_id: client_id.into(),
            authorize_url: format!("{base}/authorize"),
            token_url: format!("{base}/token"),
            redirect_host: None,
            callback_port: DEFAULT_CALLBACK_PORT,
            login_timeout: Duration::from_secs(300),
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// Lifecycle of an [`session::AuthSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    AwaitingUserCode,
    Authenticated,
}

/// Events emitted by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    /// The operator must open `auth_url`; the listener is already bound.
    LoginRequired { auth_url: String, redirect_uri: String },
    /// Interactive login completed.
    Authenticated,
    /// The access token was renewed with the refresh token.
    Refreshed,
    #[serde(rename = "refresh:failed")]
    RefreshFailed { error: String },
}

/// Resolve the state directory for bridge data.
///
/// Checks `VICARE_STATE_DIR`, then `$XDG_STATE_HOME/vicare-bridge`,
/// then `$HOME/.local/state/vicare-bridge`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VICARE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("vicare-bridge");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/vicare-bridge");
    }
    PathBuf::from(".vicare-bridge")
}
