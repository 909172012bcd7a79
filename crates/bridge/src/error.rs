// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use reqwest::StatusCode;

/// Errors raised by the authentication layer and the authorized request path.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The identity provider rejected the authorization-code exchange.
    #[error("authorization code exchange failed ({status}): {body}")]
    Exchange { status: StatusCode, body: String },

    /// The identity provider rejected the refresh-token exchange.
    #[error("token refresh failed ({status}): {body}")]
    Refresh { status: StatusCode, body: String },

    /// Every attempt of one logical call came back with an expired token.
    #[error("could not refresh authentication token after {attempts} attempts")]
    RefreshExhausted { attempts: u32 },

    /// An authorized call was issued before any access token existed.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A refresh was requested before any refresh token was known.
    #[error("refresh token is not set, interactive login required")]
    NoRefreshToken,

    /// The provider redirected back with an `error` instead of a `code`.
    #[error("authorization denied: {0}")]
    Denied(String),

    #[error("{what} timed out after {}s", after.as_secs())]
    Timeout { what: &'static str, after: Duration },

    /// Binding or serving the local callback listener failed.
    #[error("callback listener on {addr}: {source}")]
    Listener {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("malformed token response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AuthError {
    /// Classify a `reqwest` failure, separating timeouts from other transport errors.
    pub fn transport(err: reqwest::Error, what: &'static str, after: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout { what, after }
        } else {
            Self::Transport(err)
        }
    }
}

/// Failures reading the persisted token file. Always recovered by the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Failures talking to the resource API about installations and devices.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The API answered with a non-2xx status.
    #[error("{what} failed ({status}): {body}")]
    Api { what: &'static str, status: StatusCode, body: String },

    #[error("no installation data available")]
    NoInstallation,

    #[error("no gateway data available")]
    NoGateway,

    /// The feature body lacks the property the caller asked for.
    #[error("unexpected response structure for {feature}: {body}")]
    UnexpectedStructure { feature: String, body: String },

    #[error("malformed API response: {0}")]
    Decode(#[from] serde_json::Error),
}
