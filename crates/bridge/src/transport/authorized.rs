// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-authorized requests with transparent refresh on token expiry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Method;
use tracing::{debug, info};

use crate::credential::session::AuthSession;
use crate::error::AuthError;
use crate::transport::ApiResponse;

/// Upper bound on requests issued for one logical call.
pub const MAX_ATTEMPTS: u32 = 3;

/// `error` value the resource API uses to signal an expired access token.
pub const EXPIRED_TOKEN: &str = "EXPIRED TOKEN";

/// Caller-supplied request options. `Authorization` is always owned by the client.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub headers: HeaderMap,
    pub json: Option<serde_json::Value>,
}

impl RequestConfig {
    pub fn json(body: serde_json::Value) -> Self {
        Self { json: Some(body), ..Default::default() }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Performs resource-API calls through an [`AuthSession`].
#[derive(Clone)]
pub struct AuthorizedRequestClient {
    http: reqwest::Client,
    session: Arc<AuthSession>,
    timeout: Duration,
}

impl AuthorizedRequestClient {
    pub fn new(session: Arc<AuthSession>, http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, session, timeout }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub async fn get(&self, url: &str) -> Result<ApiResponse, AuthError> {
        self.call(Method::GET, url, RequestConfig::default()).await
    }

    /// Issue `method url` with the current access token.
    ///
    /// Any response other than the expired-token signal is returned as-is,
    /// including non-2xx ones. On expiry the session refreshes and the call
    /// is retried, at most [`MAX_ATTEMPTS`] requests in total.
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<ApiResponse, AuthError> {
        for attempt in 0..MAX_ATTEMPTS {
            let (token, generation) =
                self.session.access_token().await.ok_or(AuthError::NotAuthenticated)?;
            debug!(%method, url, attempt, "authorized request");

            let response = self.send(&method, url, &config, &token).await?;
            if !response.is_expired_token() {
                return Ok(response);
            }

            info!(url, attempt, "access token expired");
            if attempt + 1 < MAX_ATTEMPTS {
                self.session.refresh_after(generation).await?;
            }
        }

        Err(AuthError::RefreshExhausted { attempts: MAX_ATTEMPTS })
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        config: &RequestConfig,
        token: &str,
    ) -> Result<ApiResponse, AuthError> {
        let mut headers = config.headers.clone();
        headers.remove(AUTHORIZATION);
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }

        let mut req = self.http.request(method.clone(), url).headers(headers).bearer_auth(token);
        if let Some(ref body) = config.json {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| AuthError::transport(e, "API request", self.timeout))?;
        ApiResponse::read(resp).await.map_err(|e| AuthError::transport(e, "API request", self.timeout))
    }
}

#[cfg(test)]
#[path = "authorized_tests.rs"]
mod tests;
