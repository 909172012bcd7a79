// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Short-lived local HTTP listener that receives the OAuth redirect.
//!
//! Any path is accepted; only the `code` (or `error`) query parameter matters.
//! The listener resolves at most once and always releases its port before
//! [`CallbackListener::wait_for_code`] returns.

use std::collections::HashMap;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::AuthError;

type CodeSender = oneshot::Sender<Result<String, String>>;

#[derive(Clone)]
struct CallbackState {
    tx: Arc<Mutex<Option<CodeSender>>>,
}

/// A bound callback listener in the `Listening` state.
pub struct CallbackListener {
    local_addr: SocketAddr,
    code_rx: oneshot::Receiver<Result<String, String>>,
    shutdown: CancellationToken,
    server: Option<JoinHandle<std::io::Result<()>>>,
}

impl CallbackListener {
    /// Bind the listener and start serving. Port 0 picks an ephemeral port.
    pub async fn start(bind: IpAddr, port: u16) -> Result<Self, AuthError> {
        let addr = SocketAddr::new(bind, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AuthError::Listener { addr: addr.to_string(), source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| AuthError::Listener { addr: addr.to_string(), source })?;

        let (tx, code_rx) = oneshot::channel();
        let state = CallbackState { tx: Arc::new(Mutex::new(Some(tx))) };
        let router = Router::new().fallback(handle_callback).with_state(state);

        let shutdown = CancellationToken::new();
        let server = tokio::spawn(
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.clone().cancelled_owned())
                .into_future(),
        );

        debug!(%local_addr, "callback listener started");
        Ok(Self { local_addr, code_rx, shutdown, server: Some(server) })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the redirect carrying the authorization code, then close.
    pub async fn wait_for_code(&mut self, timeout: Duration) -> Result<String, AuthError> {
        let outcome = tokio::time::timeout(timeout, &mut self.code_rx).await;
        self.close().await;

        match outcome {
            Err(_) => Err(AuthError::Timeout { what: "authorization callback", after: timeout }),
            Ok(Err(_)) => Err(AuthError::Listener {
                addr: self.local_addr.to_string(),
                source: std::io::Error::other("listener stopped before a code arrived"),
            }),
            Ok(Ok(Ok(code))) => Ok(code),
            Ok(Ok(Err(reason))) => Err(AuthError::Denied(reason)),
        }
    }

    /// Stop serving and wait until the socket is released.
    pub async fn close(&mut self) {
        self.shutdown.cancel();
        let Some(server) = self.server.take() else {
            return;
        };
        match server.await {
            Ok(Ok(())) => debug!(local_addr = %self.local_addr, "callback listener closed"),
            Ok(Err(e)) => warn!(err = %e, "callback listener exited with error"),
            Err(e) => warn!(err = %e, "callback listener task failed"),
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    headers: HeaderMap,
    uri: Uri,
) -> (StatusCode, &'static str) {
    if !headers.contains_key(header::HOST) {
        error!("invalid callback request, missing host header");
        return (StatusCode::BAD_REQUEST, "Invalid request.");
    }
    let params = Query::<HashMap<String, String>>::try_from_uri(&uri)
        .map(|q| q.0)
        .unwrap_or_default();

    let outcome = if let Some(code) = params.get("code").filter(|c| !c.is_empty()) {
        debug!("received authorization code");
        Ok(code.clone())
    } else if let Some(err) = params.get("error") {
        let description = params.get("error_description").map(String::as_str).unwrap_or("");
        warn!(error = %err, description, "authorization request was denied");
        Err(format!("{err} {description}").trim_end().to_owned())
    } else {
        return (StatusCode::BAD_REQUEST, "Authorization code not found.");
    };

    let tx = state.tx.lock().ok().and_then(|mut guard| guard.take());
    let Some(tx) = tx else {
        return (StatusCode::GONE, "Authorization already completed.");
    };
    let ok = outcome.is_ok();
    let _ = tx.send(outcome);
    if ok {
        (StatusCode::OK, "Authorization successful. You can close this window.")
    } else {
        (StatusCode::BAD_REQUEST, "Authorization was denied.")
    }
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
