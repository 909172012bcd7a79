// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vicare-bridge: OAuth2 + PKCE client for the ViCare cloud API that keeps a
//! session alive and polls configured heating devices.

pub mod config;
pub mod credential;
pub mod device;
pub mod error;
pub mod test_support;
pub mod transport;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::BridgeConfig;
use crate::credential::session::AuthSession;
use crate::credential::store::FileTokenStore;
use crate::device::poll::spawn_poller;
use crate::device::{load_devices, DeviceDirectory};
use crate::transport::{build_http_client, AuthorizedRequestClient};

/// Authenticate, discover the installation, and poll devices until Ctrl-C.
pub async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let store = Arc::new(FileTokenStore::new(config.storage_path()));
    info!(path = %store.path().display(), "using token storage");
    let session = AuthSession::new(config.auth_config(), store).context("building HTTP client")?;

    session.authenticate().await.context("authentication failed")?;

    let client = AuthorizedRequestClient::new(
        Arc::clone(&session),
        build_http_client(config.http_timeout()).context("building HTTP client")?,
        config.http_timeout(),
    );
    let directory = DeviceDirectory::discover(client, &config.api_endpoint)
        .await
        .context("retrieving installation and gateway")?;
    directory.smart_components().await.context("retrieving smart components")?;

    let devices = match config.devices {
        Some(ref path) => load_devices(path)?,
        None => Vec::new(),
    };
    info!(count = devices.len(), "polling devices every {:?}", config.poll_interval());
    let poller = spawn_poller(directory, devices, config.poll_interval(), shutdown.clone());

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutting down");
    shutdown.cancel();
    poller.await?;
    Ok(())
}
