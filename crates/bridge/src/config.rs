// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::credential::{state_dir, AuthConfig, DEFAULT_CALLBACK_PORT, DEFAULT_IAM_URL};

/// Default resource API base URL.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.viessmann-climatesolutions.com/iot/v2";

/// Configuration for the vicare-bridge daemon.
#[derive(Debug, Clone, Parser)]
#[command(name = "vicare-bridge", version, about = "Poll ViCare heating devices over OAuth2")]
pub struct BridgeConfig {
    /// OAuth client id registered with the identity provider.
    #[arg(long, env = "VICARE_CLIENT_ID")]
    pub client_id: String,

    /// Resource API base URL.
    #[arg(long, default_value = DEFAULT_API_ENDPOINT, env = "VICARE_API_ENDPOINT")]
    pub api_endpoint: String,

    /// Identity provider base URL (`/authorize` and `/token` are appended).
    #[arg(long, default_value = DEFAULT_IAM_URL, env = "VICARE_IAM_URL")]
    pub iam_url: String,

    /// Host for the login redirect. Discovered from the outbound route if unset.
    #[arg(long, env = "VICARE_HOST_IP")]
    pub host_ip: Option<IpAddr>,

    /// Port for the login redirect listener.
    #[arg(long, default_value_t = DEFAULT_CALLBACK_PORT, env = "VICARE_CALLBACK_PORT")]
    pub callback_port: u16,

    /// Token storage file. Defaults to `vicare-settings.json` in the state directory.
    #[arg(long, env = "VICARE_STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,

    /// JSON file listing the devices to poll.
    #[arg(long, env = "VICARE_DEVICES")]
    pub devices: Option<PathBuf>,

    /// Device poll interval in milliseconds.
    #[arg(
        long,
        default_value_t = 60_000,
        env = "VICARE_POLL_INTERVAL_MS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = 30, env = "VICARE_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: u64,

    /// How long to wait for the browser login, in seconds.
    #[arg(long, default_value_t = 300, env = "VICARE_LOGIN_TIMEOUT_SECS")]
    pub login_timeout_secs: u64,

    /// Log format (text or json).
    #[arg(long, default_value = "text", env = "VICARE_LOG_FORMAT")]
    pub log_format: String,

    /// Log level filter.
    #[arg(long, default_value = "info", env = "VICARE_LOG_LEVEL")]
    pub log_level: String,
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_path.clone().unwrap_or_else(|| state_dir().join("vicare-settings.json"))
    }

    /// Settings for the authentication session.
    pub fn auth_config(&self) -> AuthConfig {
        let mut auth = AuthConfig::new(self.client_id.clone(), &self.iam_url);
        auth.redirect_host = self.host_ip;
        auth.callback_port = self.callback_port;
        auth.login_timeout = self.login_timeout();
        auth.http_timeout = self.http_timeout();
        auth
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
