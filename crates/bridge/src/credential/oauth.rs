// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth wire types and authorize-URL construction.

use serde::{Deserialize, Serialize};

/// Scope requested from the identity provider. `offline_access` yields a refresh token.
pub const SCOPE: &str = "IoT User offline_access";

/// Token endpoint response body (2xx).
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Tokens held by an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

impl TokenSet {
    /// Build from a token response, keeping `previous_refresh` when the
    /// provider did not rotate the refresh token.
    pub fn from_response(resp: TokenResponse, previous_refresh: Option<&str>) -> Option<Self> {
        let refresh_token = resp.refresh_token.or_else(|| previous_refresh.map(str::to_owned))?;
        if resp.access_token.is_empty() || refresh_token.is_empty() {
            return None;
        }
        Some(Self {
            access_token: resp.access_token,
            refresh_token,
            expires_in: resp.expires_in,
            token_type: resp.token_type.unwrap_or_else(|| "Bearer".to_owned()),
        })
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Build the authorization URL the operator opens in a browser.
pub fn build_auth_url(
    authorize_url: &str,
    client_id: &str,
    redirect_uri: &str,
    code_challenge: &str,
) -> String {
    format!(
        "{authorize_url}?client_id={client_id}\
         &redirect_uri={redirect_uri}\
         &scope={scope}\
         &response_type=code\
         &code_challenge_method=S256\
         &code_challenge={code_challenge}",
        client_id = urlencoding(client_id),
        redirect_uri = urlencoding(redirect_uri),
        scope = urlencoding(SCOPE),
        code_challenge = urlencoding(code_challenge),
    )
}

/// Form-style encoding for URL query parameters (spaces as `+`).
fn urlencoding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0xf) as usize]));
            }
        }
    }
    out
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";
