//! OAuth2 client-credentials token acquisition with single-flight
//! deduplication: while a token fetch is in flight, concurrent callers await
//! that same fetch instead of issuing their own.

use crate::config::Credential;
use crate::error::TraError;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

const TOKEN_URL: &str = "https://tdx.transportdata.tw/auth/realms/TDXConnect/protocol/openid-connect/token";
const SAFETY_BUFFER_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub access_token: String,
    pub expires_at: i64,
}

impl Token {
    fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms + SAFETY_BUFFER_MS <= self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

type TokenFuture = Shared<BoxFuture<'static, Result<Token, TraError>>>;

/// Acquires and caches a bearer token for one credential.
///
/// Cheap to clone: the cached token and in-flight future live behind a
/// shared, internally-locked state.
#[derive(Clone)]
pub struct AuthService {
    client: reqwest::Client,
    credential: Arc<Credential>,
    token_url: Arc<str>,
    cached: Arc<std::sync::Mutex<Option<Token>>>,
    in_flight: Arc<Mutex<Option<TokenFuture>>>,
}

impl AuthService {
    pub fn new(client: reqwest::Client, credential: Credential) -> Self {
        Self::with_token_url(client, credential, TOKEN_URL.to_string())
    }

    /// Same as [`Self::new`] but pointed at an arbitrary token endpoint.
    /// Used in tests to substitute a local mock server for the fixed TDX
    /// realm URL.
    pub fn with_token_url(client: reqwest::Client, credential: Credential, token_url: String) -> Self {
        Self {
            client,
            credential: Arc::new(credential),
            token_url: token_url.into(),
            cached: Arc::new(std::sync::Mutex::new(None)),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// `true` if a cached token exists and has at least `safety_buffer_ms`
    /// of validity left.
    pub fn is_token_valid(&self) -> bool {
        let cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        cached
            .as_ref()
            .map(|t| t.is_valid_at(now_ms()))
            .unwrap_or(false)
    }

    pub fn clear_cache(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Returns a valid access token, fetching one if necessary. Concurrent
    /// callers with no valid cached token share exactly one outbound HTTP
    /// request: the first caller installs the in-flight future, all others
    /// await the same `Shared` clone, and it is cleared once the request
    /// completes, whether it succeeded or failed.
    pub async fn get_token(&self) -> Result<String, TraError> {
        if let Some(token) = self.cached.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            if token.is_valid_at(now_ms()) {
                return Ok(token.access_token);
            }
        }

        let fut = {
            let mut guard = self.in_flight.lock().await;
            if let Some(existing) = guard.as_ref() {
                existing.clone()
            } else {
                let installed = self.clone().fetch_and_cache().boxed().shared();
                *guard = Some(installed.clone());
                installed
            }
        };

        let result = fut.await;

        {
            let mut guard = self.in_flight.lock().await;
            // Only the request we awaited clears the slot; a newer in-flight
            // request installed after we started must not be dropped.
            if guard.as_ref().map(|f| f.ptr_eq(&fut)).unwrap_or(false) {
                *guard = None;
            }
        }

        result.map(|t| t.access_token)
    }

    async fn fetch_and_cache(self) -> Result<Token, TraError> {
        let response = self
            .client
            .post(self.token_url.as_ref())
            .header("content-type", "application/x-www-form-urlencoded")
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credential.client_id.as_str()),
                ("client_secret", self.credential.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|err| TraError::AuthError {
                message: format!("token request failed: {err}"),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(TraError::AuthError {
                message: format!("token endpoint returned HTTP {status}"),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|err| TraError::AuthError {
            message: format!("token response decode failed: {err}"),
        })?;

        let token = Token {
            access_token: body.access_token,
            expires_at: now_ms() + body.expires_in * 1000 - SAFETY_BUFFER_MS,
        };

        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        Ok(token)
    }
}
