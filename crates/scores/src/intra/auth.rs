//! 42 Intra OAuth2 token lifecycle
//!
//! Keeps the current bearer token, its expiry, and the refresh
//! credential behind a single mutex. The mutex is held across the
//! refresh request, which gives the single-flight guarantee: concurrent
//! callers around expiry block on the lock and reuse the refreshed
//! token instead of issuing duplicate refreshes.
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use std::sync::Mutex;

use chrono::Utc;
use ureq::Agent;

use super::api::TokenResponse;
use crate::config::ApiConfig;
use crate::error::SyncError;

/// Seconds before expiry at which a token is treated as stale.
const EXPIRY_GRACE_SECS: i64 = 30;

/// Current access token, its expiry, and the refresh credential.
///
/// Invariant: `expires_at` always describes the token in
/// `access_token`; the pair is only ever updated together.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: String,
    /// Unix timestamp; 0 when no token has been obtained yet
    pub expires_at: i64,
}

/// OAuth2 token manager for the 42 Intra API.
pub struct TokenManager {
    agent: Agent,
    api_root: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    state: Mutex<Credential>,
}

impl TokenManager {
    /// Create a token manager seeded with the configured refresh
    /// credential. No token is fetched until the first `ensure_token`.
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            agent: super::build_agent(),
            api_root: config.api_root.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            state: Mutex::new(Credential {
                access_token: None,
                refresh_token: config.refresh_token.clone(),
                expires_at: 0,
            }),
        }
    }

    /// Build the upstream authorization URL for interactive bootstrap.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/oauth/authorize?client_id={}&redirect_uri={}&response_type=code",
            self.api_root,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
        )
    }

    /// Install a caller-provided access token valid for `ttl_secs`.
    ///
    /// Used for the optional pre-seeded config token. A zero TTL means
    /// the token is stale on the next `ensure_token` check.
    pub fn seed_access_token(&self, token: impl Into<String>, ttl_secs: i64) {
        let mut cred = self.state.lock().unwrap();
        cred.access_token = Some(token.into());
        cred.expires_at = Utc::now().timestamp() + ttl_secs;
    }

    /// Return a bearer token valid for at least the grace window,
    /// refreshing it first when absent or about to expire.
    ///
    /// Never leaves a half-updated credential behind: on refresh
    /// failure the cached state is untouched and the error carries the
    /// upstream status and body.
    pub fn ensure_token(&self) -> Result<String, SyncError> {
        let mut cred = self.state.lock().unwrap();

        let now = Utc::now().timestamp();
        if let Some(token) = &cred.access_token {
            if now < cred.expires_at - EXPIRY_GRACE_SECS {
                return Ok(token.clone());
            }
        }

        let refresh_token = cred.refresh_token.clone();
        let response = self.refresh(&refresh_token)?;
        Ok(apply_token_response(&mut cred, response, now))
    }

    /// One-time authorization-code exchange; seeds the credential store.
    ///
    /// Not part of the sync hot path - used by the auth bootstrap
    /// endpoints only. Returns a snapshot of the seeded credential.
    pub fn exchange_code(&self, code: &str) -> Result<Credential, SyncError> {
        let response = self.token_request(vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])?;

        let mut cred = self.state.lock().unwrap();
        let now = Utc::now().timestamp();
        apply_token_response(&mut cred, response, now);
        Ok(cred.clone())
    }

    /// Snapshot of the current credential, for diagnostics.
    pub fn credential(&self) -> Credential {
        self.state.lock().unwrap().clone()
    }

    /// Refresh-token grant against the upstream token endpoint.
    fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, SyncError> {
        self.token_request(vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])
    }

    fn token_request(&self, form: Vec<(&str, &str)>) -> Result<TokenResponse, SyncError> {
        let url = format!("{}/oauth/token", self.api_root);

        let mut response = self
            .agent
            .post(&url)
            .send_form(form)
            .map_err(|e| SyncError::auth(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(SyncError::auth(Some(status.as_u16()), body));
        }

        response
            .body_mut()
            .read_json()
            .map_err(|e| SyncError::auth(None, format!("invalid token response: {}", e)))
    }
}

/// Apply a token response to the credential store and return the new
/// access token. Caller holds the state lock.
fn apply_token_response(cred: &mut Credential, response: TokenResponse, now: i64) -> String {
    cred.access_token = Some(response.access_token.clone());
    cred.expires_at = now + response.expires_in.unwrap_or(0) as i64;

    if let Some(rotated) = response.refresh_token {
        if rotated != cred.refresh_token {
            // The process keeps working with the rotated credential, but a
            // restart loses it. Persisting it is an operator responsibility.
            log::warn!(
                "upstream rotated the refresh token; update your secrets storage \
                 or the session will not survive a restart"
            );
            cred.refresh_token = rotated;
        }
    }

    response.access_token
}
