//! 42 Intra API integration
//!
//! This module provides:
//! - OAuth2 token lifecycle (proactive refresh, code exchange)
//! - Paginated API client with rate-limit backoff

mod auth;
mod client;

pub use auth::{Credential, TokenManager};
pub use client::{FetchResult, IntraClient, PageCursor, PageTotals, RetryPolicy, DEFAULT_PAGE_SIZE};

use std::time::Duration;
use ureq::Agent;

/// Per-call network timeout. Runs as a whole are not bounded.
const CALL_TIMEOUT_SECS: u64 = 30;

/// Build the HTTP agent shared by auth and client requests.
///
/// Non-2xx responses are returned as responses rather than errors so
/// the upstream status, headers (Retry-After), and body stay readable.
pub(crate) fn build_agent() -> Agent {
    Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(CALL_TIMEOUT_SECS)))
        .http_status_as_error(false)
        .build()
        .new_agent()
}

/// 42 Intra API response types
pub mod api {
    use serde::Deserialize;

    /// Response from the OAuth token endpoint
    #[derive(Debug, Deserialize)]
    pub struct TokenResponse {
        pub access_token: String,
        /// Present when the server rotates the refresh credential
        pub refresh_token: Option<String>,
        /// Seconds until expiry; absent means stale on the next check
        pub expires_in: Option<u64>,
        #[allow(dead_code)]
        pub token_type: Option<String>,
    }
}
