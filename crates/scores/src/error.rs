//! Error taxonomy for the sync core
//!
//! Every failure surfaced by the token manager, the paginated fetcher,
//! the storage layer, or the sync engine is one of these four kinds.
//! The HTTP façade maps them to structured error envelopes.

use thiserror::Error;

/// Errors produced by the sync core.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Token refresh or authorization-code exchange failed.
    #[error("authentication failed: {detail}")]
    Auth { status: Option<u16>, detail: String },

    /// A page fetch returned a non-2xx response or exhausted its
    /// rate-limit retry budget.
    #[error("fetch failed: {detail}")]
    Fetch { status: Option<u16>, detail: String },

    /// A storage transaction or connection failed. The transaction has
    /// already been rolled back when this surfaces.
    #[error("storage failed: {detail}")]
    Storage { detail: String },

    /// A request was rejected before any network or storage work.
    #[error("validation failed: {detail}")]
    Validation { detail: String },
}

impl SyncError {
    pub fn auth(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Auth {
            status,
            detail: detail.into(),
        }
    }

    pub fn fetch(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Fetch {
            status,
            detail: detail.into(),
        }
    }

    pub fn storage(detail: impl Into<String>) -> Self {
        Self::Storage {
            detail: detail.into(),
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation {
            detail: detail.into(),
        }
    }

    /// Machine-readable error kind for error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth_failed",
            Self::Fetch { .. } => "fetch_failed",
            Self::Storage { .. } => "db_failed",
            Self::Validation { .. } => "validation_failed",
        }
    }

    /// Upstream HTTP status when the failure carries one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }

    /// Best-available detail for error envelopes.
    pub fn detail(&self) -> &str {
        match self {
            Self::Auth { detail, .. }
            | Self::Fetch { detail, .. }
            | Self::Storage { detail }
            | Self::Validation { detail } => detail,
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::storage(err.to_string())
    }
}
