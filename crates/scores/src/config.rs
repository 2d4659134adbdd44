//! Configuration loading for the sync service
//!
//! Supports loading API credentials from (in order of priority):
//! 1. JSON file (~/.config/relay/intra-credentials.json)
//! 2. Runtime environment variables
//!
//! Client id, client secret, and the refresh token are mandatory; the
//! service refuses to start without them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Credentials filename in the relay config directory
const CREDENTIALS_FILE: &str = "intra-credentials.json";

/// Default upstream API root
pub const DEFAULT_API_ROOT: &str = "https://api.intra.42.fr";

const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/callback";

/// API access configuration for the 42 Intra API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_root: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: String,
    /// Optional pre-seeded access token, used until its first expiry check
    pub access_token: Option<String>,
}

/// Credential file format
#[derive(Deserialize)]
struct CredentialFile {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    api_root: Option<String>,
    redirect_uri: Option<String>,
    access_token: Option<String>,
}

impl ApiConfig {
    /// Load configuration using the following priority:
    /// 1. JSON file (~/.config/relay/intra-credentials.json)
    /// 2. Runtime environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(CREDENTIALS_FILE) {
            let file: CredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Ok(Self::from_credential_file(file));
        }

        Self::from_env()
    }

    /// Load configuration from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file: CredentialFile = config::load_json_file(path)?;
        Ok(Self::from_credential_file(file))
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Ok(Self::from_credential_file(file))
    }

    fn from_credential_file(file: CredentialFile) -> Self {
        Self {
            api_root: file.api_root.unwrap_or_else(|| DEFAULT_API_ROOT.to_string()),
            client_id: file.client_id,
            client_secret: file.client_secret,
            redirect_uri: file
                .redirect_uri
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            refresh_token: file.refresh_token,
            access_token: file.access_token,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// CLIENT_ID, CLIENT_SECRET, and REFRESH_TOKEN are required;
    /// API_ROOT, REDIRECT_URI, and ACCESS_TOKEN are optional.
    pub fn from_env() -> Result<Self> {
        let client_id =
            std::env::var("CLIENT_ID").context("CLIENT_ID environment variable not set")?;
        let client_secret =
            std::env::var("CLIENT_SECRET").context("CLIENT_SECRET environment variable not set")?;
        let refresh_token =
            std::env::var("REFRESH_TOKEN").context("REFRESH_TOKEN environment variable not set")?;

        Ok(Self {
            api_root: std::env::var("API_ROOT").unwrap_or_else(|_| DEFAULT_API_ROOT.to_string()),
            client_id,
            client_secret,
            redirect_uri: std::env::var("REDIRECT_URI")
                .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string()),
            refresh_token,
            access_token: std::env::var("ACCESS_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }
}
