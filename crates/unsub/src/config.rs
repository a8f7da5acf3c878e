//! OAuth client credentials for the Gmail API
//!
//! Looked up, in order of priority:
//! 1. An explicit JSON file (`--credentials`)
//! 2. `~/.config/unsub/google-credentials.json`
//! 3. `./credentials.json`
//! 4. `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET` environment variables

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::ConfigError;

/// Credentials filename in the unsub config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Credentials file looked for in the working directory
const LOCAL_CREDENTIALS_FILE: &str = "credentials.json";

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Resolve credentials; fails with [`ConfigError::Credentials`] when none are found
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for path in Self::candidate_paths() {
            if path.is_file() {
                debug!("Loading Gmail credentials from {}", path.display());
                return Self::from_file(&path);
            }
        }

        Self::from_env().ok_or_else(|| {
            ConfigError::Credentials(format!(
                "no credentials file found (looked for ~/.config/unsub/{} and ./{}) \
                 and GMAIL_CLIENT_ID/GMAIL_CLIENT_SECRET are not set",
                CREDENTIALS_FILE, LOCAL_CREDENTIALS_FILE
            ))
            .into()
        })
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(p) = Self::default_credentials_path() {
            paths.push(p);
        }
        paths.push(PathBuf::from(LOCAL_CREDENTIALS_FILE));
        paths
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)
            .with_context(|| format!("Invalid credentials file {}", path.display()))?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Desktop clients use "installed", web clients "web"
        let section = creds.installed.or(creds.web).ok_or_else(|| {
            ConfigError::Credentials(
                "credentials file missing 'installed' or 'web' section".to_string(),
            )
        })?;

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Credentials from environment variables; both must be set and non-empty
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID").ok()?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET").ok()?;
        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }
        Some(Self {
            client_id,
            client_secret,
        })
    }

    /// `~/.config/unsub/google-credentials.json`
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}
