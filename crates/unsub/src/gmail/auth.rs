//! Gmail OAuth2 authentication
//!
//! Authorization code flow with a loopback listener for the redirect.
//! Uses synchronous HTTP (ureq); callers on an async runtime go through
//! [`super::GmailMailbox`], which moves the work onto blocking threads.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use url::Url;

/// Token file in the unsub config directory
const TOKEN_FILE: &str = "gmail-tokens.json";

/// Seconds before expiry at which a token is treated as stale
const EXPIRY_BUFFER_SECS: i64 = 300;

/// OAuth2 configuration and token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
    /// Last token handed out, so concurrent fetches skip the disk read
    cached: Mutex<Option<StoredToken>>,
}

/// Stored token data
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl StoredToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at > chrono::Utc::now().timestamp() + EXPIRY_BUFFER_SECS)
    }
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

impl GmailAuth {
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Listing and reading messages is all the pipeline does
    const GMAIL_READONLY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.readonly";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Create a new GmailAuth instance storing tokens in the default location
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let token_path = Self::default_token_path()?;
        Ok(Self::with_token_path(client_id, client_secret, token_path))
    }

    pub fn with_token_path(client_id: String, client_secret: String, token_path: PathBuf) -> Self {
        Self {
            client_id,
            client_secret,
            token_path,
            cached: Mutex::new(None),
        }
    }

    /// `~/.config/unsub/gmail-tokens.json`
    pub fn default_token_path() -> Result<PathBuf> {
        config::config_path(TOKEN_FILE).context("Could not determine config directory")
    }

    /// Get a valid access token, refreshing or re-authenticating as needed
    pub fn get_access_token(&self) -> Result<String> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow::anyhow!("token cache lock poisoned"))?;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        if let Ok(token) = self.load_token() {
            if token.is_fresh() {
                let access = token.access_token.clone();
                *cached = Some(token);
                return Ok(access);
            }

            if let Some(refresh_token) = token.refresh_token {
                match self.refresh_access_token(&refresh_token) {
                    Ok(new_token) => {
                        let stored = self.save_token_response(&new_token)?;
                        *cached = Some(stored);
                        return Ok(new_token.access_token);
                    }
                    Err(e) => warn!("Token refresh failed, re-authenticating: {:#}", e),
                }
            }
        }

        let token = self.authorization_code_auth()?;
        let stored = self.save_token_response(&token)?;
        *cached = Some(stored);
        Ok(token.access_token)
    }

    /// Perform authorization code flow authentication
    fn authorization_code_auth(&self) -> Result<TokenResponse> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let auth_url = Url::parse_with_params(
            Self::AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", Self::GMAIL_READONLY_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .context("Failed to build authorization URL")?;

        info!("Gmail authentication required, opening browser");
        info!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(auth_url.as_str()) {
            warn!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        info!("Waiting for authorization on port {}...", port);
        let code = self.wait_for_callback(listener)?;

        debug!("Exchanging authorization code for tokens");
        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        info!("Gmail authentication successful");
        Ok(token)
    }

    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for OAuth callback and extract authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        let callback = parse_callback(&request_line);

        let (status, body) = if callback.code.is_some() {
            ("200 OK", "Authentication successful! You can close this window.")
        } else {
            ("400 Bad Request", "Authentication failed. Please try again.")
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = callback.error {
            anyhow::bail!("OAuth error: {}", err);
        }
        callback.code.context("No authorization code received")
    }

    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Google omits the refresh token on refresh
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    fn load_token(&self) -> Result<StoredToken> {
        let content = fs::read_to_string(&self.token_path)?;
        let token: StoredToken = serde_json::from_str(&content)?;
        Ok(token)
    }

    fn save_token_response(&self, token: &TokenResponse) -> Result<StoredToken> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };

        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.token_path, content)
            .with_context(|| format!("Failed to write {}", self.token_path.display()))?;
        Ok(stored)
    }
}

/// Delete stored tokens without needing client credentials
///
/// Returns whether a token file existed.
pub fn remove_token_file(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Callback {
    code: Option<String>,
    error: Option<String>,
}

/// Pull `code`/`error` out of a request line like `GET /?code=...&scope=... HTTP/1.1`
fn parse_callback(request_line: &str) -> Callback {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Callback::default();
    };
    let Ok(url) = Url::parse("http://localhost").and_then(|base| base.join(target)) else {
        return Callback::default();
    };

    let mut callback = Callback::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => callback.code = Some(value.into_owned()),
            "error" => callback.error = Some(value.into_owned()),
            _ => {}
        }
    }
    callback
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_callback_code() {
        let cb = parse_callback("GET /?code=4%2F0Aabc&scope=gmail.readonly HTTP/1.1\r\n");
        assert_eq!(cb.code.as_deref(), Some("4/0Aabc"));
        assert_eq!(cb.error, None);
    }

    #[test]
    fn test_parse_callback_error() {
        let cb = parse_callback("GET /?error=access_denied HTTP/1.1\r\n");
        assert_eq!(cb.code, None);
        assert_eq!(cb.error.as_deref(), Some("access_denied"));
    }

    #[test]
    fn test_parse_callback_garbage() {
        assert_eq!(parse_callback(""), Callback::default());
        assert_eq!(parse_callback("GET /favicon.ico HTTP/1.1"), Callback::default());
    }

    #[test]
    fn test_fresh_token_is_served_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TOKEN_FILE);
        let stored = StoredToken {
            access_token: "ya29.token".into(),
            refresh_token: None,
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        };
        fs::write(&path, serde_json::to_string(&stored).unwrap()).unwrap();

        let auth = GmailAuth::with_token_path("id".into(), "secret".into(), path);
        assert_eq!(auth.get_access_token().unwrap(), "ya29.token");
    }

    #[test]
    fn test_remove_token_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TOKEN_FILE);
        fs::write(&path, "{}").unwrap();

        assert!(remove_token_file(&path).unwrap());
        assert!(!path.exists());
        assert!(!remove_token_file(&path).unwrap());
    }
}
