//! OAuth access tokens for the Gmail API.
//!
//! The token file holds the access and refresh tokens. When it does not
//! exist yet, an interactive consent flow asks the user to open the consent
//! page and paste back the authorization code. An expiring access token is
//! refreshed with the client secret and written back to the same file.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::AuthError;

/// Refresh tokens that expire within this window.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Scope needed to read bills and remove their unread label.
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

const CONSENT_STATE: &str = "state-token";

/// Token file contents (`token.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// RFC 3339; the zero time `0001-01-01T00:00:00Z` means no expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Whether the token is expired or expires within the skew window.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) if expiry.year() > 1 => {
                expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now
            }
            _ => false,
        }
    }
}

/// OAuth client identity from the downloaded client secret file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Read an `installed` or `web` client secret file.
    pub fn from_path(path: &Path) -> Result<Self, AuthError> {
        let unreadable = |reason: String| AuthError::CredentialsFile {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let file: ClientSecretFile =
            serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| unreadable("no \"installed\" or \"web\" client section".to_string()))
    }

    /// First registered redirect URI, sent with both consent and exchange.
    fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uris.first().map(String::as_str)
    }

    /// Consent page URL requesting offline access to the modify scope.
    pub fn auth_url(&self) -> Result<String, AuthError> {
        let mut params = vec![
            ("access_type", "offline"),
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("scope", GMAIL_MODIFY_SCOPE),
            ("state", CONSENT_STATE),
        ];
        if let Some(redirect) = self.redirect_uri() {
            params.push(("redirect_uri", redirect));
        }
        reqwest::Url::parse_with_params(&self.auth_uri, &params)
            .map(|url| url.to_string())
            .map_err(|e| AuthError::Consent(format!("invalid auth_uri {:?}: {e}", self.auth_uri)))
    }
}

/// Token endpoint response, for both code exchange and refresh.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Hands out valid access tokens, refreshing from the token file as needed.
pub struct TokenProvider {
    path: PathBuf,
    client_secret: Option<ClientSecret>,
    token: Mutex<StoredToken>,
    http: reqwest::Client,
}

impl TokenProvider {
    /// Load the token file, or run the consent flow when it does not exist
    /// and a client secret is available.
    pub async fn load(path: &Path, client_secret: Option<ClientSecret>) -> Result<Self, AuthError> {
        match client_secret {
            Some(secret) if !path.exists() => Self::authorize(path, secret).await,
            secret => Self::from_file(path, secret),
        }
    }

    /// Load the token file at `path`.
    pub fn from_file(path: &Path, client_secret: Option<ClientSecret>) -> Result<Self, AuthError> {
        let token = read_token(path)?;
        Ok(Self::new(path.to_path_buf(), token, client_secret))
    }

    pub fn new(path: PathBuf, token: StoredToken, client_secret: Option<ClientSecret>) -> Self {
        Self {
            path,
            client_secret,
            token: Mutex::new(token),
            http: reqwest::Client::new(),
        }
    }

    /// Interactive consent: print the consent URL, read the authorization
    /// code from stdin, exchange it and save the token to `path`.
    pub async fn authorize(path: &Path, client_secret: ClientSecret) -> Result<Self, AuthError> {
        let url = client_secret.auth_url()?;
        println!(
            "Go to the following link in your browser then type the authorization code:\n{url}"
        );

        let mut stdin = BufReader::new(tokio::io::stdin());
        let code = read_code(&mut stdin).await?;

        let http = reqwest::Client::new();
        let token = exchange_code(&http, &client_secret, &code).await?;
        write_token(path, &token)?;
        info!(path = %path.display(), "Saved Gmail token");

        Ok(Self::new(path.to_path_buf(), token, Some(client_secret)))
    }

    /// A currently valid access token.
    pub async fn access_token(&self) -> Result<SecretString, AuthError> {
        let mut token = self.token.lock().await;

        if token.needs_refresh(Utc::now()) {
            let refreshed = self.refresh(&token).await?;
            write_token(&self.path, &refreshed)?;
            info!(path = %self.path.display(), "Refreshed Gmail access token");
            *token = refreshed;
        }

        Ok(SecretString::from(token.access_token.clone()))
    }

    async fn refresh(&self, current: &StoredToken) -> Result<StoredToken, AuthError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::Expired("token file has no refresh_token".to_string()))?;
        let secret = self.client_secret.as_ref().ok_or_else(|| {
            AuthError::Expired("EMAIL_CREDS_FILE is needed to refresh the token".to_string())
        })?;

        debug!(token_uri = %secret.token_uri, "Refreshing access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let body = request_token(&self.http, secret, &form, AuthError::Refresh).await?;

        Ok(apply_refresh(current, body, Utc::now()))
    }
}

/// Exchange an authorization code for the first token.
async fn exchange_code(
    http: &reqwest::Client,
    secret: &ClientSecret,
    code: &str,
) -> Result<StoredToken, AuthError> {
    let mut form = vec![("grant_type", "authorization_code"), ("code", code)];
    if let Some(redirect) = secret.redirect_uri() {
        form.push(("redirect_uri", redirect));
    }

    debug!(token_uri = %secret.token_uri, "Exchanging authorization code");
    let body = request_token(http, secret, &form, AuthError::Consent).await?;
    Ok(issued_token(body, Utc::now()))
}

/// POST `form` plus the client credentials to the token endpoint.
async fn request_token(
    http: &reqwest::Client,
    secret: &ClientSecret,
    form: &[(&str, &str)],
    failed: fn(String) -> AuthError,
) -> Result<TokenResponse, AuthError> {
    let mut params = form.to_vec();
    params.push(("client_id", secret.client_id.as_str()));
    params.push(("client_secret", secret.client_secret.as_str()));

    let response = http
        .post(&secret.token_uri)
        .form(&params)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(failed(format!("{status}: {body}")));
    }

    response.json().await.map_err(|e| failed(e.to_string()))
}

/// Read one authorization code line.
async fn read_code<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, AuthError> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| AuthError::Consent(format!("failed to read authorization code: {e}")))?;

    let code = line.trim();
    if code.is_empty() {
        return Err(AuthError::Consent("no authorization code entered".to_string()));
    }
    Ok(code.to_string())
}

/// Token from a fresh code exchange.
fn issued_token(body: TokenResponse, now: DateTime<Utc>) -> StoredToken {
    StoredToken {
        access_token: body.access_token,
        token_type: body.token_type.unwrap_or_else(|| "Bearer".to_string()),
        refresh_token: body.refresh_token,
        expiry: body.expires_in.map(|secs| now + Duration::seconds(secs)),
    }
}

/// Merge a refresh response into the stored token.
///
/// Google usually omits `refresh_token` on refresh; the old one is kept.
fn apply_refresh(current: &StoredToken, body: TokenResponse, now: DateTime<Utc>) -> StoredToken {
    StoredToken {
        access_token: body.access_token,
        token_type: body
            .token_type
            .unwrap_or_else(|| current.token_type.clone()),
        refresh_token: body.refresh_token.or_else(|| current.refresh_token.clone()),
        expiry: body.expires_in.map(|secs| now + Duration::seconds(secs)),
    }
}

fn read_token(path: &Path) -> Result<StoredToken, AuthError> {
    let unreadable = |reason: String| AuthError::TokenFile {
        path: path.display().to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))
}

/// Replace the token file atomically.
///
/// The token goes to an owner-only (0600) temp file in the same directory,
/// which is then renamed over `path`.
fn write_token(path: &Path, token: &StoredToken) -> Result<(), AuthError> {
    let unwritable = |reason: String| AuthError::TokenFile {
        path: path.display().to_string(),
        reason,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| unwritable(e.to_string()))?;
    serde_json::to_writer(&mut file, token).map_err(|e| unwritable(e.to_string()))?;
    file.flush().map_err(|e| unwritable(e.to_string()))?;
    file.as_file()
        .sync_all()
        .map_err(|e| unwritable(e.to_string()))?;
    file.persist(path)
        .map_err(|e| unwritable(e.error.to_string()))?;
    Ok(())
}
