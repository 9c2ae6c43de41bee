//! Gmail channel: REST API client for fetching bills and marking them read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::channels::gmail_types::{BatchModifyRequest, GmailMessage, LabelList, MessageList};
use crate::channels::oauth::{ClientSecret, TokenProvider};
use crate::error::{ConfigError, SourceError};
use crate::pipeline::types::{LabelIds, MessageSource, RawMessage};

/// Default API root for the authenticated user.
pub const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

// ── Configuration ───────────────────────────────────────────────────

/// Gmail channel configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub api_base: String,
    /// OAuth token file (`GMAIL_API_TOKEN`).
    pub token_file: PathBuf,
    /// OAuth client secret file (`EMAIL_CREDS_FILE`), needed for refresh.
    pub credentials_file: Option<PathBuf>,
    pub bills_label: String,
    pub unread_label: String,
}

impl GmailConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token_file = std::env::var("GMAIL_API_TOKEN")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingEnvVar("GMAIL_API_TOKEN".to_string()))?;

        let credentials_file = std::env::var("EMAIL_CREDS_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let api_base =
            std::env::var("GMAIL_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let bills_label =
            std::env::var("GMAIL_BILLS_LABEL").unwrap_or_else(|_| "Bills".to_string());
        let unread_label =
            std::env::var("GMAIL_UNREAD_LABEL").unwrap_or_else(|_| "UNREAD".to_string());

        Ok(Self {
            api_base,
            token_file,
            credentials_file,
            bills_label,
            unread_label,
        })
    }

    /// Config with defaults for everything but the token file.
    pub fn with_token_file(token_file: impl AsRef<Path>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token_file: token_file.as_ref().to_path_buf(),
            credentials_file: None,
            bills_label: "Bills".to_string(),
            unread_label: "UNREAD".to_string(),
        }
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Gmail REST client acting as the run's message source.
pub struct GmailClient {
    config: GmailConfig,
    tokens: TokenProvider,
    http: reqwest::Client,
}

impl GmailClient {
    /// Configure from the environment and connect.
    pub async fn from_env() -> crate::error::Result<Self> {
        let config = GmailConfig::from_env()?;
        Self::connect(config).await
    }

    /// Load credentials and build the client.
    ///
    /// A missing token file starts the interactive consent flow when a
    /// client secret file is configured.
    pub async fn connect(config: GmailConfig) -> crate::error::Result<Self> {
        let client_secret = config
            .credentials_file
            .as_deref()
            .map(ClientSecret::from_path)
            .transpose()?;
        let tokens = TokenProvider::load(&config.token_file, client_secret).await?;
        Ok(Self::with_tokens(config, tokens))
    }

    pub fn with_tokens(config: GmailConfig, tokens: TokenProvider) -> Self {
        Self {
            config,
            tokens,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Authenticated GET returning parsed JSON.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Ids of all messages carrying both labels, following pagination.
    async fn list_message_ids(&self, labels: &LabelIds) -> Result<Vec<String>, SourceError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("labelIds", labels.bills.as_str()),
                ("labelIds", labels.unread.as_str()),
            ];
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.as_str()));
            }

            let page: MessageList = self.get_json("list messages", "messages", &query).await?;
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage, SourceError> {
        let message: GmailMessage = self
            .get_json("get message", &format!("messages/{id}"), &[("format", "full")])
            .await?;
        RawMessage::try_from(message)
    }
}

// ── MessageSource trait ─────────────────────────────────────────────

#[async_trait]
impl MessageSource for GmailClient {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn resolve_labels(&self) -> Result<LabelIds, SourceError> {
        let labels: LabelList = self.get_json("list labels", "labels", &[]).await?;

        let find = |name: &str| {
            labels
                .id_of(name)
                .map(str::to_string)
                .ok_or_else(|| SourceError::LabelNotFound(name.to_string()))
        };

        Ok(LabelIds {
            bills: find(&self.config.bills_label)?,
            unread: find(&self.config.unread_label)?,
        })
    }

    async fn fetch_messages(&self, labels: &LabelIds) -> Result<Vec<RawMessage>, SourceError> {
        let ids = self.list_message_ids(labels).await?;
        debug!(count = ids.len(), "Listed unread bill messages");

        let mut messages = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.get_message(id).await {
                Ok(message) => messages.push(message),
                Err(e) => {
                    error!(id = %id, error = %e, "failed to get message by ID");
                }
            }
        }

        info!("{} messages found", messages.len());
        Ok(messages)
    }

    async fn mark_read(&self, ids: &[String], label: &str) -> Result<(), SourceError> {
        if ids.is_empty() {
            return Err(SourceError::EmptyAcknowledgment);
        }

        let token = self.tokens.access_token().await?;
        for request in BatchModifyRequest::remove_label(ids, label) {
            let response = self
                .http
                .post(self.url("messages/batchModify"))
                .bearer_auth(token.expose_secret())
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SourceError::Api {
                    operation: "batch modify".to_string(),
                    status: status.as_u16(),
                    body,
                });
            }
            debug!(count = request.ids.len(), "Removed label from messages");
        }
        Ok(())
    }
}
