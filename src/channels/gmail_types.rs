//! Gmail REST API wire types and their conversion into `RawMessage`.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::pipeline::types::{Header, MessagePart, PartBody, RawMessage};

/// Response of `GET users/me/labels`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelList {
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl LabelList {
    /// Id of the label whose display name is exactly `name`.
    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Response of `GET users/me/messages`. Ids only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    /// Absent when no message matches.
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// Response of `GET users/me/messages/{id}` in `full` format.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    /// Epoch milliseconds, serialized by the API as a decimal string.
    pub internal_date: Option<String>,
    pub payload: Option<GmailPart>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailPart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<GmailHeader>,
    #[serde(default)]
    pub body: GmailBody,
    #[serde(default)]
    pub parts: Vec<GmailPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GmailBody {
    /// Url-safe base64 content; absent for containers and attachments.
    pub data: Option<String>,
}

/// Most ids `batchModify` accepts in one call.
pub const BATCH_MODIFY_LIMIT: usize = 1000;

/// Body of `POST users/me/messages/batchModify`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchModifyRequest<'a> {
    pub ids: &'a [String],
    pub remove_label_ids: Vec<&'a str>,
}

impl<'a> BatchModifyRequest<'a> {
    /// Requests removing `label` from `ids`, at most [`BATCH_MODIFY_LIMIT`] ids each.
    pub fn remove_label(ids: &'a [String], label: &'a str) -> Vec<Self> {
        ids.chunks(BATCH_MODIFY_LIMIT)
            .map(|chunk| Self {
                ids: chunk,
                remove_label_ids: vec![label],
            })
            .collect()
    }
}

impl From<GmailPart> for MessagePart {
    fn from(part: GmailPart) -> Self {
        let body = if part.parts.is_empty() {
            PartBody::Data(part.body.data.unwrap_or_default())
        } else {
            PartBody::Parts(part.parts.into_iter().map(MessagePart::from).collect())
        };
        Self {
            mime_type: part.mime_type,
            body,
        }
    }
}

impl TryFrom<GmailMessage> for RawMessage {
    type Error = SourceError;

    fn try_from(message: GmailMessage) -> Result<Self, Self::Error> {
        let malformed = |reason: &str| SourceError::Decode {
            id: message.id.clone(),
            reason: reason.to_string(),
        };

        let internal_date_ms = message
            .internal_date
            .as_deref()
            .ok_or_else(|| malformed("missing internalDate"))?
            .parse::<i64>()
            .map_err(|e| malformed(&format!("internalDate is not an integer: {e}")))?;

        let (headers, parts) = match message.payload {
            Some(payload) => (
                payload
                    .headers
                    .into_iter()
                    .map(|h| Header::new(h.name, h.value))
                    .collect(),
                payload.parts.into_iter().map(MessagePart::from).collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        Ok(RawMessage {
            id: message.id,
            parts,
            headers,
            internal_date_ms,
        })
    }
}
