//! Shared types for the bill extraction pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

// ── Raw message ─────────────────────────────────────────────────────

/// A fetched mail message, before any decoding.
///
/// The mail source converts its native format into this struct. It is never
/// mutated after fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Provider-assigned message id.
    pub id: String,
    /// Immediate body parts of the message.
    pub parts: Vec<MessagePart>,
    /// Top-level headers in provider order.
    pub headers: Vec<Header>,
    /// Provider receive time in epoch milliseconds.
    pub internal_date_ms: i64,
}

impl RawMessage {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// One node of a message body tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    /// Media type, e.g. `text/plain` or `multipart/alternative`.
    pub mime_type: String,
    pub body: PartBody,
}

impl MessagePart {
    /// Leaf part carrying url-safe base64 content.
    pub fn leaf(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            body: PartBody::Data(data.into()),
        }
    }

    /// Container part holding child parts.
    pub fn container(mime_type: impl Into<String>, parts: Vec<MessagePart>) -> Self {
        Self {
            mime_type: mime_type.into(),
            body: PartBody::Parts(parts),
        }
    }

    /// Whether the media type matches `mime`, ignoring case and parameters.
    pub fn is(&self, mime: &str) -> bool {
        self.mime_type
            .split(';')
            .next()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(mime))
    }
}

/// Content of a body node: encoded data or nested parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartBody {
    /// Url-safe base64 encoded content.
    Data(String),
    Parts(Vec<MessagePart>),
}

/// A single header key/value pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ── Record ──────────────────────────────────────────────────────────

/// A bill amount ready for the time-series store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Bill category; empty when the sender is not configured.
    pub category: String,
    /// Non-negative amount with at most two fractional digits.
    pub amount: Decimal,
    /// Taken from the message's internal date, never the processing time.
    pub timestamp: DateTime<Utc>,
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Terminal state of one message in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Recorded,
    SkippedNoText,
    SkippedNoAmount,
    SkippedBuildError,
}

impl Disposition {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::SkippedNoText => "skipped_no_text",
            Self::SkippedNoAmount => "skipped_no_amount",
            Self::SkippedBuildError => "skipped_build_error",
        }
    }
}

/// A message that did not yield a record.
#[derive(Debug, Clone)]
pub struct SkippedMessage {
    pub id: String,
    pub disposition: Disposition,
    pub reason: String,
}

/// Result of running a batch through the pipeline.
///
/// `processed_ids[i]` is the id of the message that produced `records[i]`.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub records: Vec<Record>,
    pub processed_ids: Vec<String>,
    pub skipped: Vec<SkippedMessage>,
}

impl BatchOutcome {
    /// Number of messages that reached a terminal state.
    pub fn total(&self) -> usize {
        self.records.len() + self.skipped.len()
    }

    /// Number of messages that ended in `disposition`.
    pub fn count(&self, disposition: Disposition) -> usize {
        if disposition == Disposition::Recorded {
            return self.records.len();
        }
        self.skipped
            .iter()
            .filter(|s| s.disposition == disposition)
            .count()
    }
}

// ── Message source trait ────────────────────────────────────────────

/// Opaque ids of the mailbox labels a run works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelIds {
    /// The bills label; messages must carry it to be fetched.
    pub bills: String,
    /// The unread label; fetched messages carry it, acknowledgment removes it.
    pub unread: String,
}

/// Trait for mail sources. Pure I/O, no extraction logic.
///
/// Fetch and acknowledgment live here; decoding, extraction and
/// classification live in `BillProcessor`.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Source name (e.g. "gmail").
    fn name(&self) -> &str;

    /// Resolve the bills and unread label names to opaque ids.
    async fn resolve_labels(&self) -> Result<LabelIds, SourceError>;

    /// Fetch every message carrying both labels.
    ///
    /// Messages that fail to fetch individually are logged and left out.
    async fn fetch_messages(&self, labels: &LabelIds) -> Result<Vec<RawMessage>, SourceError>;

    /// Remove `label` from every message in `ids`.
    ///
    /// An empty `ids` is an error, never a silent no-op.
    async fn mark_read(&self, ids: &[String], label: &str) -> Result<(), SourceError>;
}
