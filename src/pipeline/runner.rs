//! One parser cycle: fetch, extract, persist and acknowledge.
//!
//! 1. `MessageSource::resolve_labels()` + `fetch_messages()`: mailbox I/O
//! 2. `BillProcessor::process_batch()`: pure extraction
//! 3. `RecordSink::write_records()`: persistence, returns an error count
//! 4. `MessageSource::mark_read()`: only when every record was written
//!
//! Nothing is retried. A failed write leaves every message unread so the
//! next run sees it again.

use tracing::{info, warn};

use crate::error::Result;
use crate::pipeline::processor::BillProcessor;
use crate::pipeline::types::MessageSource;
use crate::store::traits::RecordSink;

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub write_errors: usize,
    /// Number of messages whose unread label was removed.
    pub acknowledged: usize,
}

/// Run a single cycle against the given collaborators.
///
/// Collaborator failures (labels, listing, acknowledgment) are returned to
/// the caller. Per-message problems only show up in the summary and logs.
pub async fn run_once(
    source: &dyn MessageSource,
    sink: &dyn RecordSink,
    processor: &BillProcessor,
) -> Result<RunSummary> {
    let labels = source.resolve_labels().await?;
    let messages = source.fetch_messages(&labels).await?;

    let mut summary = RunSummary {
        fetched: messages.len(),
        ..RunSummary::default()
    };
    if messages.is_empty() {
        info!(source = source.name(), "No unread bills");
        return Ok(summary);
    }

    let outcome = processor.process_batch(&messages);
    summary.recorded = outcome.records.len();
    summary.skipped = outcome.skipped.len();

    if outcome.records.is_empty() {
        info!("No records to write; leaving messages unread");
        return Ok(summary);
    }

    summary.write_errors = sink.write_records(&outcome.records).await;
    if summary.write_errors > 0 {
        warn!(
            errors = summary.write_errors,
            records = summary.recorded,
            "Not marking messages as read; some records failed to write"
        );
        return Ok(summary);
    }

    source
        .mark_read(&outcome.processed_ids, &labels.unread)
        .await?;
    summary.acknowledged = outcome.processed_ids.len();
    info!("marked {} messages as read", summary.acknowledged);

    Ok(summary)
}
