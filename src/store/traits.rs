//! `RecordSink` trait, the single async interface for record persistence.

use async_trait::async_trait;

use crate::pipeline::types::Record;

/// Backend-agnostic record writer.
///
/// Every record becomes one point tagged `unit=dollar`, with the category as
/// measurement and the amount as the `amount` field.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Write `records`, returning how many failed.
    ///
    /// Failures are logged per record and never retried.
    async fn write_records(&self, records: &[Record]) -> usize;
}
