//! Bill processor: turns raw messages into records.
//!
//! Flow per message:
//! 1. Decode the body → empty text skips the message
//! 2. Extract the last dollar amount → none skips the message
//! 3. Classify the sender and build the record → failure skips the message
//!
//! A skipped message never stops the batch. Processing is synchronous and
//! does no I/O; each message depends only on its own content and the
//! read-only category map.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::CategoryMap;
use crate::error::ProcessError;
use crate::pipeline::amount::extract_amount;
use crate::pipeline::classify::classify;
use crate::pipeline::decode::{DecodePolicy, decode_body};
use crate::pipeline::record::build_record;
use crate::pipeline::types::{BatchOutcome, Disposition, RawMessage, Record, SkippedMessage};

/// Bill processor. Stateless apart from its read-only configuration.
#[derive(Debug, Clone)]
pub struct BillProcessor {
    categories: Arc<CategoryMap>,
    policy: DecodePolicy,
}

impl BillProcessor {
    /// Create a new bill processor.
    pub fn new(categories: Arc<CategoryMap>, policy: DecodePolicy) -> Self {
        Self { categories, policy }
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    /// Process a single message.
    pub fn process(&self, message: &RawMessage) -> Result<Record, ProcessError> {
        let text = decode_body(&message.parts, self.policy);
        if text.is_empty() {
            return Err(ProcessError::NoText);
        }

        let amount = extract_amount(&text)?;
        let category = classify(&self.categories, message.header("From"), &text);

        Ok(build_record(&category, &amount, message.internal_date_ms)?)
    }

    /// Process a batch of messages in input order.
    ///
    /// Processes each message independently. Failures on individual messages
    /// are logged but don't fail the entire batch.
    pub fn process_batch(&self, messages: &[RawMessage]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for message in messages {
            match self.process(message) {
                Ok(record) => {
                    debug!(
                        id = %message.id,
                        category = %record.category,
                        disposition = Disposition::Recorded.label(),
                        "Message recorded"
                    );
                    outcome.records.push(record);
                    outcome.processed_ids.push(message.id.clone());
                }
                Err(e) => {
                    let disposition = e.disposition();
                    match &e {
                        ProcessError::NoText => {
                            debug!(id = %message.id, "Skipping message without text");
                        }
                        _ => {
                            warn!(
                                id = %message.id,
                                disposition = disposition.label(),
                                error = %e,
                                "Skipping message"
                            );
                        }
                    }
                    outcome.skipped.push(SkippedMessage {
                        id: message.id.clone(),
                        disposition,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            recorded = outcome.count(Disposition::Recorded),
            no_text = outcome.count(Disposition::SkippedNoText),
            no_amount = outcome.count(Disposition::SkippedNoAmount),
            build_error = outcome.count(Disposition::SkippedBuildError),
            total = outcome.total(),
            "created {} record(s)",
            outcome.records.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::error::{BuildError, ExtractError};
    use crate::pipeline::types::{Header, MessagePart};

    fn processor() -> BillProcessor {
        let categories: CategoryMap = [
            ("billing@utility.com", "electric"),
            ("invoices@water.gov", "water"),
        ]
        .into_iter()
        .map(|(a, c)| (a.to_string(), c.to_string()))
        .collect();
        BillProcessor::new(Arc::new(categories), DecodePolicy::PlainOnly)
    }

    fn message(id: &str, from: &str, body: &str, ts: i64) -> RawMessage {
        RawMessage {
            id: id.into(),
            parts: vec![MessagePart::leaf("text/plain", URL_SAFE.encode(body))],
            headers: vec![Header::new("From", from)],
            internal_date_ms: ts,
        }
    }

    #[test]
    fn records_a_bill() {
        let msg = message(
            "m1",
            "billing@utility.com",
            "Total due: $52.13 Thank you",
            1_700_000_000_000,
        );
        let record = processor().process(&msg).unwrap();
        assert_eq!(record.category, "electric");
        assert_eq!(record.amount, dec!(52.13));
        assert_eq!(record.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn empty_body_is_skipped_no_text() {
        let mut msg = message("m1", "billing@utility.com", "", 0);
        msg.parts = vec![MessagePart::leaf("text/plain", "")];
        let err = processor().process(&msg).unwrap_err();
        assert!(matches!(err, ProcessError::NoText));
        assert_eq!(err.disposition(), Disposition::SkippedNoText);
    }

    #[test]
    fn html_only_message_is_skipped_in_plain_mode() {
        let mut msg = message("m1", "billing@utility.com", "", 0);
        msg.parts = vec![MessagePart::leaf("text/html", URL_SAFE.encode("<p>$5.00</p>"))];
        let err = processor().process(&msg).unwrap_err();
        assert_eq!(err.disposition(), Disposition::SkippedNoText);

        let relaxed = BillProcessor::new(
            Arc::new(processor().categories().clone()),
            DecodePolicy::AllowHtml,
        );
        assert_eq!(relaxed.process(&msg).unwrap().amount, dec!(5.00));
    }

    #[test]
    fn text_without_amount_is_skipped_no_amount() {
        let msg = message("m1", "billing@utility.com", "Your statement is ready", 0);
        let err = processor().process(&msg).unwrap_err();
        assert!(matches!(err, ProcessError::Extract(ExtractError::NoAmountFound)));
        assert_eq!(err.disposition(), Disposition::SkippedNoAmount);
        assert!(err.to_string().contains("dollar amounts"));
    }

    #[test]
    fn bad_timestamp_is_skipped_build_error() {
        let msg = message("m1", "billing@utility.com", "$1.00", i64::MIN);
        let err = processor().process(&msg).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Build(BuildError::InvalidTimestamp(i64::MIN))
        ));
        assert_eq!(err.disposition(), Disposition::SkippedBuildError);
    }

    #[test]
    fn non_ascii_digit_token_does_not_displace_amount() {
        let msg = message(
            "m1",
            "billing@utility.com",
            "Total due: $52.13\nRef $\u{0663}\u{0664}",
            0,
        );
        assert_eq!(processor().process(&msg).unwrap().amount, dec!(52.13));
    }

    #[test]
    fn uncategorized_bill_is_still_recorded() {
        let msg = message("m1", "someone@else.com", "Pay $3.50", 0);
        let record = processor().process(&msg).unwrap();
        assert_eq!(record.category, "");
        assert_eq!(record.amount, dec!(3.50));
    }

    #[test]
    fn batch_continues_past_failures() {
        let messages = vec![
            message("a", "billing@utility.com", "Total $10.00", 1_000),
            message("b", "billing@utility.com", "nothing to see", 2_000),
            message("c", "invoices@water.gov", "Due $1,200.50 ... final $45.00", 3_000),
        ];
        let outcome = processor().process_batch(&messages);

        assert_eq!(outcome.processed_ids, vec!["a", "c"]);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[1].category, "water");
        assert_eq!(outcome.records[1].amount, dec!(45.00));
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].id, "b");
        assert_eq!(outcome.skipped[0].disposition, Disposition::SkippedNoAmount);
        assert_eq!(outcome.total(), 3);
        assert_eq!(outcome.count(Disposition::Recorded), 2);
        assert_eq!(outcome.count(Disposition::SkippedNoAmount), 1);
        assert_eq!(outcome.count(Disposition::SkippedNoText), 0);
    }

    #[test]
    fn empty_batch() {
        let outcome = processor().process_batch(&[]);
        assert!(outcome.records.is_empty());
        assert!(outcome.processed_ids.is_empty());
        assert!(outcome.skipped.is_empty());
    }
}
