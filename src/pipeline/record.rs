//! Record construction from an extracted amount.

use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::Decimal;
use tracing::info;

use crate::config::CategoryMap;
use crate::error::BuildError;
use crate::pipeline::classify::classify;
use crate::pipeline::types::Record;

/// Maximum fractional digits a bill amount may carry.
const MAX_SCALE: u32 = 2;

/// Build a record from a category, a normalized amount and the message's
/// internal date in epoch milliseconds.
pub fn build_record(
    category: &str,
    amount: &str,
    internal_date_ms: i64,
) -> Result<Record, BuildError> {
    let amount = parse_amount(amount)?;
    let timestamp = DateTime::from_timestamp_millis(internal_date_ms)
        .ok_or(BuildError::InvalidTimestamp(internal_date_ms))?;

    let record = Record {
        category: category.to_string(),
        amount,
        timestamp,
    };

    info!(
        category = %record.category,
        amount = %record.amount,
        ts = %record.timestamp,
        "Built record"
    );

    Ok(record)
}

/// Like [`build_record`], deriving the category from the `From` header and
/// decoded text.
pub fn build_record_from_text(
    categories: &CategoryMap,
    from: Option<&str>,
    text: &str,
    amount: &str,
    internal_date_ms: i64,
) -> Result<Record, BuildError> {
    let category = classify(categories, from, text);
    build_record(&category, amount, internal_date_ms)
}

/// Parse a normalized amount. Stray `,` separators are tolerated.
pub fn parse_amount(amount: &str) -> Result<Decimal, BuildError> {
    let cleaned = amount.trim().replace(',', "");
    let invalid = |reason: String| BuildError::InvalidAmount {
        amount: amount.to_string(),
        reason,
    };

    let value = Decimal::from_str(&cleaned).map_err(|e| invalid(e.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid("amount is negative".to_string()));
    }
    if value.scale() > MAX_SCALE {
        return Err(invalid(format!(
            "more than {MAX_SCALE} fractional digits"
        )));
    }
    Ok(value)
}
