//! Dollar amount extraction.
//!
//! Bills often restate a subtotal before the final total, so the last
//! amount in the text is taken as the amount due.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExtractError;

/// `$`, optional whitespace, digits with optional `,ddd` groups, optional cents.
///
/// Digits and whitespace are ASCII only; `\d` would also match other
/// scripts' digits, which `Decimal` cannot parse.
static DOLLAR_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?-u:\s)*[0-9]+(?:,[0-9]{3})*(?:\.[0-9]{2})?")
        .expect("dollar amount pattern is valid")
});

/// Every amount-shaped token in `text`, in document order.
pub fn monetary_tokens(text: &str) -> Vec<&str> {
    DOLLAR_AMOUNT.find_iter(text).map(|m| m.as_str()).collect()
}

/// Extract the authoritative amount from `text` as a normalized string.
///
/// The last match wins. `$`, thousands separators and surrounding
/// whitespace are removed, e.g. `"$ 1,234.56"` → `"1234.56"`.
pub fn extract_amount(text: &str) -> Result<String, ExtractError> {
    let token = monetary_tokens(text)
        .pop()
        .ok_or(ExtractError::NoAmountFound)?;
    Ok(normalize(token))
}

fn normalize(token: &str) -> String {
    token.replace(['$', ','], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_amount_in_text() {
        for text in ["", "Thanks for your payment", "Total: 52.13 USD", "$ .50", "$abc"] {
            assert!(
                matches!(extract_amount(text), Err(ExtractError::NoAmountFound)),
                "expected no amount in {text:?}"
            );
        }
    }

    #[test]
    fn single_amount() {
        assert_eq!(extract_amount("Total due: $52.13 Thank you").unwrap(), "52.13");
    }

    #[test]
    fn last_match_wins() {
        let text = "Previous balance $1,200.50\nPayments received\nTotal due: $45.00";
        assert_eq!(extract_amount(text).unwrap(), "45.00");
    }

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(extract_amount("Amount: $1,234.56").unwrap(), "1234.56");
        assert_eq!(extract_amount("Amount: $12,345,678").unwrap(), "12345678");
    }

    #[test]
    fn whitespace_after_symbol_is_trimmed() {
        assert_eq!(extract_amount("Due $  98.10 by Friday").unwrap(), "98.10");
        assert_eq!(extract_amount("Due $\n7.25").unwrap(), "7.25");
    }

    #[test]
    fn whole_dollars_without_cents() {
        assert_eq!(extract_amount("Your bill is $120 this month").unwrap(), "120");
    }

    #[test]
    fn single_cent_digit_is_not_part_of_amount() {
        assert_eq!(extract_amount("Pay $12.5 now").unwrap(), "12");
    }

    #[test]
    fn extra_cent_digits_are_cut() {
        assert_eq!(extract_amount("Rate $0.125 per kWh").unwrap(), "0.12");
    }

    #[test]
    fn malformed_grouping_stops_at_last_valid_group() {
        assert_eq!(extract_amount("$1,23.00").unwrap(), "1");
    }

    #[test]
    fn non_ascii_digits_do_not_displace_amount() {
        let text = "Total due: $52.13\nRef $\u{0663}\u{0664}";
        assert_eq!(extract_amount(text).unwrap(), "52.13");
        assert_eq!(monetary_tokens(text), vec!["$52.13"]);
        assert!(matches!(
            extract_amount("Total \u{0665}\u{0660} $\u{0663}\u{0664}"),
            Err(ExtractError::NoAmountFound)
        ));
    }

    #[test]
    fn tokens_in_document_order() {
        let text = "$5.00 then $ 6 then $1,000.01";
        assert_eq!(monetary_tokens(text), vec!["$5.00", "$ 6", "$1,000.01"]);
    }
}
