//! Sender-based bill classification.
//!
//! The `From` header is tried first. Some billers send from a routing
//! address and only show the billing address in the footer, so the body is
//! searched when the header gives no category.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::CategoryMap;

static EMAIL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
        .expect("email address pattern is valid")
});

/// First email-address-shaped substring of `text`.
pub fn first_address(text: &str) -> Option<&str> {
    EMAIL_ADDRESS.find(text).map(|m| m.as_str())
}

/// Category for the first address in `text`, if it is configured.
fn lookup<'a>(categories: &'a CategoryMap, text: &str) -> Option<&'a str> {
    first_address(text).and_then(|address| categories.get(address))
}

/// Classify a message by its `From` header, falling back to body text.
///
/// Returns an empty string when neither yields a configured sender.
pub fn classify(categories: &CategoryMap, from: Option<&str>, text: &str) -> String {
    if let Some(category) = from.and_then(|value| lookup(categories, value)) {
        return category.to_string();
    }

    if let Some(category) = lookup(categories, text) {
        debug!(category, "Category resolved from body text");
        return category.to_string();
    }

    debug!(from = from.unwrap_or(""), "No configured sender found");
    String::new()
}
