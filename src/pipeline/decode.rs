//! Body decoding: picks one text part of a message and decodes it.
//!
//! Only the immediate parts of a message and the children of a top-level
//! `multipart/alternative` are examined. Each matching part overwrites the
//! text adopted so far, so the last matching part wins.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tracing::warn;

use crate::error::DecodeError;
use crate::pipeline::types::{MessagePart, PartBody};

/// Url-safe base64 that accepts bodies with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Which top-level media types are adopted as message text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// `text/plain` only.
    #[default]
    PlainOnly,
    /// `text/plain` and `text/html` (tags stripped).
    AllowHtml,
}

impl DecodePolicy {
    pub fn from_allow_html(allow_html: bool) -> Self {
        if allow_html {
            Self::AllowHtml
        } else {
            Self::PlainOnly
        }
    }
}

/// Decode a message body tree into plain text.
///
/// Returns an empty string when no part qualifies or the adopted part failed
/// to decode.
pub fn decode_body(parts: &[MessagePart], policy: DecodePolicy) -> String {
    let mut text = String::new();

    for part in parts {
        if part.is("text/plain") {
            text = part_text(part);
        } else if policy == DecodePolicy::AllowHtml && part.is("text/html") {
            text = strip_html(&part_text(part));
        } else if part.is("multipart/alternative")
            && let PartBody::Parts(children) = &part.body
        {
            for child in children {
                if child.is("text/plain") {
                    text = part_text(child);
                }
            }
        }
    }

    text
}

/// Decode one leaf part, logging and swallowing failures.
fn part_text(part: &MessagePart) -> String {
    match &part.body {
        PartBody::Data(data) => decode_text(data).unwrap_or_else(|e| {
            warn!(mime_type = %part.mime_type, error = %e, "Failed to decode email body part");
            String::new()
        }),
        PartBody::Parts(_) => String::new(),
    }
}

/// Url-safe base64 → UTF-8 text.
pub fn decode_text(data: &str) -> Result<String, DecodeError> {
    let bytes = URL_SAFE_LENIENT.decode(data.trim())?;
    Ok(String::from_utf8(bytes)?)
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    // Normalize whitespace
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE.encode(text)
    }

    fn plain(text: &str) -> MessagePart {
        MessagePart::leaf("text/plain", encode(text))
    }

    // ── decode_text ─────────────────────────────────────────────────

    #[test]
    fn decodes_url_safe_alphabet() {
        // "??>" encodes to "Pz8-" with the url-safe alphabet
        assert_eq!(decode_text("Pz8-").unwrap(), "??>");
    }

    #[test]
    fn decodes_with_or_without_padding() {
        assert_eq!(decode_text("aGk=").unwrap(), "hi");
        assert_eq!(decode_text("aGk").unwrap(), "hi");
    }

    #[test]
    fn rejects_standard_alphabet_chars() {
        assert!(matches!(decode_text("Pz8+"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let data = base64::engine::general_purpose::URL_SAFE.encode([0xff, 0xfe, 0x41]);
        assert!(matches!(decode_text(&data), Err(DecodeError::Utf8(_))));
    }

    #[test]
    fn empty_data_is_empty_text() {
        assert_eq!(decode_text("").unwrap(), "");
    }

    // ── decode_body ─────────────────────────────────────────────────

    #[test]
    fn adopts_top_level_plain_part() {
        let parts = vec![plain("Total due: $52.13")];
        assert_eq!(decode_body(&parts, DecodePolicy::PlainOnly), "Total due: $52.13");
    }

    #[test]
    fn last_plain_part_wins() {
        let parts = vec![plain("first"), plain("second")];
        assert_eq!(decode_body(&parts, DecodePolicy::PlainOnly), "second");
    }

    #[test]
    fn recurses_into_multipart_alternative() {
        let parts = vec![MessagePart::container(
            "multipart/alternative",
            vec![
                plain("alt text $10.00"),
                MessagePart::leaf("text/html", encode("<p>$10.00</p>")),
            ],
        )];
        assert_eq!(decode_body(&parts, DecodePolicy::PlainOnly), "alt text $10.00");
    }

    #[test]
    fn later_alternative_overwrites_earlier_plain() {
        let parts = vec![
            plain("top level"),
            MessagePart::container("multipart/alternative", vec![plain("nested")]),
        ];
        assert_eq!(decode_body(&parts, DecodePolicy::PlainOnly), "nested");
    }

    #[test]
    fn ignores_html_in_plain_only_mode() {
        let parts = vec![MessagePart::leaf("text/html", encode("<b>$5.00</b>"))];
        assert_eq!(decode_body(&parts, DecodePolicy::PlainOnly), "");
    }

    #[test]
    fn relaxed_mode_adopts_stripped_html() {
        let parts = vec![MessagePart::leaf(
            "text/html",
            encode("<p>Amount due: $<b>52.13</b></p>"),
        )];
        assert_eq!(
            decode_body(&parts, DecodePolicy::AllowHtml),
            "Amount due: $52.13"
        );
    }

    #[test]
    fn relaxed_mode_does_not_adopt_nested_html() {
        let parts = vec![MessagePart::container(
            "multipart/alternative",
            vec![MessagePart::leaf("text/html", encode("<p>$1.00</p>"))],
        )];
        assert_eq!(decode_body(&parts, DecodePolicy::AllowHtml), "");
    }

    #[test]
    fn does_not_recurse_past_two_levels() {
        let parts = vec![MessagePart::container(
            "multipart/mixed",
            vec![MessagePart::container(
                "multipart/alternative",
                vec![plain("too deep $9.99")],
            )],
        )];
        assert_eq!(decode_body(&parts, DecodePolicy::PlainOnly), "");
    }

    #[test]
    fn failed_part_overwrites_with_empty_text() {
        let parts = vec![plain("good $1.00"), MessagePart::leaf("text/plain", "!!!")];
        assert_eq!(decode_body(&parts, DecodePolicy::PlainOnly), "");
    }

    #[test]
    fn empty_body_decodes_to_empty_text() {
        let parts = vec![MessagePart::leaf("text/plain", "")];
        assert_eq!(decode_body(&parts, DecodePolicy::PlainOnly), "");
        assert_eq!(decode_body(&[], DecodePolicy::PlainOnly), "");
    }

    #[test]
    fn policy_from_flag() {
        assert_eq!(DecodePolicy::from_allow_html(true), DecodePolicy::AllowHtml);
        assert_eq!(DecodePolicy::from_allow_html(false), DecodePolicy::PlainOnly);
        assert_eq!(DecodePolicy::default(), DecodePolicy::PlainOnly);
    }

    // ── strip_html ──────────────────────────────────────────────────

    #[test]
    fn strip_html_nested_tags() {
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
    }

    #[test]
    fn strip_html_whitespace_normalized() {
        assert_eq!(strip_html("<p>  Hello   World  </p>"), "Hello World");
    }
}
