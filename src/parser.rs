//! Internal module for extracting scannable text from email messages.

use mailparse::{parse_mail, ParsedMail};
use tracing::{debug, warn};

/// Result of pulling scannable text out of one fetched message.
#[derive(Debug)]
pub(crate) enum BodyText {
    /// Decoded text, ready for matching.
    Text(String),
    /// Message couldn't be parsed (logged, but the scan continues with the
    /// next message).
    ParseError,
}

/// Extracts the scannable text of an IMAP fetch result.
///
/// Multipart messages contribute the text of every `text/plain` and
/// `text/html` part, concatenated in part order; a non-multipart message
/// contributes its single decoded payload. Parts that fail to decode are
/// skipped rather than failing the message, and a message that fails to
/// parse at all is skipped rather than failing the scan.
pub(crate) fn extract_message_text(message: &async_imap::types::Fetch) -> BodyText {
    let uid = message.uid;

    let Some(body) = message.body() else {
        debug!(uid, "Message has no body");
        return BodyText::Text(String::new());
    };

    let parsed = match parse_mail(body) {
        Ok(p) => p,
        Err(e) => {
            warn!(
                uid,
                error = %e,
                "Failed to parse email, skipping message"
            );
            return BodyText::ParseError;
        }
    };

    let mut parts = Vec::new();
    collect_text_parts(&parsed, &mut parts);

    BodyText::Text(parts.join(" "))
}

/// Walks the MIME tree collecting decoded text of every text part.
fn collect_text_parts(part: &ParsedMail<'_>, out: &mut Vec<String>) {
    if part.subparts.is_empty() {
        // Non-multipart message: decode the single payload whatever its type.
        match part.get_body() {
            Ok(body) => out.push(body),
            Err(e) => debug!(error = %e, "Skipping undecodable part"),
        }
        return;
    }

    for sub in &part.subparts {
        if sub.subparts.is_empty() {
            let content_type = sub.ctype.mimetype.to_lowercase();
            if content_type == "text/plain" || content_type == "text/html" {
                if let Ok(body) = sub.get_body() {
                    out.push(body);
                }
            }
        } else {
            // Nested multipart (e.g. multipart/alternative inside mixed)
            collect_text_parts(sub, out);
        }
    }
}
