//! Parser for the pipe-delimited batch-add format.
//!
//! Each non-blank line is one candidate record:
//!
//! ```text
//! email|emailPassword|username|servicePassword[|country[|auth]]
//! ```
//!
//! At least four fields are required; shorter lines are rejected, with the
//! reason kept so the caller can report an aggregate count. One rejected
//! line never affects its neighbors.

/// Credentials parsed from one well-formed batch line.
///
/// The IMAP host is not part of the line format; the caller resolves it
/// from the email domain before storing the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCredentials {
    /// Mailbox address.
    pub email: String,
    /// Mailbox password.
    pub mail_password: String,
    /// Third-party service username.
    pub username: String,
    /// Third-party service password.
    pub service_password: String,
    /// Optional fifth field.
    pub country: Option<String>,
    /// Optional sixth field.
    pub auth: Option<String>,
}

/// The tagged result of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineResult {
    /// The line was well-formed.
    Parsed(NewCredentials),
    /// The line was dropped.
    Rejected {
        /// 1-based line number within the batch.
        line_no: usize,
        /// Why the line was dropped.
        reason: String,
    },
}

/// Aggregate counts over one parsed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Lines that produced a record.
    pub added: usize,
    /// Lines that were dropped.
    pub rejected: usize,
}

/// Parses one batch line.
///
/// Fields are `|`-separated and trimmed; blank lines return `None` rather
/// than a rejection so that empty trailing lines do not inflate the
/// rejected count.
#[must_use]
pub fn parse_line(line: &str, line_no: usize) -> Option<LineResult> {
    if line.trim().is_empty() {
        return None;
    }

    let fields: Vec<&str> = line.split('|').map(str::trim).collect();

    if fields.len() < 4 {
        return Some(LineResult::Rejected {
            line_no,
            reason: format!("expected at least 4 pipe-delimited fields, got {}", fields.len()),
        });
    }

    if fields[0].is_empty() {
        return Some(LineResult::Rejected {
            line_no,
            reason: "empty email field".to_string(),
        });
    }

    Some(LineResult::Parsed(NewCredentials {
        email: fields[0].to_string(),
        mail_password: fields[1].to_string(),
        username: fields[2].to_string(),
        service_password: fields[3].to_string(),
        country: fields.get(4).filter(|s| !s.is_empty()).map(ToString::to_string),
        auth: fields.get(5).filter(|s| !s.is_empty()).map(ToString::to_string),
    }))
}

/// Parses a whole batch of newline-separated lines.
#[must_use]
pub fn parse_batch(text: &str) -> Vec<LineResult> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| parse_line(line, idx + 1))
        .collect()
}

/// Tallies a parsed batch into aggregate counts.
#[must_use]
pub fn summarize(results: &[LineResult]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for result in results {
        match result {
            LineResult::Parsed(_) => summary.added += 1,
            LineResult::Rejected { .. } => summary.rejected += 1,
        }
    }
    summary
}
