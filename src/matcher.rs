//! Email content matching for extracting verification codes from message bodies.
//!
//! This module provides a flexible [`Matcher`] trait and built-in implementations.
//! The panel uses [`CodeMatcher::six_digit`] for its one action, but the trait
//! is the seam for any other extraction pattern.
//!
//! # Example
//!
//! ```
//! use otp_panel::matcher::{RegexMatcher, CodeMatcher, Matcher};
//!
//! // Built-in 6-digit code matcher
//! let code = CodeMatcher::six_digit();
//! assert_eq!(code.find_match("Your code is 123456.").as_deref(), Some("123456"));
//!
//! // Custom regex
//! let custom = RegexMatcher::new(r"token=([a-f0-9]+)").unwrap();
//! let text = "Click here: https://example.com?token=abc123";
//! assert_eq!(custom.find_match(text).as_deref(), Some("abc123"));
//! ```

use regex::Regex;
use std::borrow::Cow;

/// Trait for matching and extracting content from email bodies.
///
/// Implement this trait to define custom matching logic.
pub trait Matcher: Send + Sync {
    /// Attempts to find and extract matching content from the text.
    ///
    /// Returns `Some(matched_value)` if found, `None` otherwise.
    /// Uses `Cow<str>` to avoid allocations when the match can be borrowed
    /// directly from the input text.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging and error messages.
    fn description(&self) -> &str;
}

/// Regex-based matcher that extracts the first capture group.
///
/// # Example
///
/// ```
/// use otp_panel::matcher::{RegexMatcher, Matcher};
///
/// let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
/// assert_eq!(matcher.find_match("Your code: 42"), Some("42".into()));
/// ```
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    description: String,
}

impl RegexMatcher {
    /// Creates a new regex matcher.
    ///
    /// The regex should contain at least one capture group. The first capture group
    /// will be extracted as the match result.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            description: format!("regex pattern: {pattern}"),
            regex,
        })
    }

    /// Creates a new regex matcher with a custom description.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn with_description(
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            description: description.into(),
            regex,
        })
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| Cow::Borrowed(m.as_str()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher for numeric verification codes.
///
/// Purely lexical: a 6-digit run inside a phone number or price is
/// indistinguishable from a real code. That false-positive risk is accepted.
///
/// # Example
///
/// ```
/// use otp_panel::matcher::{CodeMatcher, Matcher};
///
/// let code = CodeMatcher::six_digit();
/// assert_eq!(code.find_match("Your code is 123456."), Some("123456".into()));
/// assert_eq!(code.find_match("Code: 12345"), None); // Only 5 digits
/// ```
#[derive(Debug, Clone)]
pub struct CodeMatcher {
    inner: RegexMatcher,
}

impl CodeMatcher {
    /// Creates a matcher for 6-digit verification codes.
    #[must_use]
    pub fn six_digit() -> Self {
        Self::n_digit(6)
    }

    /// Creates a matcher for N-digit verification codes.
    ///
    /// Uses word boundaries to match exactly N digits.
    ///
    /// # Panics
    ///
    /// Panics if `digits` is 0.
    #[must_use]
    pub fn n_digit(digits: usize) -> Self {
        assert!(digits > 0, "digits must be > 0");
        // \b keeps digit runs embedded in longer numbers from matching
        let pattern = format!(r"\b(\d{{{digits}}})\b");
        Self {
            inner: RegexMatcher::with_description(
                &pattern,
                format!("{digits}-digit verification code"),
            )
            .expect("valid regex"),
        }
    }

    /// Creates a code matcher with a custom regex.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn custom(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            inner: RegexMatcher::with_description(pattern, "custom code pattern")?,
        })
    }
}

impl Matcher for CodeMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.inner.find_match(text)
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_matcher() {
        let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
        assert_eq!(
            matcher.find_match("Your code: 12345").as_deref(),
            Some("12345")
        );
        assert_eq!(matcher.find_match("No code here"), None);
    }

    #[test]
    fn test_six_digit() {
        let code = CodeMatcher::six_digit();
        assert_eq!(
            code.find_match("... 482913 is your code ...").as_deref(),
            Some("482913")
        );
        assert_eq!(
            code.find_match("Your code is 123456.").as_deref(),
            Some("123456")
        );
        assert_eq!(code.find_match("Code: 12345"), None); // Only 5 digits
        assert_eq!(code.find_match("Code: 1234567"), None); // 7 digits
    }

    #[test]
    fn test_first_match_wins() {
        let code = CodeMatcher::six_digit();
        assert_eq!(
            code.find_match("codes 111222 and 333444").as_deref(),
            Some("111222")
        );
    }

    #[test]
    fn test_phone_fragment_false_positive_accepted() {
        // Six digits inside otherwise-delimited text match; this is by
        // contract, not an oversight.
        let code = CodeMatcher::six_digit();
        assert_eq!(code.find_match("call 555-123456 now").as_deref(), Some("123456"));
    }

    #[test]
    fn test_n_digit() {
        let pin = CodeMatcher::n_digit(4);
        assert_eq!(pin.find_match("PIN: 1234").as_deref(), Some("1234"));
        assert_eq!(pin.find_match("PIN: 12345"), None); // 5 digits
    }

    #[test]
    fn test_regex_matcher_returns_borrowed() {
        // Verify that RegexMatcher returns a borrowed reference (no allocation)
        let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
        let result = matcher.find_match("Your code: 12345");
        assert!(matches!(result, Some(Cow::Borrowed(_))));
    }
}
