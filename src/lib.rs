//! # otp-panel
//!
//! Account-panel backend for managing stored mailbox credentials and pulling
//! verification codes out of them over IMAP.
//!
//! This crate provides:
//! - A SQLite-backed store of per-user account records ([`AccountStore`])
//! - A batch parser for pipe-delimited credential lines ([`batch`])
//! - A one-shot IMAP retrieval engine that scans recent messages for a
//!   6-digit code ([`fetch_code`]), with a fallback-host retry
//! - A transport-agnostic dispatch layer ([`Dispatcher`]) mapping user
//!   actions onto rendered [`Panel`]s, ready for any chat front end
//!
//! ## Features
//!
//! - **`integration-tests`**: Enables tests that talk to a live IMAP server,
//!   configured through environment variables.
//!
//! ## Quick Start
//!
//! ```no_run
//! use otp_panel::{fetch_code, CodeMatcher, FetchConfig};
//!
//! # async fn example() -> otp_panel::Result<()> {
//! // Configure a one-shot retrieval
//! let config = FetchConfig::builder()
//!     .email("user@gmail.com")
//!     .password("app-password")  // Use app-specific password for Gmail
//!     .build()?;
//!
//! // Scan the most recent messages for a 6-digit code
//! let outcome = fetch_code(&config, &CodeMatcher::six_digit()).await;
//! println!("{}", outcome.render());
//! # Ok(())
//! # }
//! ```
//!
//! ## Driving the Panel
//!
//! ```no_run
//! use otp_panel::{Action, AccountStore, Dispatcher};
//!
//! # async fn example() -> otp_panel::Result<()> {
//! let store = AccountStore::open("data/otp-panel.db").await?;
//! let dispatcher = Dispatcher::new(store);
//!
//! let user_id = 42;
//! let lines = "alice@gmail.com|mailPass|alice|svcPass".to_string();
//! let panel = dispatcher.handle(user_id, Action::SubmitBatch(lines)).await?;
//! println!("{}", panel.text);
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Pattern Matching
//!
//! ```
//! use otp_panel::matcher::{CodeMatcher, RegexMatcher, Matcher};
//!
//! // 4-digit codes instead of the default 6
//! let short = CodeMatcher::n_digit(4);
//!
//! // Or extract something else entirely
//! let token = RegexMatcher::new(r"token=([a-f0-9]{32})").unwrap();
//! assert!(token.find_match("token=0123456789abcdef0123456789abcdef").is_some());
//! ```
//!
//! ## Error Handling
//!
//! All errors implement `std::error::Error` and provide context. Use
//! [`Error::is_retryable`] to determine if an operation can be retried:
//!
//! ```
//! use otp_panel::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_retryable() {
//!         println!("Transient error, can retry: {}", error);
//!     } else {
//!         println!("Permanent error: {}", error);
//!     }
//! }
//! ```
//!
//! Mailbox problems during a panel interaction never surface as errors;
//! the engine folds them into a [`FetchOutcome`] so the user always gets
//! a rendered panel.
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. Major operations emit
//! spans with structured fields:
//!
//! - `fetch_code` - One retrieval attempt chain (primary plus fallback)
//! - `Dispatcher::handle` - One user action
//! - `session::authenticate` - IMAP authentication
//! - `connection::establish_tls` - TLS connection
//!
//! Standard fields include `email` (never the password), `imap_host`,
//! `matcher`, `uid`, and `user_id`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod panel;
pub mod resolver;
pub mod settings;
pub mod store;

// Internal modules
mod connection;
mod parser;
mod session;

// Re-exports for ergonomic API
pub use config::{FetchConfig, FetchConfigBuilder, TimeoutConfig};
pub use email_address::EmailAddress;
pub use engine::{fetch_code, FetchOutcome};
pub use error::{Error, ErrorCategory, Result};
pub use matcher::{CodeMatcher, Matcher, RegexMatcher};
pub use panel::{Action, Dispatcher, Panel, PanelTracker};
pub use resolver::{resolve_imap_host, HostResolver};
pub use settings::Settings;
pub use store::{Account, AccountStore, NewAccount};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        // Ensure all public types are accessible
        let _ = FetchConfig::builder();
        let _ = CodeMatcher::six_digit();
        let _ = HostResolver::with_defaults();
        let _ = PanelTracker::new();
        assert_eq!(resolve_imap_host("a@gmail.com").0, "imap.gmail.com");
    }
}
