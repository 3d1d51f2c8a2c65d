//! The code-retrieval engine.
//!
//! One call to [`fetch_code`] performs the whole best-effort sequence:
//! connect to the mailbox over TLS, authenticate, select INBOX, take the
//! newest messages, and scan them newest-first for content the matcher
//! accepts. Every failure mode is folded into a [`FetchOutcome`] - the
//! engine never returns an error and never panics, so a dispatch handler
//! can always render something.
//!
//! # Example
//!
//! ```no_run
//! use otp_panel::matcher::CodeMatcher;
//! use otp_panel::{engine, FetchConfig};
//!
//! # async fn example() -> otp_panel::Result<()> {
//! let config = FetchConfig::builder()
//!     .email("user@example.com")
//!     .password("app-password")
//!     .build()?;
//!
//! let outcome = engine::fetch_code(&config, &CodeMatcher::six_digit()).await;
//! println!("{}", outcome.render());
//! # Ok(())
//! # }
//! ```

use crate::config::FetchConfig;
use crate::connection;
use crate::error::{Error, Result};
use crate::matcher::Matcher;
use crate::parser::{self, BodyText};
use crate::session::{self, AuthConfig, ImapSession};
use futures::StreamExt;
use tracing::{debug, instrument, warn};

/// The outcome of one code-retrieval run.
///
/// Exactly one of these is produced per [`fetch_code`] call; all of them
/// render to plain text suitable for a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A code was extracted from the mailbox.
    Code(String),
    /// The mailbox was reachable but no message in the scanned window
    /// contained a matching token. Not an error.
    NotFound,
    /// The mailbox was reachable but empty. Not an error.
    NoMessages,
    /// Something in the connect/auth/select/search/fetch sequence failed;
    /// the reason is already formatted for display.
    Failed(String),
}

impl FetchOutcome {
    /// Returns `true` if a code was extracted.
    #[must_use]
    pub fn is_code(&self) -> bool {
        matches!(self, FetchOutcome::Code(_))
    }

    /// Renders the outcome as plain display text.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            FetchOutcome::Code(code) => code.clone(),
            FetchOutcome::NotFound => "Code not found (check the spam folder)".to_string(),
            FetchOutcome::NoMessages => "No messages in the mailbox".to_string(),
            FetchOutcome::Failed(reason) => format!("Connection error: {reason}"),
        }
    }
}

impl std::fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Retrieves a verification code from the configured mailbox.
///
/// Runs one bounded attempt against the configured host. If that attempt
/// does not produce a code and the config carries a
/// [`fallback_host`](FetchConfig::fallback_host) different from the host
/// just tried, the whole sequence runs once more against the fallback; a
/// code from the fallback wins, any other fallback outcome is discarded so
/// the user sees the result from their own provider.
///
/// Never returns an error - see [`FetchOutcome`].
#[instrument(
    name = "engine::fetch_code",
    skip_all,
    fields(
        email = %config.email(),
        imap_host = %config.effective_imap_host(),
        matcher = %matcher.description()
    )
)]
pub async fn fetch_code(config: &FetchConfig, matcher: &dyn Matcher) -> FetchOutcome {
    let primary = run_attempt(config, matcher).await;
    if primary.is_code() {
        return primary;
    }

    if let Some(fallback) = &config.fallback_host {
        if *fallback != config.effective_imap_host() {
            // This re-sends the account's credentials to a fixed third-party
            // host; deployments that cannot accept that disable the fallback.
            warn!(
                fallback_host = %fallback,
                primary_outcome = ?primary,
                "Primary host yielded no code, retrying against fallback host"
            );

            let retry_config = config.with_host(fallback.clone());
            let retry = run_attempt(&retry_config, matcher).await;
            if retry.is_code() {
                return retry;
            }
        }
    }

    primary
}

/// One full connect/scan attempt, with every error folded into an outcome.
async fn run_attempt(config: &FetchConfig, matcher: &dyn Matcher) -> FetchOutcome {
    match try_attempt(config, matcher).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(
                error = %e,
                category = %e.category(),
                imap_host = %config.effective_imap_host(),
                "Code retrieval attempt failed"
            );
            FetchOutcome::Failed(e.to_string())
        }
    }
}

/// The fallible body of one attempt.
async fn try_attempt(config: &FetchConfig, matcher: &dyn Matcher) -> Result<FetchOutcome> {
    let mut session = open_session(config).await?;

    let outcome = scan_mailbox(&mut session, config, matcher).await;

    // Best-effort logout; the scan result stands either way.
    if let Ok(Err(e)) =
        tokio::time::timeout(config.timeouts.logout, session::logout(&mut session)).await
    {
        debug!(error = %e, "Logout failed after scan");
    }

    outcome
}

/// Connects, authenticates, and selects INBOX, each step bounded by its
/// configured timeout.
async fn open_session(config: &FetchConfig) -> Result<ImapSession> {
    let imap_host = config.effective_imap_host();
    let target_addr = config.server_address();
    let timeouts = &config.timeouts;

    let tls_stream = tokio::time::timeout(
        timeouts.connect,
        connection::establish_tls_connection(&imap_host, &target_addr),
    )
    .await
    .map_err(|_| Error::ConnectTimeout {
        target: target_addr.clone(),
        timeout: timeouts.connect,
    })??;

    debug!("TLS connection established");

    let auth_config = AuthConfig {
        email: config.email(),
        password: config.password(),
    };

    // Authentication failure is surfaced, never retried within the attempt
    let mut session = tokio::time::timeout(
        timeouts.auth,
        session::authenticate(tls_stream, &auth_config),
    )
    .await
    .map_err(|_| Error::AuthTimeout {
        email: config.email().to_string(),
        timeout: timeouts.auth,
    })??;

    debug!("Authenticated");

    tokio::time::timeout(
        timeouts.select,
        session::select_mailbox(&mut session, "INBOX"),
    )
    .await
    .map_err(|_| Error::SelectTimeout {
        mailbox: "INBOX".to_string(),
        timeout: timeouts.select,
    })??;

    debug!("Selected INBOX");

    Ok(session)
}

/// Scans the newest messages of the selected mailbox for a match.
async fn scan_mailbox(
    session: &mut ImapSession,
    config: &FetchConfig,
    matcher: &dyn Matcher,
) -> Result<FetchOutcome> {
    let uids = tokio::time::timeout(config.timeouts.search, session::search_all_uids(session))
        .await
        .map_err(|_| Error::SearchTimeout {
            timeout: config.timeouts.search,
        })??;

    let order = scan_order(&uids, config.scan_window);
    if order.is_empty() {
        return Ok(FetchOutcome::NoMessages);
    }

    for uid in order {
        // The bound covers both issuing the fetch and draining its
        // response stream
        let texts = tokio::time::timeout(
            config.timeouts.message_fetch,
            fetch_message_texts(session, uid),
        )
        .await
        .map_err(|_| Error::FetchTimeout {
            uid,
            timeout: config.timeouts.message_fetch,
        })??;

        for text in texts {
            if let Some(found) = matcher.find_match(&text) {
                debug!(
                    uid,
                    matcher = %matcher.description(),
                    "Found match, stopping scan"
                );
                return Ok(FetchOutcome::Code(found.into_owned()));
            }
        }
    }

    Ok(FetchOutcome::NotFound)
}

/// Fetches one message's content and drains the response stream into
/// scannable texts (servers may answer a single-UID fetch with zero or
/// more items).
async fn fetch_message_texts(session: &mut ImapSession, uid: u32) -> Result<Vec<String>> {
    let mut fetch_stream = session::fetch_message_by_uid(session, uid).await?;

    let mut texts = Vec::new();
    while let Some(message_result) = fetch_stream.next().await {
        let message = message_result.map_err(|source| Error::FetchMessage { source })?;

        match parser::extract_message_text(&message) {
            BodyText::Text(text) => texts.push(text),
            BodyText::ParseError => {
                // Logged in parser; move on to the next message
            }
        }
    }

    Ok(texts)
}

/// Newest-first scan order: at most `window` of the highest UIDs.
///
/// `uids` must be sorted ascending, as [`session::search_all_uids`]
/// returns them. An empty result means an empty mailbox.
fn scan_order(uids: &[u32], window: usize) -> Vec<u32> {
    uids[uids.len().saturating_sub(window)..]
        .iter()
        .rev()
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::CodeMatcher;

    #[test]
    fn test_outcome_render() {
        assert_eq!(FetchOutcome::Code("482913".into()).render(), "482913");
        assert!(FetchOutcome::NotFound.render().contains("not found"));
        assert!(FetchOutcome::NoMessages.render().contains("No messages"));
        assert!(FetchOutcome::Failed("dns error".into())
            .render()
            .contains("dns error"));
    }

    #[test]
    fn test_outcome_is_code() {
        assert!(FetchOutcome::Code("123456".into()).is_code());
        assert!(!FetchOutcome::NotFound.is_code());
        assert!(!FetchOutcome::NoMessages.is_code());
        assert!(!FetchOutcome::Failed("x".into()).is_code());
    }

    #[test]
    fn test_scan_order_newest_first() {
        // Two messages, the older one carrying 111222 and the newer one
        // 333444: the higher uid is scanned first, so its code wins.
        let bodies = [(1_u32, "your code is 111222"), (2, "your code is 333444")];

        let order = scan_order(&[1, 2], 15);
        assert_eq!(order, vec![2, 1]);

        let matcher = CodeMatcher::six_digit();
        let first = order.iter().find_map(|uid| {
            let (_, body) = bodies.iter().find(|(u, _)| u == uid).unwrap();
            matcher.find_match(body).map(|m| m.into_owned())
        });
        assert_eq!(first.as_deref(), Some("333444"));
    }

    #[test]
    fn test_scan_order_window_takes_highest_uids() {
        let uids: Vec<u32> = (1..=20).collect();
        let order = scan_order(&uids, 15);

        assert_eq!(order.len(), 15);
        assert_eq!(order.first(), Some(&20));
        assert_eq!(order.last(), Some(&6));
    }

    #[test]
    fn test_scan_order_empty_mailbox() {
        // No uids at all maps to NoMessages, never Failed; the scan loop
        // sees an empty order and short-circuits.
        assert!(scan_order(&[], 15).is_empty());
        assert!(scan_order(&[], 0).is_empty());
    }

    #[tokio::test]
    async fn test_stalled_server_bounded_by_timeout() {
        use tokio::net::TcpListener;

        // Accepts the TCP connection but never speaks TLS; the attempt
        // must fail within its stage bound instead of hanging.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hold = tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        });

        let config = FetchConfig::builder()
            .email("user@example.com")
            .password("secret")
            .imap_host("127.0.0.1")
            .imap_port(port)
            .connect_timeout(std::time::Duration::from_secs(1))
            .fallback_host(None)
            .build()
            .unwrap();

        let start = std::time::Instant::now();
        let outcome = fetch_code(&config, &CodeMatcher::six_digit()).await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert!(start.elapsed() < std::time::Duration::from_secs(5));

        hold.abort();
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_failed_not_error() {
        // Loopback port that nothing listens on; both the primary attempt
        // and any fallback must fold into Failed, never panic or Err.
        let config = FetchConfig::builder()
            .email("user@example.com")
            .password("secret")
            .imap_host("127.0.0.1")
            .imap_port(1)
            .connect_timeout(std::time::Duration::from_secs(2))
            .fallback_host(None)
            .build()
            .unwrap();

        let outcome = fetch_code(&config, &CodeMatcher::six_digit()).await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_fallback_skipped_when_same_as_primary() {
        // fallback == effective host: only one attempt should run; with an
        // unreachable host that still means a single Failed outcome.
        let config = FetchConfig::builder()
            .email("user@example.com")
            .password("secret")
            .imap_host("127.0.0.1")
            .imap_port(1)
            .connect_timeout(std::time::Duration::from_secs(2))
            .fallback_host(Some("127.0.0.1".into()))
            .build()
            .unwrap();

        let start = std::time::Instant::now();
        let outcome = fetch_code(&config, &CodeMatcher::six_digit()).await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        // A second attempt would have doubled the elapsed time
        assert!(start.elapsed() < std::time::Duration::from_secs(4));
    }
}
