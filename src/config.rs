//! Configuration for the code-retrieval engine.
//!
//! Use [`FetchConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use otp_panel::FetchConfig;
//!
//! let config = FetchConfig::builder()
//!     .email("user@example.com")
//!     .password("app-password")
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{Error, Result};
use crate::resolver::{HostResolver, DEFAULT_IMAP_PORT};
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// The canonical FirstMail host used as the last-resort retry target.
///
/// Many throwaway-mail storefront domains are fronts for this one provider;
/// its canonical host is more reliable than the per-domain `imap.{domain}`
/// guess. See [`FetchConfigBuilder::fallback_host`] for the security caveat.
pub const DEFAULT_FALLBACK_HOST: &str = "imap.firstmail.ltd";

/// Default number of newest messages scanned per attempt.
pub const DEFAULT_SCAN_WINDOW: usize = 15;

/// Configuration for one mailbox code-retrieval run.
///
/// Create using [`FetchConfig::builder()`].
///
/// Note: the `password` field is stored as a [`SecretString`] to prevent
/// accidental logging of credentials. The `email` field is stored as a
/// validated [`EmailAddress`].
#[derive(Clone)]
pub struct FetchConfig {
    /// Email address (used for login and IMAP server resolution).
    email: EmailAddress,
    /// Email password or app-specific password (protected from accidental logging).
    password: SecretString,
    /// IMAP server hostname (resolved from the email domain if not set).
    pub imap_host: Option<String>,
    /// IMAP server port (default: 993 for IMAPS).
    pub imap_port: u16,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
    /// How many of the newest messages to scan, newest-first.
    pub scan_window: usize,
    /// Host to retry against once if the stored host yields no code.
    /// `None` disables the fallback attempt.
    pub fallback_host: Option<String>,
}

impl std::fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchConfig")
            .field("email", &self.email.as_str())
            .field("password", &"[REDACTED]")
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .field("timeouts", &self.timeouts)
            .field("scan_window", &self.scan_window)
            .field("fallback_host", &self.fallback_host)
            .finish()
    }
}

impl FetchConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::default()
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns a reference to the validated email address.
    #[must_use]
    pub fn email_address(&self) -> &EmailAddress {
        &self.email
    }

    /// Returns the password as a string slice.
    ///
    /// The password is intentionally not directly accessible to prevent
    /// accidental logging.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the effective IMAP host, either explicitly configured or
    /// resolved from the email domain.
    #[must_use]
    pub fn effective_imap_host(&self) -> String {
        if let Some(host) = &self.imap_host {
            host.clone()
        } else {
            crate::resolver::resolve_imap_host(self.email.as_str()).0
        }
    }

    /// Returns the full IMAP server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.effective_imap_host(), self.imap_port)
    }

    /// Returns a copy of this configuration pointed at a different host.
    ///
    /// Used by the engine for the fallback attempt; everything except the
    /// host (and the now-moot fallback) is preserved.
    #[must_use]
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self {
            imap_host: Some(host.into()),
            fallback_host: None,
            ..self.clone()
        }
    }
}

/// Timeout configuration for the retrieval sequence.
///
/// Each stage of an attempt is bounded separately; there is no single
/// whole-attempt deadline, so the worst case is the sum of these.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for IMAP authentication.
    pub auth: Duration,
    /// Timeout for selecting a mailbox.
    pub select: Duration,
    /// Timeout for searching the mailbox.
    pub search: Duration,
    /// Timeout for fetching one message's content.
    pub message_fetch: Duration,
    /// Timeout for logout operation.
    pub logout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            auth: Duration::from_secs(15),
            select: Duration::from_secs(10),
            search: Duration::from_secs(10),
            message_fetch: Duration::from_secs(20),
            logout: Duration::from_secs(5),
        }
    }
}

/// Validates an email address format.
fn validate_email(email: &str) -> Result<EmailAddress> {
    EmailAddress::parse_with_options(email, email_address::Options::default()).map_err(|_| {
        Error::InvalidEmailFormat {
            email: email.to_string(),
        }
    })
}

/// Builder for [`FetchConfig`].
#[derive(Debug, Default)]
pub struct FetchConfigBuilder {
    email: Option<String>,
    password: Option<String>,
    imap_host: Option<String>,
    imap_port: Option<u16>,
    timeouts: Option<TimeoutConfig>,
    scan_window: Option<usize>,
    fallback_host: Option<Option<String>>,
    resolver: Option<HostResolver>,
}

impl FetchConfigBuilder {
    /// Sets the email address (required).
    ///
    /// The email domain is used to resolve the IMAP server if no explicit
    /// host is set.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the password (required).
    ///
    /// For Gmail/Outlook, use an app-specific password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the IMAP server hostname explicitly.
    ///
    /// If not set, the server is resolved from the email domain.
    #[must_use]
    pub fn imap_host(mut self, host: impl Into<String>) -> Self {
        self.imap_host = Some(host.into());
        self
    }

    /// Sets the IMAP server port.
    ///
    /// Default is 993 (IMAPS with TLS).
    #[must_use]
    pub fn imap_port(mut self, port: u16) -> Self {
        self.imap_port = Some(port);
        self
    }

    /// Sets a custom resolver for IMAP host discovery.
    ///
    /// The resolver is consulted during [`build()`](Self::build) when no
    /// explicit [`imap_host`](Self::imap_host) is set.
    #[must_use]
    pub fn resolver(mut self, resolver: HostResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets the authentication timeout.
    #[must_use]
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .auth = timeout;
        self
    }

    /// Sets how many of the newest messages are scanned per attempt.
    ///
    /// Default is [`DEFAULT_SCAN_WINDOW`].
    #[must_use]
    pub fn scan_window(mut self, window: usize) -> Self {
        self.scan_window = Some(window);
        self
    }

    /// Sets (or disables, with `None`) the fallback host retried once when
    /// the stored host yields no code.
    ///
    /// Defaults to [`DEFAULT_FALLBACK_HOST`]. Be aware that a fallback
    /// attempt sends the account's credentials to that host even when the
    /// account's real provider is unrelated; pass `None` if that is not
    /// acceptable for your deployment.
    #[must_use]
    pub fn fallback_host(mut self, host: Option<String>) -> Self {
        self.fallback_host = Some(host);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or invalid.
    pub fn build(self) -> Result<FetchConfig> {
        let email_raw = self.email.ok_or_else(|| Error::InvalidConfig {
            message: "email is required".into(),
        })?;

        let email = validate_email(&email_raw)?;

        let password_raw = self.password.ok_or_else(|| Error::InvalidConfig {
            message: "password is required".into(),
        })?;

        // Resolve IMAP host: explicit > custom resolver > default resolution
        let imap_host = self.imap_host.or_else(|| {
            self.resolver
                .map(|resolver| resolver.resolve(email.as_str()).0)
        });

        Ok(FetchConfig {
            email,
            password: SecretString::from(password_raw),
            imap_host,
            imap_port: self.imap_port.unwrap_or(DEFAULT_IMAP_PORT),
            timeouts: self.timeouts.unwrap_or_default(),
            scan_window: self.scan_window.unwrap_or(DEFAULT_SCAN_WINDOW),
            fallback_host: self
                .fallback_host
                .unwrap_or_else(|| Some(DEFAULT_FALLBACK_HOST.to_string())),
        })
    }
}
