//! IMAP server resolution from email domains.
//!
//! Maps an email address to the `(host, port)` pair its mailbox lives on:
//! known providers come from a static table (including regional alias
//! domains that all point at one canonical host), everything else falls
//! back to `imap.{domain}` on port 993.
//!
//! # Example
//!
//! ```
//! use otp_panel::resolver::{HostResolver, resolve_imap_host};
//!
//! assert_eq!(resolve_imap_host("user@gmail.com"), ("imap.gmail.com".into(), 993));
//!
//! // Create a custom resolver for your application
//! let mut resolver = HostResolver::with_defaults();
//! resolver.register("mycompany.com", "mail.mycompany.com");
//! assert_eq!(resolver.resolve("user@mycompany.com").0, "mail.mycompany.com");
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

/// Default IMAPS port.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Map of email domains to their IMAP server hostnames.
static KNOWN_SERVERS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // FirstMail network - many storefront domains, one underlying provider
    m.insert("firstmail.ltd", "imap.firstmail.ltd");
    m.insert("consfml.com", "imap.firstmail.ltd");
    m.insert("ferstmail.com", "imap.firstmail.ltd");
    m.insert("tubermail.com", "imap.firstmail.ltd");

    // Google
    m.insert("gmail.com", "imap.gmail.com");

    // Microsoft
    m.insert("hotmail.com", "imap-mail.outlook.com");
    m.insert("outlook.com", "imap-mail.outlook.com");
    m.insert("live.com", "imap-mail.outlook.com");

    // Apple
    m.insert("icloud.com", "imap.mail.me.com");
    m.insert("me.com", "imap.mail.me.com");
    m.insert("mac.com", "imap.mail.me.com");

    // Yahoo
    m.insert("yahoo.com", "imap.mail.yahoo.com");

    // Mail.ru network
    m.insert("mail.ru", "imap.mail.ru");
    m.insert("internet.ru", "imap.mail.ru");
    m.insert("bk.ru", "imap.mail.ru");
    m.insert("inbox.ru", "imap.mail.ru");
    m.insert("list.ru", "imap.mail.ru");

    // Other Russian providers
    m.insert("rambler.ru", "imap.rambler.ru");
    m.insert("yandex.ru", "imap.yandex.ru");
    m.insert("yandex.com", "imap.yandex.ru");

    m
});

/// Extracts the domain part of an email address, lower-cased.
///
/// The domain is everything after the last `@`; an address with no `@`
/// is treated as being all domain.
fn domain_of(email: &str) -> String {
    email.rsplit('@').next().unwrap_or(email).to_lowercase()
}

/// A customizable resolver for IMAP server discovery.
///
/// Custom mappings added at runtime take precedence over the built-in
/// defaults; unknown domains resolve to `imap.{domain}:993`.
///
/// # Example
///
/// ```
/// use otp_panel::resolver::HostResolver;
///
/// let mut resolver = HostResolver::with_defaults();
/// resolver.register("partner.org", "mail.partner.org");
///
/// assert_eq!(resolver.resolve("user@partner.org").0, "mail.partner.org");
/// assert_eq!(resolver.resolve("user@gmail.com").0, "imap.gmail.com"); // Built-in
/// ```
#[derive(Debug, Clone)]
pub struct HostResolver {
    custom: HashMap<String, String>,
    use_defaults: bool,
}

impl Default for HostResolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HostResolver {
    /// Creates an empty resolver without built-in defaults.
    ///
    /// Use [`Self::with_defaults`] if you want the standard provider table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            custom: HashMap::new(),
            use_defaults: false,
        }
    }

    /// Creates a resolver that includes the built-in provider table.
    ///
    /// Custom mappings added via [`Self::register`] override defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            custom: HashMap::new(),
            use_defaults: true,
        }
    }

    /// Registers a custom domain-to-IMAP-host mapping.
    ///
    /// Overrides any existing mapping, including built-in defaults.
    pub fn register(&mut self, domain: impl Into<String>, imap_host: impl Into<String>) {
        self.custom
            .insert(domain.into().to_lowercase(), imap_host.into());
    }

    /// Registers multiple domain mappings at once.
    pub fn register_many<I, D, H>(&mut self, mappings: I)
    where
        I: IntoIterator<Item = (D, H)>,
        D: Into<String>,
        H: Into<String>,
    {
        for (domain, host) in mappings {
            self.register(domain, host);
        }
    }

    /// Removes a custom mapping. Built-in defaults are unaffected.
    pub fn unregister(&mut self, domain: &str) -> Option<String> {
        self.custom.remove(&domain.to_lowercase())
    }

    /// Resolves the IMAP `(host, port)` for an email address.
    ///
    /// Resolution order:
    /// 1. Custom mappings (added via [`Self::register`])
    /// 2. Built-in defaults (if [`Self::with_defaults`] was used)
    /// 3. Fallback to `imap.{domain}`
    ///
    /// Always port 993; per-provider ports can be layered on top by
    /// registering a custom mapping and storing the port alongside.
    #[must_use]
    pub fn resolve(&self, email: &str) -> (String, u16) {
        let domain = domain_of(email);

        if let Some(host) = self.custom.get(&domain) {
            return (host.clone(), DEFAULT_IMAP_PORT);
        }

        if self.use_defaults {
            if let Some(&host) = KNOWN_SERVERS.get(domain.as_str()) {
                return (host.to_string(), DEFAULT_IMAP_PORT);
            }
        }

        (format!("imap.{domain}"), DEFAULT_IMAP_PORT)
    }

    /// Returns `true` if the domain has a known IMAP server mapping.
    #[must_use]
    pub fn is_known(&self, domain: &str) -> bool {
        let domain_lower = domain.to_lowercase();
        self.custom.contains_key(&domain_lower)
            || (self.use_defaults && KNOWN_SERVERS.contains_key(domain_lower.as_str()))
    }
}

/// Resolves the IMAP `(host, port)` for an email address using the
/// built-in provider table.
///
/// # Example
///
/// ```
/// use otp_panel::resolver::resolve_imap_host;
///
/// assert_eq!(resolve_imap_host("user@gmail.com"), ("imap.gmail.com".into(), 993));
/// assert_eq!(resolve_imap_host("user@custom.org"), ("imap.custom.org".into(), 993));
/// ```
#[must_use]
pub fn resolve_imap_host(email: &str) -> (String, u16) {
    let domain = domain_of(email);

    let host = KNOWN_SERVERS
        .get(domain.as_str())
        .map_or_else(|| format!("imap.{domain}"), |&s| s.to_string());

    (host, DEFAULT_IMAP_PORT)
}
