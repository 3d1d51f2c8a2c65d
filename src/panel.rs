//! Transport-agnostic dispatch and panel rendering.
//!
//! The chat transport (message delivery, keyboards, editing) lives outside
//! this crate. What lives here is the logical surface: an [`Action`] for
//! every user gesture, a [`Dispatcher`] that executes it against the store
//! and the retrieval engine, and a [`Panel`] - plain text plus labelled
//! buttons carrying action strings - as the only output type. A transport
//! adapter turns callback payloads into `Action`s with [`Action::parse`]
//! and renders panels however its platform renders menus.
//!
//! # Example
//!
//! ```no_run
//! use otp_panel::panel::{Action, Dispatcher};
//! use otp_panel::store::AccountStore;
//!
//! # async fn example() -> otp_panel::Result<()> {
//! let store = AccountStore::open_in_memory().await?;
//! let dispatcher = Dispatcher::new(store);
//!
//! let panel = dispatcher.handle(42, Action::Start).await?;
//! println!("{}", panel.text);
//! # Ok(())
//! # }
//! ```

use crate::batch::{self, LineResult};
use crate::config::{FetchConfig, TimeoutConfig, DEFAULT_FALLBACK_HOST, DEFAULT_SCAN_WINDOW};
use crate::engine::{self, FetchOutcome};
use crate::error::Result;
use crate::matcher::CodeMatcher;
use crate::resolver::HostResolver;
use crate::store::{Account, AccountStore, NewAccount};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Records shown per list page.
pub const PAGE_SIZE: usize = 10;

/// A logical user action, decoupled from any chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Initial command; shows the main menu.
    Start,
    /// Return to the main menu.
    Home,
    /// Show the batch-add instructions.
    OpenAddForm,
    /// Free-text batch submission (newline-separated pipe-delimited lines).
    SubmitBatch(String),
    /// Show one page of the user's records.
    List {
        /// Zero-based page number.
        page: usize,
    },
    /// Show one record's details.
    View {
        /// Record id.
        id: i64,
        /// List page to return to.
        page: usize,
    },
    /// Connect to the record's mailbox and extract a code.
    FetchCode {
        /// Record id.
        id: i64,
        /// List page to return to.
        page: usize,
    },
    /// Delete one record.
    Delete {
        /// Record id.
        id: i64,
        /// List page to re-render.
        page: usize,
    },
    /// Delete every record of the acting user.
    DeleteAll {
        /// `false` asks for confirmation; `true` performs the wipe.
        confirmed: bool,
    },
}

impl Action {
    /// Parses a compact callback string back into an action.
    ///
    /// Returns `None` for anything that does not round-trip; transports
    /// should treat that as a stale button and ignore it.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.split(':');
        let head = parts.next()?;

        let action = match head {
            "start" => Action::Start,
            "home" => Action::Home,
            "add" => Action::OpenAddForm,
            "list" => Action::List {
                page: parts.next()?.parse().ok()?,
            },
            "view" => Action::View {
                id: parts.next()?.parse().ok()?,
                page: parts.next()?.parse().ok()?,
            },
            "code" => Action::FetchCode {
                id: parts.next()?.parse().ok()?,
                page: parts.next()?.parse().ok()?,
            },
            "del" => Action::Delete {
                id: parts.next()?.parse().ok()?,
                page: parts.next()?.parse().ok()?,
            },
            "wipe" => Action::DeleteAll {
                confirmed: parts.next() == Some("confirm"),
            },
            _ => return None,
        };

        // Trailing junk means a malformed payload
        if parts.next().is_some() {
            return None;
        }

        Some(action)
    }

    /// Encodes the action as a compact callback string.
    ///
    /// Returns `None` for [`Action::SubmitBatch`], which arrives as free
    /// text rather than a button press.
    #[must_use]
    pub fn callback_data(&self) -> Option<String> {
        let data = match self {
            Action::Start => "start".to_string(),
            Action::Home => "home".to_string(),
            Action::OpenAddForm => "add".to_string(),
            Action::SubmitBatch(_) => return None,
            Action::List { page } => format!("list:{page}"),
            Action::View { id, page } => format!("view:{id}:{page}"),
            Action::FetchCode { id, page } => format!("code:{id}:{page}"),
            Action::Delete { id, page } => format!("del:{id}:{page}"),
            Action::DeleteAll { confirmed: false } => "wipe".to_string(),
            Action::DeleteAll { confirmed: true } => "wipe:confirm".to_string(),
        };
        Some(data)
    }
}

/// One labelled button carrying its action's callback string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label.
    pub label: String,
    /// Callback payload, as produced by [`Action::callback_data`].
    pub action: String,
}

impl Button {
    fn new(label: impl Into<String>, action: &Action) -> Self {
        Self {
            label: label.into(),
            action: action
                .callback_data()
                .expect("buttons only carry encodable actions"),
        }
    }
}

/// A rendered panel: text plus rows of buttons.
///
/// Deliberately plain - no transport types leak through here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    /// Display text.
    pub text: String,
    /// Button rows, outer vec = rows.
    pub keyboard: Vec<Vec<Button>>,
}

/// Session-scoped association from user id to the id of the last panel
/// message rendered for that user.
///
/// The transport uses this to decide between editing the previous panel
/// and sending a fresh one. Reads and writes happen within one handler
/// invocation; rapid concurrent actions from the same user race with
/// last-write-wins semantics, which is acceptable for this tool.
#[derive(Debug, Default)]
pub struct PanelTracker {
    last_panel: HashMap<i64, i64>,
}

impl PanelTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last panel message id rendered for the user, if any.
    #[must_use]
    pub fn last_panel(&self, user_id: i64) -> Option<i64> {
        self.last_panel.get(&user_id).copied()
    }

    /// Records the message id of the panel just rendered for the user.
    pub fn record(&mut self, user_id: i64, message_id: i64) {
        self.last_panel.insert(user_id, message_id);
    }

    /// Forgets the user's panel (e.g. after the transport failed to edit it).
    pub fn forget(&mut self, user_id: i64) -> Option<i64> {
        self.last_panel.remove(&user_id)
    }
}

/// Executes [`Action`]s against the store and the retrieval engine,
/// producing a [`Panel`] for every action.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: AccountStore,
    resolver: HostResolver,
    fetch_timeouts: TimeoutConfig,
    scan_window: usize,
    fallback_host: Option<String>,
    page_size: usize,
}

impl Dispatcher {
    /// Creates a dispatcher with default resolution, timeouts, and paging.
    #[must_use]
    pub fn new(store: AccountStore) -> Self {
        Self {
            store,
            resolver: HostResolver::with_defaults(),
            fetch_timeouts: TimeoutConfig::default(),
            scan_window: DEFAULT_SCAN_WINDOW,
            fallback_host: Some(DEFAULT_FALLBACK_HOST.to_string()),
            page_size: PAGE_SIZE,
        }
    }

    /// Replaces the host resolver used at record-creation time.
    #[must_use]
    pub fn with_resolver(mut self, resolver: HostResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the retrieval timeout configuration.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.fetch_timeouts = timeouts;
        self
    }

    /// Sets (or disables) the fallback host for code retrieval.
    #[must_use]
    pub fn with_fallback_host(mut self, host: Option<String>) -> Self {
        self.fallback_host = host;
        self
    }

    /// Overrides the list page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        assert!(page_size > 0, "page_size must be > 0");
        self.page_size = page_size;
        self
    }

    /// Executes one action for one user and renders the resulting panel.
    ///
    /// # Errors
    ///
    /// Only storage failures surface as errors (the outer dispatch
    /// framework owns those); mailbox problems are rendered into the
    /// panel text instead.
    #[instrument(name = "Dispatcher::handle", skip(self, action))]
    pub async fn handle(&self, user_id: i64, action: Action) -> Result<Panel> {
        match action {
            Action::Start | Action::Home => Ok(self.main_menu()),
            Action::OpenAddForm => Ok(self.add_form()),
            Action::SubmitBatch(text) => self.submit_batch(user_id, &text).await,
            Action::List { page } => self.list_page(user_id, page).await,
            Action::View { id, page } => self.view_record(id, page).await,
            Action::FetchCode { id, page } => self.fetch_code_for(id, page).await,
            Action::Delete { id, page } => self.delete_record(user_id, id, page).await,
            Action::DeleteAll { confirmed } => self.delete_all(user_id, confirmed).await,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Panels
    // ─────────────────────────────────────────────────────────────────────────

    fn main_menu(&self) -> Panel {
        Panel {
            text: "Account panel\n\nChoose an action:".to_string(),
            keyboard: vec![
                vec![Button::new("Add accounts", &Action::OpenAddForm)],
                vec![Button::new("My accounts", &Action::List { page: 0 })],
            ],
        }
    }

    fn add_form(&self) -> Panel {
        Panel {
            text: "Adding accounts\n\n\
                   Send the records, one per line:\n\
                   email|emailPassword|username|servicePassword\n\
                   (optionally |country|auth at the end)"
                .to_string(),
            keyboard: vec![vec![Button::new("Back to menu", &Action::Home)]],
        }
    }

    async fn submit_batch(&self, user_id: i64, text: &str) -> Result<Panel> {
        let results = batch::parse_batch(text);
        let summary = batch::summarize(&results);

        for result in results {
            if let LineResult::Parsed(creds) = result {
                // Host/port are resolved once, here, and stored with the
                // record; the engine's runtime fallback is separate.
                let (imap_host, imap_port) = self.resolver.resolve(&creds.email);
                self.store
                    .insert(NewAccount {
                        user_id,
                        email: creds.email,
                        mail_password: creds.mail_password,
                        username: creds.username,
                        service_password: creds.service_password,
                        country: creds.country,
                        auth: creds.auth,
                        imap_host,
                        imap_port,
                    })
                    .await?;
            }
        }

        debug!(
            user_id,
            added = summary.added,
            rejected = summary.rejected,
            "Processed batch submission"
        );

        let text = if summary.rejected == 0 {
            format!("Added: {}", summary.added)
        } else {
            format!("Added: {} (skipped {} malformed lines)", summary.added, summary.rejected)
        };

        Ok(Panel {
            text,
            keyboard: vec![
                vec![Button::new("My accounts", &Action::List { page: 0 })],
                vec![Button::new("Back to menu", &Action::Home)],
            ],
        })
    }

    async fn list_page(&self, user_id: i64, page: usize) -> Result<Panel> {
        let accounts = self.store.list_for_user(user_id).await?;

        if accounts.is_empty() {
            return Ok(Panel {
                text: "You have no saved accounts yet.".to_string(),
                keyboard: vec![
                    vec![Button::new("Add accounts", &Action::OpenAddForm)],
                    vec![Button::new("Back to menu", &Action::Home)],
                ],
            });
        }

        let page_count = accounts.len().div_ceil(self.page_size);
        let page = page.min(page_count - 1);
        let start = page * self.page_size;
        let current = &accounts[start..(start + self.page_size).min(accounts.len())];

        let mut keyboard: Vec<Vec<Button>> = Vec::new();
        for (offset, account) in current.iter().enumerate() {
            keyboard.push(vec![Button::new(
                format!("{}. {}", start + offset + 1, account.username),
                &Action::View {
                    id: account.id,
                    page,
                },
            )]);
        }

        let mut nav = Vec::new();
        if page > 0 {
            nav.push(Button::new("Prev", &Action::List { page: page - 1 }));
        }
        if page + 1 < page_count {
            nav.push(Button::new("Next", &Action::List { page: page + 1 }));
        }
        if !nav.is_empty() {
            keyboard.push(nav);
        }

        keyboard.push(vec![Button::new(
            "Delete all",
            &Action::DeleteAll { confirmed: false },
        )]);
        keyboard.push(vec![Button::new("Back to menu", &Action::Home)]);

        Ok(Panel {
            text: format!(
                "Your accounts ({} total, page {} of {})",
                accounts.len(),
                page + 1,
                page_count
            ),
            keyboard,
        })
    }

    async fn view_record(&self, id: i64, page: usize) -> Result<Panel> {
        let Some(account) = self.store.get(id).await? else {
            return Ok(self.record_gone(page));
        };

        Ok(Panel {
            text: render_record(&account),
            keyboard: vec![
                vec![Button::new("Fetch code", &Action::FetchCode { id, page })],
                vec![Button::new("Delete", &Action::Delete { id, page })],
                vec![Button::new("Back to list", &Action::List { page })],
            ],
        })
    }

    async fn fetch_code_for(&self, id: i64, page: usize) -> Result<Panel> {
        let Some(account) = self.store.get(id).await? else {
            return Ok(self.record_gone(page));
        };

        let outcome = self.run_engine(&account).await;

        Ok(Panel {
            text: format!(
                "{}\nMailbox: {}\n\nResult: {}",
                account.username,
                account.email,
                outcome.render()
            ),
            keyboard: vec![vec![Button::new("Back", &Action::View { id, page })]],
        })
    }

    /// Builds the engine config from a stored record and runs one retrieval.
    ///
    /// A record whose stored email no longer validates produces a `Failed`
    /// outcome rather than aborting the interaction.
    async fn run_engine(&self, account: &Account) -> FetchOutcome {
        let config = FetchConfig::builder()
            .email(&account.email)
            .password(&account.mail_password)
            .imap_host(&account.imap_host)
            .imap_port(account.imap_port)
            .timeouts(self.fetch_timeouts.clone())
            .scan_window(self.scan_window)
            .fallback_host(self.fallback_host.clone())
            .build();

        match config {
            Ok(config) => engine::fetch_code(&config, &CodeMatcher::six_digit()).await,
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }

    async fn delete_record(&self, user_id: i64, id: i64, page: usize) -> Result<Panel> {
        let removed = self.store.delete(id).await?;
        debug!(user_id, id, removed, "Delete requested");

        // Back to the (possibly shrunken) list either way
        self.list_page(user_id, page).await
    }

    async fn delete_all(&self, user_id: i64, confirmed: bool) -> Result<Panel> {
        if !confirmed {
            let count = self.store.count_for_user(user_id).await?;
            return Ok(Panel {
                text: format!("Delete ALL {count} of your saved accounts? This cannot be undone."),
                keyboard: vec![vec![
                    Button::new("Yes, delete all", &Action::DeleteAll { confirmed: true }),
                    Button::new("Cancel", &Action::Home),
                ]],
            });
        }

        let removed = self.store.delete_all_for(user_id).await?;
        debug!(user_id, removed, "Wiped user records");

        Ok(Panel {
            text: format!("Removed {removed} accounts."),
            keyboard: vec![vec![Button::new("Back to menu", &Action::Home)]],
        })
    }

    fn record_gone(&self, page: usize) -> Panel {
        Panel {
            text: "That record no longer exists.".to_string(),
            keyboard: vec![vec![Button::new("Back to list", &Action::List { page })]],
        }
    }
}

fn render_record(account: &Account) -> String {
    let mut text = format!(
        "Account: {}\n\nEmail: {}\nService password: {}\nIMAP: {}:{}",
        account.username,
        account.email,
        account.service_password,
        account.imap_host,
        account.imap_port
    );
    if let Some(country) = &account.country {
        text.push_str(&format!("\nCountry: {country}"));
    }
    if let Some(auth) = &account.auth {
        text.push_str(&format!("\nAuth: {auth}"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─────────────────────────────────────────────────────────────────────────
    // Action encoding
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_action_round_trip() {
        let actions = [
            Action::Start,
            Action::Home,
            Action::OpenAddForm,
            Action::List { page: 3 },
            Action::View { id: 12, page: 0 },
            Action::FetchCode { id: 7, page: 2 },
            Action::Delete { id: 9, page: 1 },
            Action::DeleteAll { confirmed: false },
            Action::DeleteAll { confirmed: true },
        ];

        for action in actions {
            let data = action.callback_data().unwrap();
            assert_eq!(Action::parse(&data), Some(action));
        }
    }

    #[test]
    fn test_action_parse_rejects_garbage() {
        assert_eq!(Action::parse(""), None);
        assert_eq!(Action::parse("nonsense"), None);
        assert_eq!(Action::parse("view:& :0"), None);
        assert_eq!(Action::parse("view:1"), None); // missing page
        assert_eq!(Action::parse("list:0:extra"), None); // trailing junk
    }

    #[test]
    fn test_submit_batch_has_no_callback_data() {
        assert!(Action::SubmitBatch("x".into()).callback_data().is_none());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // PanelTracker
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_tracker_last_write_wins() {
        let mut tracker = PanelTracker::new();
        assert_eq!(tracker.last_panel(1), None);

        tracker.record(1, 100);
        tracker.record(1, 101);
        assert_eq!(tracker.last_panel(1), Some(101));

        tracker.record(2, 200);
        assert_eq!(tracker.last_panel(2), Some(200));

        assert_eq!(tracker.forget(1), Some(101));
        assert_eq!(tracker.last_panel(1), None);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatcher flows (in-memory store)
    // ─────────────────────────────────────────────────────────────────────────

    async fn dispatcher() -> Dispatcher {
        let store = AccountStore::open_in_memory().await.unwrap();
        Dispatcher::new(store)
    }

    #[tokio::test]
    async fn test_start_renders_main_menu() {
        let d = dispatcher().await;
        let panel = d.handle(1, Action::Start).await.unwrap();
        assert!(panel.text.contains("Choose an action"));
        assert_eq!(panel.keyboard.len(), 2);
        assert_eq!(panel.keyboard[0][0].action, "add");
        assert_eq!(panel.keyboard[1][0].action, "list:0");
    }

    #[tokio::test]
    async fn test_submit_batch_inserts_and_reports() {
        let d = dispatcher().await;
        let text = "a@gmail.com|mp|alice|sp\nbroken\nb@unknown.tld|mp|bob|sp";
        let panel = d.handle(5, Action::SubmitBatch(text.into())).await.unwrap();

        assert!(panel.text.contains("Added: 2"));
        assert!(panel.text.contains("skipped 1"));

        // Host/port resolved per line and stored
        let accounts = d.store.list_for_user(5).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].imap_host, "imap.gmail.com");
        assert_eq!(accounts[1].imap_host, "imap.unknown.tld");
        assert!(accounts.iter().all(|a| a.imap_port == 993));
    }

    #[tokio::test]
    async fn test_list_empty() {
        let d = dispatcher().await;
        let panel = d.handle(1, Action::List { page: 0 }).await.unwrap();
        assert!(panel.text.contains("no saved accounts"));
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let d = dispatcher().await.with_page_size(2);
        let batch = "a@x.com|m|u1|s\nb@x.com|m|u2|s\nc@x.com|m|u3|s";
        d.handle(1, Action::SubmitBatch(batch.into())).await.unwrap();

        let first = d.handle(1, Action::List { page: 0 }).await.unwrap();
        assert!(first.text.contains("page 1 of 2"));
        // 2 record rows + nav + delete-all + home
        assert_eq!(first.keyboard.len(), 5);
        assert_eq!(first.keyboard[0][0].label, "1. u1");
        assert_eq!(first.keyboard[2][0].label, "Next");

        let second = d.handle(1, Action::List { page: 1 }).await.unwrap();
        assert!(second.text.contains("page 2 of 2"));
        assert_eq!(second.keyboard[0][0].label, "3. u3");
        assert_eq!(second.keyboard[1][0].label, "Prev");

        // Out-of-range pages clamp to the last page
        let clamped = d.handle(1, Action::List { page: 99 }).await.unwrap();
        assert_eq!(clamped.text, second.text);
    }

    #[tokio::test]
    async fn test_view_and_unknown_record() {
        let d = dispatcher().await;
        d.handle(1, Action::SubmitBatch("a@x.com|m|alice|s|DE".into()))
            .await
            .unwrap();
        let id = d.store.list_for_user(1).await.unwrap()[0].id;

        let panel = d.handle(1, Action::View { id, page: 0 }).await.unwrap();
        assert!(panel.text.contains("alice"));
        assert!(panel.text.contains("a@x.com"));
        assert!(panel.text.contains("Country: DE"));
        assert_eq!(panel.keyboard[0][0].action, format!("code:{id}:0"));

        let gone = d.handle(1, Action::View { id: 999, page: 0 }).await.unwrap();
        assert!(gone.text.contains("no longer exists"));
    }

    #[tokio::test]
    async fn test_delete_returns_to_list() {
        let d = dispatcher().await;
        d.handle(1, Action::SubmitBatch("a@x.com|m|u1|s\nb@x.com|m|u2|s".into()))
            .await
            .unwrap();
        let accounts = d.store.list_for_user(1).await.unwrap();

        let panel = d
            .handle(
                1,
                Action::Delete {
                    id: accounts[0].id,
                    page: 0,
                },
            )
            .await
            .unwrap();

        assert!(panel.text.contains("1 total"));
        assert_eq!(d.store.count_for_user(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_all_requires_confirmation() {
        let d = dispatcher().await;
        d.handle(1, Action::SubmitBatch("a@x.com|m|u|s".into()))
            .await
            .unwrap();
        d.handle(2, Action::SubmitBatch("b@x.com|m|v|s".into()))
            .await
            .unwrap();

        let ask = d
            .handle(1, Action::DeleteAll { confirmed: false })
            .await
            .unwrap();
        assert!(ask.text.contains("Delete ALL 1"));
        // Nothing deleted yet
        assert_eq!(d.store.count_for_user(1).await.unwrap(), 1);

        let done = d
            .handle(1, Action::DeleteAll { confirmed: true })
            .await
            .unwrap();
        assert!(done.text.contains("Removed 1"));
        assert_eq!(d.store.count_for_user(1).await.unwrap(), 0);
        // Other users' records stay
        assert_eq!(d.store.count_for_user(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_code_unknown_record() {
        let d = dispatcher().await;
        let panel = d
            .handle(1, Action::FetchCode { id: 404, page: 0 })
            .await
            .unwrap();
        assert!(panel.text.contains("no longer exists"));
    }

    #[tokio::test]
    async fn test_fetch_code_unreachable_host_renders_failure() {
        // The mailbox host is unreachable; the panel still renders, with
        // the failure folded into text.
        let mut resolver = HostResolver::with_defaults();
        resolver.register("x.com", "127.0.0.1");
        let d = dispatcher()
            .await
            .with_resolver(resolver)
            .with_fallback_host(None)
            .with_timeouts(TimeoutConfig {
                connect: std::time::Duration::from_secs(2),
                ..TimeoutConfig::default()
            });
        d.handle(1, Action::SubmitBatch("a@x.com|m|u|s".into()))
            .await
            .unwrap();
        let id = d.store.list_for_user(1).await.unwrap()[0].id;

        let panel = d.handle(1, Action::FetchCode { id, page: 0 }).await.unwrap();
        assert!(panel.text.contains("Connection error"));
        assert_eq!(panel.keyboard[0][0].action, format!("view:{id}:0"));
    }
}
