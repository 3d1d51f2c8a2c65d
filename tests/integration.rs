//! Integration tests for otp-panel.
//!
//! The offline tests run against an in-memory store and need no network.
//! The live-mailbox tests require a real IMAP account and are disabled by
//! default. To run them:
//!
//! ```bash
//! # Set environment variables
//! export OTP_PANEL_TEST_EMAIL="your@email.com"
//! export OTP_PANEL_TEST_PASSWORD="your-app-password"
//!
//! # Run with the integration-tests feature
//! cargo test --features integration-tests -- --ignored
//! ```

use otp_panel::{
    fetch_code, Action, AccountStore, CodeMatcher, Dispatcher, FetchConfig, FetchOutcome,
};
use std::env;

// ─────────────────────────────────────────────────────────────────────────────
// Test Configuration Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn get_test_credentials() -> Option<(String, String)> {
    dotenvy::dotenv().ok();
    let email = env::var("OTP_PANEL_TEST_EMAIL").ok()?;
    let password = env::var("OTP_PANEL_TEST_PASSWORD").ok()?;
    Some((email, password))
}

fn get_test_config() -> Option<FetchConfig> {
    let (email, password) = get_test_credentials()?;
    FetchConfig::builder().email(email).password(password).build().ok()
}

async fn dispatcher() -> Dispatcher {
    let store = AccountStore::open_in_memory()
        .await
        .expect("in-memory store");
    Dispatcher::new(store)
}

// ─────────────────────────────────────────────────────────────────────────────
// Offline Panel Flow Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_panel_flow() {
    let d = dispatcher().await;
    let user = 100;

    // Start at the main menu
    let menu = d.handle(user, Action::Start).await.unwrap();
    assert!(menu
        .keyboard
        .iter()
        .flatten()
        .any(|b| b.action == "list:0"));

    // Open the add form, then submit a batch
    let form = d.handle(user, Action::OpenAddForm).await.unwrap();
    assert!(form.text.contains('|'));

    let batch = "alice@gmail.com|mp1|alice|sp1\n\
                 bob@hotmail.com|mp2|bob|sp2|US\n\
                 carol@firstmail.ltd|mp3|carol|sp3|DE|2fa-seed";
    let added = d.handle(user, Action::SubmitBatch(batch.into())).await.unwrap();
    assert!(added.text.contains("Added: 3"));

    // List and follow a button into a record
    let list = d.handle(user, Action::List { page: 0 }).await.unwrap();
    assert!(list.text.contains("3 total"));
    let first_view = Action::parse(&list.keyboard[0][0].action).unwrap();
    let Action::View { id, .. } = first_view else {
        panic!("first row should open a record");
    };

    let view = d.handle(user, first_view).await.unwrap();
    assert!(view.text.contains("alice@gmail.com"));
    assert!(view.text.contains("imap.gmail.com:993"));

    // Delete it and confirm the list shrank
    let after_delete = d.handle(user, Action::Delete { id, page: 0 }).await.unwrap();
    assert!(after_delete.text.contains("2 total"));

    // Wipe the rest through the confirmation step
    let ask = d
        .handle(user, Action::DeleteAll { confirmed: false })
        .await
        .unwrap();
    let confirm = ask
        .keyboard
        .iter()
        .flatten()
        .find(|b| b.action == "wipe:confirm")
        .expect("confirmation button present");
    let done = d
        .handle(user, Action::parse(&confirm.action).unwrap())
        .await
        .unwrap();
    assert!(done.text.contains("Removed 2"));

    let empty = d.handle(user, Action::List { page: 0 }).await.unwrap();
    assert!(empty.text.contains("no saved accounts"));
}

#[tokio::test]
async fn test_users_are_isolated() {
    let d = dispatcher().await;

    d.handle(1, Action::SubmitBatch("a@x.com|m|mine|s".into()))
        .await
        .unwrap();
    d.handle(2, Action::SubmitBatch("b@x.com|m|theirs|s".into()))
        .await
        .unwrap();

    let mine = d.handle(1, Action::List { page: 0 }).await.unwrap();
    assert!(mine.keyboard[0][0].label.contains("mine"));
    assert!(!mine.keyboard.iter().flatten().any(|b| b.label.contains("theirs")));

    // Wiping user 1 leaves user 2 untouched
    d.handle(1, Action::DeleteAll { confirmed: true })
        .await
        .unwrap();
    let theirs = d.handle(2, Action::List { page: 0 }).await.unwrap();
    assert!(theirs.text.contains("1 total"));
}

#[tokio::test]
async fn test_malformed_batch_reports_rejects() {
    let d = dispatcher().await;

    let batch = "good@x.com|m|u|s\n\
                 only|three|fields\n\
                 \n\
                 |m|empty-email|s";
    let panel = d.handle(9, Action::SubmitBatch(batch.into())).await.unwrap();
    assert!(panel.text.contains("Added: 1"));
    assert!(panel.text.contains("skipped 2"));
}

#[tokio::test]
async fn test_every_button_round_trips() {
    let d = dispatcher().await;
    d.handle(7, Action::SubmitBatch("a@x.com|m|u|s".into()))
        .await
        .unwrap();
    let id = {
        let list = d.handle(7, Action::List { page: 0 }).await.unwrap();
        match Action::parse(&list.keyboard[0][0].action).unwrap() {
            Action::View { id, .. } => id,
            other => panic!("unexpected action {other:?}"),
        }
    };

    // Every button on every reachable panel must parse back into an action
    for action in [
        Action::Start,
        Action::OpenAddForm,
        Action::List { page: 0 },
        Action::View { id, page: 0 },
        Action::DeleteAll { confirmed: false },
    ] {
        let panel = d.handle(7, action).await.unwrap();
        for button in panel.keyboard.iter().flatten() {
            assert!(
                Action::parse(&button.action).is_some(),
                "unparseable button payload: {}",
                button.action
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Live Mailbox Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_fetch_code_live() {
    let config = get_test_config().expect("Test config from environment variables");

    let outcome = fetch_code(&config, &CodeMatcher::six_digit()).await;

    match outcome {
        FetchOutcome::Code(code) => {
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        other => {
            // NotFound/NoMessages are fine if the mailbox has no codes
            println!("No code retrieved: {}", other.render());
            assert!(!matches!(other, FetchOutcome::Failed(_)));
        }
    }
}

#[tokio::test]
#[ignore = "requires intentionally wrong credentials"]
async fn test_invalid_credentials_fold_into_outcome() {
    let config = FetchConfig::builder()
        .email("test@gmail.com")
        .password("wrong-password")
        .fallback_host(None)
        .build()
        .expect("valid config structure");

    let outcome = fetch_code(&config, &CodeMatcher::six_digit()).await;
    assert!(matches!(outcome, FetchOutcome::Failed(_)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Validation Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_email_format() {
    let result = FetchConfig::builder()
        .email("not-an-email")
        .password("password")
        .build();

    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_required_fields() {
    // Missing email
    let result = FetchConfig::builder().password("password").build();
    assert!(result.is_err());

    // Missing password
    let result = FetchConfig::builder().email("test@example.com").build();
    assert!(result.is_err());
}
