//! Example: Import accounts from a pipe-delimited file into the store.
//!
//! Reads `email|emailPassword|username|servicePassword[|country[|auth]]`
//! lines from a file and inserts them for one user, the same way the
//! panel's batch submission does.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example batch_import -- accounts.txt
//! ```
//!
//! The database location defaults to `data/otp-panel.db`; override it with
//! the `DB_PATH` environment variable.

use otp_panel::batch::{self, LineResult};
use otp_panel::resolver::HostResolver;
use otp_panel::store::{AccountStore, NewAccount};
use std::env;

const DEMO_USER_ID: i64 = 1;

#[tokio::main]
async fn main() -> otp_panel::Result<()> {
    let path = env::args()
        .nth(1)
        .expect("usage: batch_import <accounts-file>");
    let text = std::fs::read_to_string(&path).expect("readable accounts file");

    let db_path = env::var("DB_PATH").unwrap_or_else(|_| "data/otp-panel.db".to_string());
    let store = AccountStore::open(&db_path).await?;
    let resolver = HostResolver::with_defaults();

    let mut added = 0u32;
    for result in batch::parse_batch(&text) {
        match result {
            LineResult::Parsed(creds) => {
                let (imap_host, imap_port) = resolver.resolve(&creds.email);
                store
                    .insert(NewAccount {
                        user_id: DEMO_USER_ID,
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
                added += 1;
            }
            LineResult::Rejected { line_no, reason } => {
                eprintln!("line {}: skipped ({})", line_no, reason);
            }
        }
    }

    println!("Imported {} accounts into {}", added, db_path);

    Ok(())
}
