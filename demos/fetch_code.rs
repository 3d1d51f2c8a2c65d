//! Basic example: Fetch a verification code from a mailbox.
//!
//! Connects to the IMAP server for the given address, scans the most
//! recent messages, and prints the first 6-digit code found.
//!
//! # Usage
//!
//! ```bash
//! export EMAIL_ADDRESS="your@email.com"
//! export EMAIL_PASSWORD="your-app-password"
//! cargo run --example fetch_code
//! ```
//!
//! For Gmail, you'll need to use an [App Password](https://support.google.com/accounts/answer/185833).

use otp_panel::{fetch_code, CodeMatcher, FetchConfig};
use std::env;

#[tokio::main]
async fn main() -> otp_panel::Result<()> {
    // Read credentials from environment
    let email = env::var("EMAIL_ADDRESS").expect("EMAIL_ADDRESS environment variable required");
    let password =
        env::var("EMAIL_PASSWORD").expect("EMAIL_PASSWORD environment variable required");

    println!("Checking mailbox for {}...", email);

    // IMAP host is auto-discovered from the email domain
    let config = FetchConfig::builder()
        .email(&email)
        .password(password)
        .build()?;

    let outcome = fetch_code(&config, &CodeMatcher::six_digit()).await;

    println!("{}", outcome.render());

    Ok(())
}
