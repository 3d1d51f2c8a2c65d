//! Example: Drive the panel from a terminal REPL.
//!
//! Stands in for a chat transport: panels print as text plus numbered
//! buttons, and typing a number "presses" that button. Batch lines can be
//! pasted directly after opening the add form.
//!
//! # Usage
//!
//! ```bash
//! # Optional: structured logs
//! export RUST_LOG=otp_panel=debug
//! cargo run --example panel_repl
//! ```

use otp_panel::{Action, AccountStore, Dispatcher, Panel};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

const DEMO_USER_ID: i64 = 1;

#[tokio::main]
async fn main() -> otp_panel::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("otp_panel=info")),
        )
        .with_target(true)
        .init();

    let store = AccountStore::open_in_memory().await?;
    let dispatcher = Dispatcher::new(store);

    let mut panel = dispatcher.handle(DEMO_USER_ID, Action::Start).await?;
    render(&panel);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut adding = false;

    loop {
        print!("> ");
        io::stdout().flush().ok();
        let Some(Ok(line)) = lines.next() else { break };
        let line = line.trim().to_string();

        if line == "q" || line == "quit" {
            break;
        }

        let buttons: Vec<&str> = panel
            .keyboard
            .iter()
            .flatten()
            .map(|b| b.action.as_str())
            .collect();

        let action = if let Ok(n) = line.parse::<usize>() {
            match buttons.get(n.wrapping_sub(1)).and_then(|a| Action::parse(a)) {
                Some(action) => action,
                None => {
                    println!("No such button.");
                    continue;
                }
            }
        } else if adding && line.contains('|') {
            Action::SubmitBatch(line)
        } else {
            println!("Type a button number, batch lines, or q to quit.");
            continue;
        };

        adding = matches!(action, Action::OpenAddForm);
        panel = dispatcher.handle(DEMO_USER_ID, action).await?;
        render(&panel);
    }

    Ok(())
}

fn render(panel: &Panel) {
    println!("\n{}\n", panel.text);
    let mut n = 1;
    for row in &panel.keyboard {
        for button in row {
            println!("  [{}] {}", n, button.label);
            n += 1;
        }
    }
}
