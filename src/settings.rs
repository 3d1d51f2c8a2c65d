//! Process configuration read from the environment.

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Environment variable holding the chat-transport credential.
pub const BOT_TOKEN_VAR: &str = "BOT_TOKEN";

/// Environment variable overriding the database location.
pub const DB_PATH_VAR: &str = "DB_PATH";

/// Default on-disk database location when [`DB_PATH_VAR`] is unset.
pub const DEFAULT_DB_PATH: &str = "data/otp-panel.db";

/// Startup settings for a deployment of the panel.
pub struct Settings {
    /// Transport credential, handed to the transport adapter untouched.
    pub bot_token: SecretString,
    /// SQLite database path.
    pub db_path: String,
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Settings`] if `BOT_TOKEN` is missing or empty.
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var(BOT_TOKEN_VAR)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Settings {
                message: format!("{BOT_TOKEN_VAR} is not set"),
            })?;

        let db_path =
            std::env::var(DB_PATH_VAR).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            db_path,
        })
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("bot_token", &"[REDACTED]")
            .field("db_path", &self.db_path)
            .finish()
    }
}
