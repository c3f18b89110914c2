// Application state module
// Holds configuration plus the store and mailer capabilities handlers use

use crate::mail::{MailError, MailgunClient, SharedMailer};
use crate::store::{self, SharedStore, StoreError};

use super::types::Config;

/// Application state shared by every connection
pub struct AppState {
    pub config: Config,
    /// IP → `BAN` / `ALLOW`
    pub blocklist: SharedStore,
    /// Recipient alias → email address
    pub allowlist: SharedStore,
    pub mailer: SharedMailer,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to open stores: {0}")]
    Store(#[from] StoreError),
    #[error("failed to build mail client: {0}")]
    Mail(#[from] MailError),
}

impl AppState {
    /// Create `AppState` from explicit capabilities
    pub fn new(
        config: Config,
        blocklist: SharedStore,
        allowlist: SharedStore,
        mailer: SharedMailer,
    ) -> Self {
        Self {
            config,
            blocklist,
            allowlist,
            mailer,
        }
    }

    /// Create `AppState` with the configured store backend and Mailgun client
    pub async fn from_config(config: Config) -> Result<Self, StateError> {
        let (blocklist, allowlist) = store::open_stores(&config.store).await?;
        let mailer = std::sync::Arc::new(MailgunClient::new(config.mail.clone())?);
        Ok(Self::new(config, blocklist, allowlist, mailer))
    }
}
