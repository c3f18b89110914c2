//! Mail delivery module
//!
//! [`Mailer`] is the seam between the send handler and the hosted email API.
//! [`MailgunClient`] is the production implementation.

mod mailgun;

use async_trait::async_trait;
use std::sync::Arc;

pub use mailgun::MailgunClient;

/// One contact-form message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Resolved destination address
    pub to: String,
    pub title: String,
    pub message: String,
    pub name: String,
    pub contact: String,
    pub sender_ip: String,
    pub reply_to: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail API responded with status {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), MailError>;
}

pub type SharedMailer = Arc<dyn Mailer>;
