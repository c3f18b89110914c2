//! Request handler module
//!
//! Responsible for request routing dispatch and the relay's four operations:
//! send, block, unblock and blocklist.

mod blocklist;
mod gate;
pub mod router;
mod send;

// Re-export main entry point
pub use router::handle_request;

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Bytes;
    use hyper::Response;
    use std::sync::{Arc, Mutex};

    use crate::config::{AppState, Config};
    use crate::mail::{MailError, Mailer, OutboundMessage};
    use crate::store::MemoryStore;

    /// Mailer double that records every delivered message
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<OutboundMessage>>,
        fail_status: Mutex<Option<u16>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }

        pub fn fail_with(&self, status: u16) {
            *self.fail_status.lock().unwrap() = Some(status);
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn deliver(&self, message: &OutboundMessage) -> Result<(), MailError> {
            if let Some(status) = *self.fail_status.lock().unwrap() {
                return Err(MailError::Status {
                    status,
                    body: "upstream failure".to_string(),
                });
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    /// Empty blocklist, allowlist with `sales → sales@co.example`
    pub fn test_state() -> (AppState, Arc<RecordingMailer>) {
        let config = Config::load_from("does-not-exist/relay").unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::with_entries([("sales", "sales@co.example")])),
            Arc::clone(&mailer) as Arc<dyn Mailer>,
        );
        (state, mailer)
    }

    pub async fn body_string(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
