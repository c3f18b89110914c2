// Request error module
// Maps handler failures to explicit HTTP responses

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

use crate::http;
use crate::mail::MailError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Missing Data")]
    MissingData,
    #[error("No such contact: {0}")]
    UnresolvedRecipient(String),
    #[error("{0} is banned")]
    Banned(String),
    #[error("Failed to read request body: {0}")]
    BadBody(String),
    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Delivery(#[from] MailError),
}

impl RelayError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingData | Self::UnresolvedRecipient(_) | Self::BadBody(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Banned(_) => StatusCode::FORBIDDEN,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Delivery(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Client-facing body; internal details stay in the error log
    fn public_message(&self) -> String {
        match self {
            Self::MissingData => "Missing Data".to_string(),
            Self::UnresolvedRecipient(_) => "No such contact".to_string(),
            Self::Banned(ip) => format!("{ip} is banned"),
            Self::BadBody(_) => "Failed to read request body".to_string(),
            Self::UnsupportedMediaType(_) => "Unsupported Media Type".to_string(),
            Self::PayloadTooLarge(_) => "413 Payload Too Large".to_string(),
            Self::Store(_) => "Internal Server Error".to_string(),
            Self::Delivery(_) => "Failed to deliver message".to_string(),
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        if status.is_server_error() {
            crate::logger::log_error(&self.to_string());
        } else {
            crate::logger::log_warning(&self.to_string());
        }
        http::build_text_response(status, self.public_message())
    }
}
