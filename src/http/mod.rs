//! HTTP protocol layer module
//!
//! Response builders shared by every handler, decoupled from relay logic.

pub mod response;

// Re-export commonly used types
pub use response::{
    build_404_response, build_405_response, build_html_response, build_plain_response,
    build_text_response, set_server_header,
};
