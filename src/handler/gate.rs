//! Confirmation gate and block/unblock handlers
//!
//! Mutations only run on POST. Any other method gets a page whose form
//! re-submits the same URL as POST on load.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response, StatusCode};
use std::future::Future;

use crate::config::AppState;
use crate::error::RelayError;
use crate::http;
use crate::logger;
use crate::store::{ALLOW, BAN};

const CONFIRMATION_PAGE: &str = r#"
<form method="POST">
  <button type="submit">Complete operation</button>
</form>
<script>
  document.querySelector("form").submit();
</script>
"#;

/// Run `operation` for POST requests, serve the confirmation form otherwise
pub async fn safe_operation<F, Fut>(
    method: &Method,
    operation: F,
) -> Result<Response<Full<Bytes>>, RelayError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Response<Full<Bytes>>, RelayError>>,
{
    if method == Method::POST {
        operation().await
    } else {
        Ok(http::build_html_response(CONFIRMATION_PAGE))
    }
}

/// Write `ip → BAN`
pub async fn block(state: &AppState, ip: Option<&str>) -> Result<Response<Full<Bytes>>, RelayError> {
    set_status(state, ip, BAN).await?;
    Ok(http::build_text_response(
        StatusCode::OK,
        format!("Banned {} from sending mail", display_ip(ip)),
    ))
}

/// Write `ip → ALLOW`
pub async fn unblock(
    state: &AppState,
    ip: Option<&str>,
) -> Result<Response<Full<Bytes>>, RelayError> {
    set_status(state, ip, ALLOW).await?;
    Ok(http::build_text_response(
        StatusCode::OK,
        format!("Unbanned {} from sending mail", display_ip(ip)),
    ))
}

async fn set_status(state: &AppState, ip: Option<&str>, status: &str) -> Result<(), RelayError> {
    match ip.filter(|ip| !ip.is_empty()) {
        Some(ip) => {
            state.blocklist.put(ip, status).await?;
            logger::log_info(&format!("[Blocklist] {ip} -> {status}"));
        }
        None => logger::log_warning(&format!("No IP given, {status} not recorded")),
    }
    Ok(())
}

fn display_ip(ip: Option<&str>) -> &str {
    ip.unwrap_or("(none)")
}
