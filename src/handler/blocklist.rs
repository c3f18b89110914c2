// `/blocklist` handler
// Renders every Ban Record as an "<ip> <status>" line

use futures_util::future::join_all;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response};

use crate::config::AppState;
use crate::error::RelayError;
use crate::http;

/// Status shown for a key that vanished between list and get
const MISSING_STATUS: &str = "null";

pub async fn handle_blocklist(
    method: &Method,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, RelayError> {
    let is_head = method == Method::HEAD;
    if method != Method::GET && !is_head {
        return Ok(http::build_405_response("GET, HEAD"));
    }

    let keys = state.blocklist.list().await?;
    let values = join_all(keys.iter().map(|key| state.blocklist.get(key))).await;

    let lines = keys
        .iter()
        .zip(values)
        .map(|(key, value)| -> Result<String, RelayError> {
            let value = value?;
            Ok(format!(
                "{key} {}",
                value.as_deref().unwrap_or(MISSING_STATUS)
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(http::build_plain_response(lines.join("\n"), is_head))
}
