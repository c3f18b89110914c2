//! HTTP response building module
//!
//! Provides builders for the plain-text, HTML and error responses the relay emits.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, SERVER};
use hyper::{Response, StatusCode};

/// Build plain-text response with an arbitrary status
pub fn build_text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let body = body.into();
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain;charset=UTF-8")
        .header("Content-Length", body.len())
        .body(Full::new(body.clone()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(body))
        })
}

/// Build 200 plain-text response, empty body for HEAD
pub fn build_plain_response(content: String, is_head: bool) -> Response<Full<Bytes>> {
    let content_length = content.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(content)
    };

    Response::builder()
        .status(200)
        .header("Content-Type", "text/plain;charset=UTF-8")
        .header("Content-Length", content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build generic HTML response
pub fn build_html_response(content: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(200)
        .header("Content-Type", "text/html;charset=UTF-8")
        .header("Content-Length", content.len())
        .body(Full::new(Bytes::from_static(content.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(405)
        .header("Content-Type", "text/plain;charset=UTF-8")
        .header("Allow", allow)
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(Full::new(Bytes::from("405 Method Not Allowed")))
        })
}

/// Stamp the configured `Server` header; an unrepresentable name is skipped
pub fn set_server_header<B>(response: &mut Response<B>, server_name: &str) {
    match HeaderValue::from_str(server_name) {
        Ok(value) => {
            response.headers_mut().insert(SERVER, value);
        }
        Err(e) => crate::logger::log_warning(&format!(
            "Invalid http.server_name {server_name:?}: {e}"
        )),
    }
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response_headers() {
        let resp = build_text_response(StatusCode::FORBIDDEN, "1.2.3.4 is banned");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            resp.headers()["Content-Type"],
            "text/plain;charset=UTF-8"
        );
        assert_eq!(resp.headers()["Content-Length"], "17");
    }

    #[test]
    fn test_head_has_empty_body_but_length() {
        let resp = build_plain_response("1.2.3.4 BAN".to_string(), true);
        assert_eq!(resp.headers()["Content-Length"], "11");
    }

    #[test]
    fn test_server_header() {
        let mut resp = build_404_response();
        set_server_header(&mut resp, "contact-relay");
        assert_eq!(resp.headers()["Server"], "contact-relay");

        let mut resp = build_404_response();
        set_server_header(&mut resp, "bad\nname");
        assert!(resp.headers().get("Server").is_none());
    }

    #[test]
    fn test_405_lists_allowed() {
        let resp = build_405_response("POST");
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()["Allow"], "POST");
    }
}
