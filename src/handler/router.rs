//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: matches the path against the
//! relay's four templates and dispatches to exactly one handler.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};

use crate::config::AppState;
use crate::error::RelayError;
use crate::handler::{blocklist, gate, send};
use crate::http;
use crate::logger;
use crate::routing::{match_route, PathPattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteKind {
    Send,
    Block,
    Unblock,
    Blocklist,
}

static ROUTES: LazyLock<Vec<(PathPattern, RouteKind)>> = LazyLock::new(|| {
    vec![
        (PathPattern::new("/send"), RouteKind::Send),
        (PathPattern::new("/block/:ip"), RouteKind::Block),
        (PathPattern::new("/unblock/:ip"), RouteKind::Unblock),
        (PathPattern::new("/blocklist"), RouteKind::Blocklist),
    ]
});

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: Option<SocketAddr>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    logger::log_debug(&logger::request_summary(req.method(), req.uri()));

    let mut response = dispatch(req, &state, peer_addr).await;
    http::set_server_header(&mut response, &state.config.http.server_name);
    Ok(response)
}

async fn dispatch<B>(
    req: Request<B>,
    state: &AppState,
    peer_addr: Option<SocketAddr>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().to_string();
    let Some((kind, params)) = match_route(&path, ROUTES.as_slice()) else {
        logger::log_warning(&format!("No route for {path}"));
        return http::build_404_response();
    };

    let ip = params.get("ip");
    let result = match kind {
        RouteKind::Send => send::handle_send(req, state, peer_addr).await,
        RouteKind::Block => gate::safe_operation(req.method(), || gate::block(state, ip)).await,
        RouteKind::Unblock => gate::safe_operation(req.method(), || gate::unblock(state, ip)).await,
        RouteKind::Blocklist => blocklist::handle_blocklist(req.method(), state).await,
    };

    result.unwrap_or_else(RelayError::into_response)
}
