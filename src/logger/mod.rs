//! Logger module
//!
//! Lifecycle, request and diagnostic output for the relay. Lines go to the
//! global [`writer::LogWriter`] once [`init`] has run, and to stdout/stderr
//! before that (or in tests).

mod format;
pub mod writer;

pub use format::{request_summary, AccessLogEntry};

use crate::config::Config;
use std::net::SocketAddr;

/// Which configured target a line belongs to
#[derive(Debug, Clone, Copy)]
enum Stream {
    Info,
    Error,
    Access,
}

/// Open the configured log files; call once at startup
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
        config.logging.debug_enabled(),
    )
}

fn emit(stream: Stream, message: &str) {
    match (writer::get(), stream) {
        (Some(w), Stream::Info) => w.write_info(message),
        (Some(w), Stream::Access) => w.write_access(message),
        (Some(w), Stream::Error) => w.write_error(message),
        (None, Stream::Error) => eprintln!("{message}"),
        (None, _) => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    let mut lines = vec![
        format!("Contact relay listening on http://{addr}"),
        format!("  log level:     {}", config.logging.level),
        format!("  store backend: {:?}", config.store.backend),
        format!("  allowlist:     {}", config.store.allowlist_path),
        format!("  mail endpoint: {}", config.mail.endpoint),
    ];
    if let Some(workers) = config.server.workers {
        lines.push(format!("  workers:       {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        lines.push(format!("  access log:    {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        lines.push(format!("  error log:     {path}"));
    }

    for line in &lines {
        emit(Stream::Info, line);
    }
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    log_debug(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    log_error(&format!("Failed to serve connection: {err:?}"));
}

pub fn log_info(message: &str) {
    emit(Stream::Info, message);
}

pub fn log_error(message: &str) {
    emit(Stream::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    emit(Stream::Error, &format!("[WARN] {message}"));
}

/// Diagnostic output, only emitted when `logging.level` is `debug`
pub fn log_debug(message: &str) {
    if writer::get().is_some_and(writer::LogWriter::debug_enabled) {
        emit(Stream::Info, &format!("[DEBUG] {message}"));
    }
}

pub fn log_access(entry: &AccessLogEntry, format: &str) {
    emit(Stream::Access, &entry.format(format));
}

pub fn log_shutdown(active_connections: usize) {
    log_info(&format!(
        "[Shutdown] Listener closed, {active_connections} connection(s) still finishing"
    ));
}
