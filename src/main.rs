use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod config;
mod error;
mod handler;
mod http;
mod logger;
mod mail;
mod routing;
mod server;
mod store;

use config::{AppState, Config};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;
    logger::init(&cfg)?;

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime.worker_threads(workers);
    }

    runtime.build()?.block_on(run(cfg))
}

async fn run(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr, cfg.server.backlog)?;
    logger::log_server_start(&addr, &cfg);

    // Stores are opened after binding so a port conflict fails fast
    let state = Arc::new(AppState::from_config(cfg).await?);

    let signals = Arc::new(server::SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    server::start_server_loop(
        listener,
        state,
        Arc::new(AtomicUsize::new(0)),
        Arc::clone(&signals.shutdown),
    )
    .await;

    if signals.shutdown_requested.load(Ordering::SeqCst) {
        logger::log_info("[Shutdown] Relay stopped");
    }
    Ok(())
}
