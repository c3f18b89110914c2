// Configuration module entry point
// Manages application configuration and runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, MailConfig, StoreBackend, StoreConfig};

/// Default config file, looked up without extension
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Missing file is fine: environment and defaults still apply
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8787)?
            .set_default("server.backlog", 128)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "contact-relay")?
            .set_default("http.max_body_size", 65_536)? // 64KB
            .set_default("http.peer_ip_fallback", false)?
            .set_default(
                "mail.endpoint",
                "https://api.mailgun.net/v3/mg.knyazev.io/messages",
            )?
            .set_default("mail.from", "contact@mg.knyazev.io")?
            .set_default("mail.template", "contact-message")?
            .set_default("mail.subject_prefix", "Message from website")?
            .set_default("mail.api_key", "")?
            .set_default("mail.timeout", 30)?
            .set_default("mail.include_reply_to", false)?
            .set_default("store.backend", "memory")?
            .set_default("store.blocklist_path", "blocklist.toml")?
            .set_default("store.allowlist_path", "allowlist.toml")?
            .build()?;

        settings.try_deserialize()
    }

    /// Load from the path given as first CLI argument, or `config`
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::args()
            .nth(1)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
