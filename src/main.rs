use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use identity_picker::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = ServerConfig::from_env()?;

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config_file = std::env::var("PICKER_CONFIG").unwrap_or_else(|_| "<defaults>".to_string());
    info!(
        target: "identity_picker",
        "Identity picker starting: RUST_LOG='{}', http_port={}, session_ttl_secs={}, config='{}'",
        rust_log, cfg.http_port, cfg.session_ttl.as_secs(), config_file
    );

    identity_picker::server::run_with_config(cfg).await
}
