//! login-redirect: sends the desktop app's login callback to its custom URI
//! scheme and every other caller to the web app.

mod config;
mod dispatch;
mod error;
mod request_id;
mod server;
mod stats;

use config::AppConfig;

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
        .or_else(|| std::env::var("LOGIN_REDIRECT_CONFIG").ok())
        .unwrap_or_else(|| "login-redirect.toml".to_string());

    let listen_override = args
        .iter()
        .position(|a| a == "--listen")
        .and_then(|i| args.get(i + 1).cloned());

    let mut config = AppConfig::load(&config_path)?;

    // CLI overrides take precedence over TOML and env vars
    if let Some(addr) = listen_override {
        config.server.listen_address = addr;
    }

    // Build the tokio runtime first; the tonic gRPC exporter needs a reactor context
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = redirect_tracing::init_tracing(&config.tracing);

        tracing::info!(
            config_path = %config_path,
            listen_address = %config.server.listen_address,
            route = %config.redirect.route_path,
            native_app_uri = %config.redirect.native_app_uri,
            web_fallback_url = %config.redirect.web_fallback_url,
            native_agent_marker = %config.redirect.native_agent_marker,
            ignore_case = config.redirect.ignore_case,
            forward_query = config.redirect.forward_query,
            otlp_export = tracing_guard.exporting(),
            "Starting login-redirect"
        );

        server::run(config).await
    })
}
