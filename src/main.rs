use tracing_subscriber::EnvFilter;

use gridscribe::api::{self, ApiContext};
use gridscribe::config::{self, Settings};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = Settings::from_env();
    let addr = settings.listen_addr;
    let ctx = ApiContext::new(settings);

    let mut server = match api::start_server(ctx, addr).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start API server: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %server.session.server_addr, "Gridscribe ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    server.shutdown();
}
