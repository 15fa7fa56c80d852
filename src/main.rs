//! Webhook gateway entry point.

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use webhook_gateway::AppState;
use webhook_gateway::config::Config;
use webhook_gateway::sweeper;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::new(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        upstream = %config.upstream,
        auto_block = config.auto_block,
        blocked = state.blocklist().len(),
        "Webhook gateway starting",
    );

    let app = webhook_gateway::router(state.clone());

    let addr = SocketAddr::new(config.host.parse().expect("invalid host"), config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    let sweeper_task = config.auto_block.then(|| sweeper::spawn(state.clone()));
    let housekeeping = sweeper::spawn_housekeeping(state.clone());

    tracing::info!(%addr, "Webhook gateway ready");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    if let Some(task) = sweeper_task {
        task.abort();
    }
    housekeeping.abort();

    tracing::info!("Webhook gateway shut down");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install signal handler");
    tracing::info!("Shutdown signal received");
}
