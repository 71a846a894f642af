use anyhow::{Context, Result};
use tokio::{net::TcpListener, task::JoinSet};
use tracing_subscriber::EnvFilter;
use yodo::{build_store, config::AppConfig, routes::routes, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting yodo with config: {:?}", cfg);

    // --- Initialize the store; any failure here refuses startup ---
    let store = build_store(&cfg)?;
    tracing::info!(
        "Using {} store, upload limit {} bytes",
        store.backend_name(),
        store.max_size()
    );

    // --- Build router ---
    let app = routes::app(AppState::new(store, cfg.base_url.clone()));

    // --- Start one server per listen address, all sharing the store ---
    let mut servers = JoinSet::new();
    for addr in &cfg.listen {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {}", addr))?;
        tracing::info!("Server listening on http://{}", listener.local_addr()?);

        let app = app.clone();
        servers.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        });
    }

    while let Some(result) = servers.join_next().await {
        result.context("server task panicked")??;
    }

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
