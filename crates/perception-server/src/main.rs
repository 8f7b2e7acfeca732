mod api;
mod middleware;

use std::sync::Arc;

use perception_engine::{EntityContextManager, ManagerConfig};
use perception_metrics::Normalizer;
use perception_store::{Fetcher, FetcherConfig, HttpStore};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = perception_core::load_engine_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store = HttpStore::new(
        &config.store_url,
        config.store_token.as_deref(),
        config.request_timeout_secs,
    )?;
    let fetcher = Fetcher::new(Arc::new(store), FetcherConfig::from_engine_config(&config));
    let normalizer = Normalizer::from_engine_config(&config)?;
    let manager = EntityContextManager::new(
        fetcher,
        normalizer,
        ManagerConfig::from_engine_config(&config),
    );

    tracing::info!(
        bind_addr = %config.bind_addr,
        env = ?config.env,
        store_url = %config.store_url,
        "starting perception server"
    );
    let app = build_app(AppState { manager });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
