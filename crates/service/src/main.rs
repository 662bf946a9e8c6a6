mod config;
mod hub;
mod ingress;
mod routes;
mod saver;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pulse_core::{AggregateStore, Canonicalizer};
use pulse_embed::EmbeddingClient;

use crate::config::{load_service_config, ServiceConfig};
use crate::hub::Hub;
use crate::routes::AppState;
use crate::saver::{restore_store, Saver};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let config = load_service_config();
    let store = Arc::new(AggregateStore::new(build_canonicalizer(&config)));
    restore_store(&store, &config.persistence.state_file);
    let (saver, saver_task) = Saver::spawn(
        store.clone(),
        config.persistence.state_file.clone(),
        config.debounce(),
    );
    let hub = Arc::new(Hub::new(config.rate_limit));
    let state = Arc::new(AppState {
        store,
        hub: hub.clone(),
        saver: saver.clone(),
    });
    let app = routes::router(state);
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening" = %addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            hub.close();
        })
        .await?;
    saver.shutdown();
    match saver_task.await {
        Ok(()) => info!(writes = saver.writes(), "persistence stopped"),
        Err(err) => error!(error = %err, "persistence task ended abnormally"),
    }
    Ok(())
}

fn build_canonicalizer(config: &ServiceConfig) -> Canonicalizer {
    let canonicalizer = Canonicalizer::new(config.matching.thresholds());
    if !config.matching.semantic_enabled {
        return canonicalizer;
    }
    match EmbeddingClient::from_env() {
        Ok(client) => canonicalizer.with_oracle(Arc::new(client)),
        Err(err) => {
            warn!(error = %err, "embedding oracle unavailable, falling back to local phrase vectors");
            canonicalizer.with_oracle(Arc::new(EmbeddingClient::local()))
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
