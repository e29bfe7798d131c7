//! Application startup and lifecycle management.

use crate::config::ServiceConfig;
use crate::error::AppError;
use crate::handlers;
use crate::middleware;
use crate::services::providers::openai::{OpenAiSpeechProvider, OpenAiTextProvider};
use crate::services::providers::{SpeechProvider, TextProvider};
use crate::services::{DuckDbWarehouse, Narrator, NgdClient, Warehouse};
use anyhow::anyhow;
use axum::{routing::get, Router};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state: immutable clients and configuration.
#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub ngd: NgdClient,
    pub warehouse: Arc<dyn Warehouse>,
    pub narrator: Narrator,
    pub speech: Arc<dyn SpeechProvider>,
}

pub struct Application {
    port: u16,
    server: Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>,
}

impl Application {
    pub async fn build(config: ServiceConfig) -> Result<Self, AppError> {
        let ngd = NgdClient::new(&config.ngd.base_url, &config.ngd.api_key)
            .map_err(|e| AppError::InternalError(anyhow!("failed to build NGD client: {}", e)))?;

        let warehouse: Arc<dyn Warehouse> = Arc::new(DuckDbWarehouse::new(config.warehouse.clone()));

        let text_provider: Arc<dyn TextProvider> =
            Arc::new(OpenAiTextProvider::new(config.openai.clone())?);
        let narrator = Narrator::new(text_provider, config.openai.temperature);

        let speech: Arc<dyn SpeechProvider> =
            Arc::new(OpenAiSpeechProvider::new(config.openai.clone())?);

        tracing::info!(
            text_model = %config.openai.text_model,
            speech_model = %config.openai.speech_model,
            ngd_base_url = %config.ngd.base_url,
            "Initialized external clients"
        );

        let state = AppState {
            config: config.clone(),
            ngd,
            warehouse,
            narrator,
            speech,
        };

        let app = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics))
            .route("/street-info", get(handlers::street_info))
            .route("/street-info-llm", get(handlers::street_info_llm))
            .route("/land-use-info", get(handlers::land_use_info))
            .route("/land-use-info-llm", get(handlers::land_use_info_llm))
            .route(
                "/collaborative-street-works-llm",
                get(handlers::collaborative_street_works_llm),
            )
            .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state);

        // Port 0 binds a random port for testing.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .into_future();

        Ok(Self {
            port,
            server: Box::pin(server),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
