//! # Server Configuration
//!
//! This module contains the server setup and configuration for the roadwatch API.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::feed::FeedHub;
use crate::handlers;
use crate::repositories::ProcessedAgentDataRepository;
use crate::telemetry::trace_context_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub store: ProcessedAgentDataRepository,
    pub feed: FeedHub,
    /// Cancelled when the server begins shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Self {
        let feed = FeedHub::new(config.feed_channel_capacity);
        Self {
            store: ProcessedAgentDataRepository::new(Arc::new(db.clone())),
            config: Arc::new(config),
            db,
            feed,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route(
            "/processed_agent_data",
            get(handlers::processed_agent_data::list_records)
                .post(handlers::processed_agent_data::create_record),
        )
        .route(
            "/processed_agent_data/batch",
            post(handlers::processed_agent_data::create_batch),
        )
        .route(
            "/processed_agent_data/{id}",
            get(handlers::processed_agent_data::get_record)
                .delete(handlers::processed_agent_data::delete_record),
        )
        .route("/ws/{user_id}", get(handlers::feed::subscribe_feed))
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration and serves until a shutdown signal
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    // Resolve the configured bind address
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let state = AppState::new(config, db);
    let shutdown = state.shutdown.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM and cancels `token` so open feed sockets close.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    token.cancel();
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::readyz,
        crate::handlers::processed_agent_data::create_record,
        crate::handlers::processed_agent_data::create_batch,
        crate::handlers::processed_agent_data::list_records,
        crate::handlers::processed_agent_data::get_record,
        crate::handlers::processed_agent_data::delete_record,
        crate::handlers::feed::subscribe_feed,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::HealthStatus,
            crate::models::ProcessedAgentRecord,
            crate::models::NewProcessedAgentRecord,
            crate::models::ProcessedAgentData,
            crate::models::AgentData,
            crate::models::AccelerometerData,
            crate::models::GpsData,
            crate::error::ApiError,
        )
    ),
    tags(
        (name = "processed_agent_data", description = "Classified road readings"),
        (name = "feed", description = "Per-user live feed of stored readings"),
    ),
    info(
        title = "Roadwatch API",
        description = "Storage and live feed for classified road-condition readings",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
