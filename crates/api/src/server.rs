use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use diagram_common::SystemConfig;
use diagram_repair::{
    ConnectionRegistry, GenerationClient, OpenAiGenerationClient, RemoteValidator, RepairOrchestrator,
    ValidationCorrelator,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use utoipa::OpenApi;

use crate::{
    middleware::{get_tracing_layer, logging_middleware},
    openapi::ApiDoc,
    routes,
    types::HealthResponse,
};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RepairOrchestrator>,
    pub connections: Arc<ConnectionRegistry>,
    pub config: Arc<SystemConfig>,
}

pub struct DiagramServer {
    state: AppState,
}

impl DiagramServer {
    /// Server backed by the configured OpenAI-compatible provider
    pub fn new(config: SystemConfig) -> Self {
        let generator = Arc::new(OpenAiGenerationClient::new(&config.llm));
        info!(model = %generator.model(), api_base = %config.llm.api_base, "Generation provider configured");
        Self::with_generator(config, generator)
    }

    pub fn with_generator(config: SystemConfig, generator: Arc<dyn GenerationClient>) -> Self {
        let correlator = ValidationCorrelator::new(config.repair.validation_timeout());
        let connections = Arc::new(ConnectionRegistry::new(correlator.clone()));
        let validator = RemoteValidator::new(correlator, connections.clone());
        let orchestrator = RepairOrchestrator::new(generator, validator, config.repair.clone())
            .with_provider_timeout(config.llm.request_timeout());

        Self {
            state: AppState {
                orchestrator: Arc::new(orchestrator),
                connections,
                config: Arc::new(config),
            },
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/generate", post(routes::generate::generate_diagram))
            .route("/render", get(routes::render::render_socket))
            .route("/health", get(health_check))
            .route("/api-doc/openapi.json", get(openapi_json))
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(get_tracing_layer())
                    .layer(middleware::from_fn(logging_middleware)),
            );

        if self.state.config.server.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Bind the configured address and serve until the process exits
    pub async fn run(self) -> Result<()> {
        let address = self.state.config.server.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {address}"))?;
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!(
            address = %listener.local_addr()?,
            max_fix_attempts = self.state.config.repair.max_fix_attempts,
            validation_timeout_ms = self.state.config.repair.validation_timeout_ms,
            "Diagram server listening"
        );
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        render_connections: state.connections.connection_count().await,
        pending_validations: state.connections.correlator().pending_count(),
        timestamp: Utc::now(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
