use std::net::SocketAddr;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod gateway;
mod middleware;
mod routes;
mod state;
#[cfg(test)]
mod testing;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Careline Health Advisory API",
        version = "0.1.0",
        description = "Conversational health-advisory endpoint. Always answers with a complete advisory, even when the generative backend is unavailable."
    ),
    paths(
        routes::health::liveness,
        routes::health::backend_health,
        routes::query::submit_query,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::health::BackendHealthResponse,
        routes::health::BackendStatus,
        routes::query::AdvisoryEnvelope,
        error::QueryFailureResponse,
        careline_core::error::ApiError,
        careline_core::advisory::AdvisoryResponse,
        careline_core::advisory::RiskLevel,
        careline_core::clinical::QueryRequest,
        careline_core::clinical::HealthProfile,
        careline_core::clinical::HealthMetrics,
        careline_core::clinical::BloodPressure,
        careline_core::clinical::Symptom,
        careline_core::clinical::Severity,
        careline_core::clinical::MedicalReport,
        careline_core::clinical::Message,
        careline_core::clinical::Role,
    ))
)]
struct ApiDoc;

fn build_router(state: state::AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router().layer(middleware::rate_limit::health_probe_layer()))
        .merge(routes::query::router().layer(middleware::rate_limit::query_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer(cors_origins)),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "careline_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match config::AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; queries will be answered with the fallback advisory");
    }

    let model = config.gemini.model.clone();
    let api_version = config.gemini.api_version.clone();
    let gateway = match gateway::GeminiGateway::new(config.gemini) {
        Ok(gateway) => gateway,
        Err(err) => {
            tracing::error!(error = %err, "Failed to build generative backend client");
            std::process::exit(1);
        }
    };

    let app = build_router(state::AppState::new(gateway), &config.cors_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, %model, %api_version, "Careline API listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "Failed to bind listener");
            std::process::exit(1);
        }
    };
    if let Err(err) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!(error = %err, "Server error");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_both_endpoints() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/query"));
        assert!(doc.paths.paths.contains_key("/api/health"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
