use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderName, Method, StatusCode, header},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    error::ServiceError,
    generation::{GenerationParameters, GenerationPipeline, ProxyReply},
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<GenerationPipeline>,
}

/// Inbound body of `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub parameters: Option<GenerationParameters>,
}

pub fn build_router(pipeline: Arc<GenerationPipeline>) -> Router {
    let state = AppState { pipeline };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/api/generate",
            post(generate)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::OPTIONS,
            Method::PATCH,
            Method::DELETE,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers([
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
            header::ACCEPT,
            HeaderName::from_static("accept-version"),
            header::CONTENT_LENGTH,
            HeaderName::from_static("content-md5"),
            header::CONTENT_TYPE,
            header::DATE,
            HeaderName::from_static("x-api-version"),
        ])
}

async fn root() -> &'static str {
    "EduBot API is running..."
}

async fn health() -> &'static str {
    "ok"
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> ServiceError {
    ServiceError::MethodNotAllowed
}

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<ProxyReply>, ServiceError> {
    let Json(body) = payload.map_err(|rejection| {
        ServiceError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let prompt = body.prompt.unwrap_or_default();
    let parameters = body.parameters.unwrap_or_default();
    info!(prompt_len = prompt.len(), "proxying prompt to generation endpoint");

    let result = state.pipeline.generate(&prompt, &parameters).await?;
    if let Some(reason) = result.fallback_reason() {
        warn!(?reason, "answering with fallback text");
    }

    Ok(Json(ProxyReply::data(result.into_text())))
}
