//! HTTP surface
//!
//! - POST /analyze - classify, score and recommend for one item
//! - GET /recommend - productive alternatives for a query
//! - GET /health - liveness

use crate::error::{Result, ZenfeedError};
use crate::feed::RawFeedItem;
use crate::pipeline::{Action, Orchestrator};
use crate::recommend::Alternative;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Pipeline stages behind the API, reported by /health
const STAGES: [&str; 6] = [
    "normalizer",
    "classifier",
    "scorer",
    "recommender",
    "behavior",
    "orchestrator",
];

const DEFAULT_MAX_RESULTS: usize = 3;
const MAX_RESULTS_LIMIT: usize = 10;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub title: Option<String>,
    #[serde(default, alias = "duration_sec")]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default, alias = "url")]
    pub source_url: Option<String>,
}

impl From<AnalyzeRequest> for RawFeedItem {
    fn from(req: AnalyzeRequest) -> Self {
        RawFeedItem {
            title: req.title,
            duration_text: None,
            duration_seconds: req.duration_seconds,
            channel: req.channel,
            source_url: req.source_url,
            platform: req.platform,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub category: String,
    pub confidence: f32,
    pub risk_score: u8,
    pub risk_tier: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative: Option<Alternative>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendParams {
    #[serde(alias = "q")]
    pub query: Option<String>,
    #[serde(rename = "maxResults", alias = "max_results")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub alternatives: Vec<Alternative>,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

/// Build the router with all endpoints
pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = AppState { orchestrator };

    Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/recommend", get(recommend_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Response {
    if req.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
        return bad_request("title is required");
    }

    match state.orchestrator.analyze(&RawFeedItem::from(req)).await {
        Ok(analysis) => Json(AnalyzeResponse {
            category: analysis.classification.category.to_string(),
            confidence: analysis.classification.confidence,
            risk_score: analysis.score.value,
            risk_tier: analysis.score.tier.to_string(),
            action: analysis.action,
            alternative: analysis.alternative,
        })
        .into_response(),
        Err(rejection) => bad_request(rejection.to_string()),
    }
}

async fn recommend_handler(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> Response {
    let query = params.query.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        return bad_request("query is required");
    }

    let max_results = params
        .max_results
        .unwrap_or(DEFAULT_MAX_RESULTS)
        .clamp(1, MAX_RESULTS_LIMIT);

    let alternatives = state.orchestrator.recommend(query, max_results).await;
    Json(RecommendResponse { alternatives }).into_response()
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "agentsRegistered": STAGES.len(),
    }))
}

/// Serve until Ctrl+C
pub async fn run(bind: &str, orchestrator: Arc<Orchestrator>) -> Result<()> {
    let addr: SocketAddr = bind.parse().map_err(|_| ZenfeedError::InvalidConfigValue {
        path: "server.bind".to_string(),
        message: format!("Invalid bind address: {}", bind),
    })?;

    let app = create_router(orchestrator);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ZenfeedError::Io {
            source: e,
            context: format!("Failed to bind {}", addr),
        })?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down server");
        })
        .await
        .map_err(|e| ZenfeedError::Server(e.to_string()))
}
