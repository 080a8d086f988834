// 🌐 REST API - Recommendation endpoints over axum
// The catalog is read-only, so handlers share it through an Arc without locks.

use crate::catalog::Catalog;
use crate::entities::{Card, RewardRule, SpendChannel, TransactionContext, WILDCARD};
use crate::error::EngineError;
use crate::ranker::{Ranking, RewardRanker};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub ranker: Arc<RewardRanker>,
}

impl AppState {
    pub fn new(catalog: Catalog, ranker: RewardRanker) -> Self {
        AppState {
            catalog: Arc::new(catalog),
            ranker: Arc::new(ranker),
        }
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

fn error_response(err: EngineError) -> Response {
    let status = match err {
        EngineError::UnknownCard(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    tracing::warn!(error = %err, "request rejected");
    (status, Json(ApiResponse::err(err.to_string()))).into_response()
}

// ============================================================================
// Request / Response types
// ============================================================================

fn default_channel() -> SpendChannel {
    SpendChannel::Offline
}

fn default_category() -> String {
    WILDCARD.to_string()
}

/// POST /api/recommend body
#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub merchant: String,
    pub amount: Decimal,
    #[serde(default = "default_channel")]
    pub spend_channel: SpendChannel,
    #[serde(default = "default_category")]
    pub merchant_category: String,
    /// Cards to compare; every catalog card when absent
    #[serde(default)]
    pub card_ids: Option<Vec<String>>,
}

#[derive(Serialize)]
struct CardDetailResponse {
    card: Card,
    rules: Vec<RewardRule>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/cards - All cards in the catalog
async fn list_cards(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.catalog.cards.clone()))
}

/// GET /api/cards/:card_id - One card with its reward rules
async fn get_card(State(state): State<AppState>, Path(card_id): Path<String>) -> Response {
    let card_id = card_id.trim();
    match state.catalog.card(card_id) {
        Some(card) => {
            let detail = CardDetailResponse {
                card: card.clone(),
                rules: state.catalog.rules_for(card_id).into_iter().cloned().collect(),
            };
            (StatusCode::OK, Json(ApiResponse::ok(detail))).into_response()
        }
        None => error_response(EngineError::UnknownCard(card_id.to_string())),
    }
}

/// POST /api/recommend - Rank cards for one purchase
async fn recommend(State(state): State<AppState>, Json(req): Json<RecommendRequest>) -> Response {
    let ctx = TransactionContext::new(req.merchant, req.spend_channel, req.merchant_category);

    let result: Result<Ranking, EngineError> =
        state.catalog.rank(&state.ranker, req.card_ids.as_deref(), &ctx, req.amount);

    match result {
        Ok(ranking) => (StatusCode::OK, Json(ApiResponse::ok(ranking))).into_response(),
        Err(err) => error_response(err),
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/cards", get(list_cards))
        .route("/cards/:card_id", get(get_card))
        .route("/recommend", post(recommend))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(Catalog::demo().unwrap(), RewardRanker::new()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_list_and_get_cards() {
        let request = Request::builder().uri("/api/cards").body(Body::empty()).unwrap();
        let (_, body) = send(app(), request).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 5);

        let request = Request::builder().uri("/api/cards/esun_ubear").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["rules"].as_array().unwrap().len(), 4);

        let request = Request::builder().uri("/api/cards/%20esun_ubear%20").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["card"]["card_id"], "esun_ubear");

        let request = Request::builder().uri("/api/cards/missing").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_recommend_ranks_selected_cards() {
        let request = post_json(
            "/api/recommend",
            serde_json::json!({
                "merchant": "YouTube",
                "amount": "500",
                "spend_channel": "online",
                "merchant_category": "online_digital",
                "card_ids": ["ctbc_linepay", "cathay_cube"]
            }),
        );

        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["best"]["card_id"], "cathay_cube");
        assert_eq!(body["data"]["best"]["reward_amount"], "15.00");
        assert_eq!(body["data"]["entries"][1]["card_id"], "ctbc_linepay");
        assert_eq!(body["data"]["entries"][1]["tier"], "general_fallback");
    }

    #[tokio::test]
    async fn test_recommend_rejects_empty_selection() {
        let request = post_json(
            "/api/recommend",
            serde_json::json!({"merchant": "x", "amount": "10", "card_ids": []}),
        );

        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "no cards selected for ranking");
    }

    #[tokio::test]
    async fn test_recommend_unknown_card_is_not_found() {
        let request = post_json(
            "/api/recommend",
            serde_json::json!({"merchant": "x", "amount": "10", "card_ids": ["ghost"]}),
        );

        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
