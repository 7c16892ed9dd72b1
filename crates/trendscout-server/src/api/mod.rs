//! HTTP API: router assembly, the response envelope, and shared handler
//! state.
//!
//! Every success body is `ApiResponse { data, meta }` and every error body
//! is `ApiError { error: { code, message }, meta }`; `meta` carries the
//! request id so clients can quote it back when reporting problems.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use trendscout_core::AppConfig;
use trendscout_db::DbError;
use trendscout_sources::SharedBudget;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

pub mod dashboard;
pub mod discovery;
pub mod trends;

const DEFAULT_TREND_LIMIT: i64 = 20;
const MAX_TREND_LIMIT: i64 = 100;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub budget: SharedBudget,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, request_id: &RequestId) -> Self {
        Self {
            data,
            meta: ResponseMeta {
                request_id: request_id.0.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

impl ApiError {
    pub fn new(code: &str, message: impl Into<String>, request_id: &RequestId) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_owned(),
                message: message.into(),
            },
            meta: ResponseMeta {
                request_id: request_id.0.clone(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "validation_error" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "not_found" => StatusCode::NOT_FOUND,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "auth_failure" | "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Database errors cross the API boundary as opaque `internal_error`s; the
/// detail goes to the log, keyed by request id.
pub(crate) fn map_db_error(err: &DbError, request_id: &RequestId) -> ApiError {
    match err {
        DbError::NotFound => ApiError::new("not_found", "resource not found", request_id),
        other => {
            tracing::error!(request_id = %request_id.0, error = %other, "database error");
            ApiError::new("internal_error", "internal server error", request_id)
        }
    }
}

pub(crate) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_TREND_LIMIT).clamp(1, MAX_TREND_LIMIT)
}

/// Assembles the full router: `/health` is public, everything under `/api`
/// sits behind the rate limit and bearer auth. Request-id assignment is the
/// outermost layer so even middleware rejections carry an id.
pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/discovery/run", post(discovery::trigger_discovery))
        .route("/api/trends", get(trends::list_trends))
        .route("/api/dashboard", get(dashboard::dashboard))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        );

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(request_id))
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

async fn health(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Json<ApiResponse<HealthData>> {
    let database = match trendscout_db::ping(&state.pool).await {
        Ok(()) => "reachable",
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the database");
            "unreachable"
        }
    };
    let status = if database == "reachable" {
        "ok"
    } else {
        "degraded"
    };

    Json(ApiResponse::new(HealthData { status, database }, &request_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::Utc;
    use std::time::Duration;
    use tower::ServiceExt;
    use trendscout_core::Environment;
    use trendscout_sources::{shared, RateBudgetConfig, RateBudgetTracker};

    fn test_request_id() -> RequestId {
        RequestId("req-123".to_owned())
    }

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/unused".to_owned(),
            env: Environment::Test,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".to_owned(),
            reddit_client_id: None,
            reddit_client_secret: None,
            reddit_user_agent: "trendscout-test".to_owned(),
            reddit_feed: "popular".to_owned(),
            x_bearer_token: None,
            x_search_query: "viral".to_owned(),
            insight_service_url: None,
            insight_timeout_secs: 5,
            db_max_connections: 2,
            db_min_connections: 1,
            db_acquire_timeout_secs: 1,
            source_request_timeout_secs: 5,
            source_max_retries: 1,
            source_backoff_base_ms: 10,
            max_posts_per_source: 50,
            min_discovery_interval_mins: 15,
            dashboard_lookback_hours: 24,
            discovery_cron: "0 */30 * * * *".to_owned(),
        }
    }

    /// Lazy pool: no connection is attempted until a query runs, so these
    /// tests exercise the router without a live database.
    fn test_state() -> AppState {
        let pool = PgPool::connect_lazy("postgres://localhost:1/unreachable")
            .expect("lazy pool from a well-formed url");
        AppState {
            pool,
            config: Arc::new(test_config()),
            budget: shared(RateBudgetTracker::new(
                RateBudgetConfig::standard(),
                Utc::now(),
            )),
        }
    }

    fn open_app() -> Router {
        let auth = AuthState::from_keys(None, true).expect("auth disabled in development");
        build_app(test_state(), auth, RateLimitState::standard())
    }

    fn secured_app() -> Router {
        let auth = AuthState::from_keys(Some("secret".to_owned()), false).expect("one key");
        build_app(test_state(), auth, RateLimitState::standard())
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    // --- envelope ---------------------------------------------------------

    #[test]
    fn success_envelope_carries_data_and_request_id() {
        let response = ApiResponse::new(serde_json::json!({"n": 1}), &test_request_id());
        let value = serde_json::to_value(&response).expect("serializes");
        assert_eq!(value["data"]["n"], 1);
        assert_eq!(value["meta"]["request_id"], "req-123");
    }

    #[test]
    fn error_codes_map_to_http_statuses() {
        let cases = [
            ("validation_error", StatusCode::BAD_REQUEST),
            ("unauthorized", StatusCode::UNAUTHORIZED),
            ("not_found", StatusCode::NOT_FOUND),
            ("rate_limited", StatusCode::TOO_MANY_REQUESTS),
            ("auth_failure", StatusCode::BAD_GATEWAY),
            ("upstream_error", StatusCode::BAD_GATEWAY),
            ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
            ("something_new", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, expected) in cases {
            let response = ApiError::new(code, "boom", &test_request_id()).into_response();
            assert_eq!(response.status(), expected, "status for code {code}");
        }
    }

    #[test]
    fn limit_is_defaulted_and_clamped() {
        assert_eq!(normalize_limit(None), 20);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(70)), 70);
        assert_eq!(normalize_limit(Some(5000)), 100);
    }

    // --- router -----------------------------------------------------------

    // Test 1 - health stays up (degraded) when the database is unreachable.
    #[tokio::test]
    async fn health_reports_degraded_without_a_database() {
        let response = open_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("infallible router");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers().contains_key("x-request-id"),
            "request id header is always set"
        );
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "degraded");
        assert_eq!(body["data"]["database"], "unreachable");
    }

    // Test 2 - protected routes reject requests without a bearer token.
    #[tokio::test]
    async fn protected_routes_require_a_bearer_token() {
        let response = secured_app()
            .oneshot(
                Request::builder()
                    .uri("/api/trends")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("infallible router");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "unauthorized");
        assert_eq!(body["meta"]["request_id"].as_str().map(str::is_empty), Some(false));
    }

    // Test 3 - a wrong token is rejected the same way as a missing one.
    #[tokio::test]
    async fn wrong_bearer_token_is_rejected() {
        let response = secured_app()
            .oneshot(
                Request::builder()
                    .uri("/api/trends")
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("infallible router");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Test 4 - the shared rate limit kicks in after the window budget.
    #[tokio::test]
    async fn rate_limit_rejects_the_request_over_budget() {
        let auth = AuthState::from_keys(None, true).expect("auth disabled");
        let app = build_app(
            test_state(),
            auth,
            RateLimitState::new(Duration::from_secs(60), 1),
        );

        let first = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/trends")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("infallible router");
        assert_ne!(
            first.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "first request is within budget"
        );

        let second = app
            .oneshot(
                Request::builder()
                    .uri("/api/trends")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("infallible router");
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(
            second.headers().contains_key(header::RETRY_AFTER),
            "429 carries a retry-after header"
        );
    }

    // Test 5 - an unknown source name fails validation before any work runs.
    #[tokio::test]
    async fn unknown_discovery_source_is_a_validation_error() {
        let response = open_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/discovery/run")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"sources": ["myspace"]}"#))
                    .expect("request"),
            )
            .await
            .expect("infallible router");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation_error");
    }
}
