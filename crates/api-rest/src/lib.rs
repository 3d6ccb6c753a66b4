//! # API REST
//!
//! REST API for clinq.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - the OpenAPI document
//! - REST-specific concerns (JSON bodies, status codes, CORS)
//!
//! Uses `api-shared` for wire types and `clinq-core` for query execution. The router is built
//! here so the standalone `clinq-api-rest` binary and the workspace's `clinq-run` binary serve
//! the same endpoints.

#![warn(rust_2018_idioms)]

use api_shared::{
    AgeFilterRes, AgeRangeRes, AnalysisRes, DataSourceReq, DataSourceRes, EntitiesRes, ErrorRes,
    HealthRes, HealthService, QueryReq, QueryRes, SourceHealthRes,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clinq_core::{QueryError, QueryExecutor};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    executor: Arc<QueryExecutor>,
}

impl AppState {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, query, source_health, get_data_source, set_data_source),
    components(schemas(
        HealthRes,
        QueryReq,
        QueryRes,
        AnalysisRes,
        EntitiesRes,
        AgeFilterRes,
        AgeRangeRes,
        SourceHealthRes,
        DataSourceReq,
        DataSourceRes,
        ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router over `executor`.
pub fn router(executor: Arc<QueryExecutor>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/query", axum::routing::post(query))
        .route("/api/health", get(source_health))
        .route(
            "/api/data-source",
            get(get_data_source).post(set_data_source),
        )
        .route("/api-docs/openapi.json", get(openapi))
        .layer(CorsLayer::permissive())
        .with_state(AppState::new(executor))
}

/// Error response: a status code and an [`ErrorRes`] body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorRes,
}

impl ApiError {
    fn invalid_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorRes {
                kind: "InvalidRequest".into(),
                message,
            },
        }
    }
}

/// HTTP status for a failed query or toggle.
pub fn status_for(err: &QueryError) -> StatusCode {
    match err {
        QueryError::Analysis(_) | QueryError::InvalidDataSource(_) => StatusCode::BAD_REQUEST,
        QueryError::RepositoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(kind = err.kind(), "{err}");
        } else {
            tracing::info!(kind = err.kind(), "rejected request: {err}");
        }
        Self {
            status,
            body: ErrorRes {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Liveness", body = HealthRes)
    )
)]
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/api/query",
    request_body = QueryReq,
    responses(
        (status = 200, description = "Analysis trace and FHIR searchset bundle", body = QueryRes),
        (status = 400, description = "Query rejected by the analyzer", body = ErrorRes),
        (status = 503, description = "Active repository unavailable", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Runs a free-text clinical query against the active repository.
#[axum::debug_handler]
async fn query(
    State(state): State<AppState>,
    req: Result<Json<QueryReq>, JsonRejection>,
) -> Result<Json<QueryRes>, ApiError> {
    let Json(req) = req?;
    let outcome = state.executor.execute(&req.query).await?;
    Ok(Json(outcome.to_response()?))
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Reachability of the active repository", body = SourceHealthRes)
    )
)]
#[axum::debug_handler]
async fn source_health(State(state): State<AppState>) -> Json<SourceHealthRes> {
    Json(state.executor.controller().health().await.into())
}

#[utoipa::path(
    get,
    path = "/api/data-source",
    responses(
        (status = 200, description = "Active data source", body = DataSourceRes)
    )
)]
#[axum::debug_handler]
async fn get_data_source(State(state): State<AppState>) -> Json<DataSourceRes> {
    Json(state.executor.controller().current().into())
}

#[utoipa::path(
    post,
    path = "/api/data-source",
    request_body = DataSourceReq,
    responses(
        (status = 200, description = "Data source after the toggle", body = DataSourceRes),
        (status = 400, description = "Unrecognised target", body = ErrorRes)
    )
)]
/// Switches every subsequent query to the named data source.
#[axum::debug_handler]
async fn set_data_source(
    State(state): State<AppState>,
    req: Result<Json<DataSourceReq>, JsonRejection>,
) -> Result<Json<DataSourceRes>, ApiError> {
    let Json(req) = req?;
    let mode = state.executor.controller().toggle_token(&req.target)?;
    Ok(Json(mode.into()))
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use chrono::NaiveDate;
    use clinq_core::{CoreConfig, RepositoryMode};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let cfg = CoreConfig::new(
            RepositoryMode::Mock,
            "http://127.0.0.1:9".into(),
            Duration::from_millis(200),
            100,
            50,
        )
        .expect("config")
        .with_reference_date(NaiveDate::from_ymd_opt(2024, 6, 1));
        router(Arc::new(QueryExecutor::from_config(&cfg).expect("executor")))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn liveness() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn query_returns_trace_and_bundle() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/api/query",
            Some(serde_json::json!({"query": "show diabetic patients over 50"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data_source"], "MockRepository");
        assert_eq!(body["analysis"]["intent"], "patient_search");
        assert_eq!(body["analysis"]["entities"]["age_filter"], serde_json::json!({"min": 50}));
        assert_eq!(body["analysis"]["entities"]["conditions"], serde_json::json!(["diabetes"]));
        assert_eq!(body["results"]["type"], "searchset");
        assert_eq!(body["results"]["total"], 1);
    }

    #[tokio::test]
    async fn oversized_query_is_bad_request() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/api/query",
            Some(serde_json::json!({"query": "patients ".repeat(20)})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "AnalysisError");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/api/query",
            Some(serde_json::json!({"text": "patients"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "InvalidRequest");
    }

    #[tokio::test]
    async fn unreachable_external_is_service_unavailable() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/data-source",
            Some(serde_json::json!({"target": "hapi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "external_service");
        assert_eq!(body["data_source"], "ExternalServiceRepository");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/query",
            Some(serde_json::json!({"query": "show me all patients"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "RepositoryUnavailable");

        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert_eq!(body["data_source"], "ExternalServiceRepository");
        assert_eq!(body["source_url"], "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn invalid_target_leaves_mode_unchanged() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/data-source",
            Some(serde_json::json!({"target": "sqlite"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "InvalidDataSource");

        let (status, body) = send(&app, Method::GET, "/api/data-source", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "mock");
    }

    #[tokio::test]
    async fn mock_health_is_ok() {
        let (status, body) = send(&app(), Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data_source"], "MockRepository");
    }

    #[tokio::test]
    async fn openapi_lists_query_path() {
        let (status, body) = send(&app(), Method::GET, "/api-docs/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/query"].is_object());
    }
}
