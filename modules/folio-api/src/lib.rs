// REST surface for the pipeline: submit a URL, poll a crawl task, read
// quota standing. Everything else the product serves (article CRUD, search,
// categories) lives outside this crate.

pub mod jwt;
mod routes;

pub use jwt::JwtService;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use folio_common::FolioError;
use folio_pipeline::traits::{QuotaStore, TaskStore};
use folio_pipeline::SubmissionService;

pub struct AppState {
    pub submissions: SubmissionService,
    pub tasks: Arc<dyn TaskStore>,
    pub users: Arc<dyn QuotaStore>,
    pub jwt: JwtService,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/articles", post(routes::submit_article))
        .route("/api/tasks/{id}", get(routes::task_status))
        .route("/api/user/quota", get(routes::quota_info))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

/// Map pipeline errors onto the REST surface.
pub(crate) fn error_response(err: FolioError) -> Response {
    let (status, message) = match &err {
        FolioError::QuotaExceeded => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
        FolioError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        FolioError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        _ => {
            tracing::error!(error = %err, "Request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    };
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
