use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use folio_common::FolioError;
use folio_pipeline::traits::{ClientContent, QuotaStore, TaskStore};
use folio_pipeline::SubmitRequest;

use crate::{error_response, AppState};

/// Authenticated user id, extracted from the `Authorization: Bearer` header.
pub struct AuthUser(pub Uuid);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| unauthorized("missing bearer token"))?;

        let user_id = state
            .jwt
            .verify_token(token)
            .map_err(|_| unauthorized("invalid token"))?;

        Ok(AuthUser(user_id))
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct SubmitBody {
    url: String,
    #[serde(default)]
    content: Option<SubmitContent>,
    #[serde(default)]
    tag_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct SubmitContent {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    site_name: Option<String>,
    markdown: String,
}

/// Reject URLs the pipeline should never fetch: non-http schemes, hostless
/// or oversized values.
fn validate_url(raw: &str) -> Result<(), String> {
    if raw.len() > 2048 {
        return Err("URL too long (max 2048 characters)".to_string());
    }
    let parsed = url::Url::parse(raw).map_err(|_| "Invalid URL".to_string())?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err("URL must use http or https scheme".to_string());
    }
    if parsed.host_str().is_none() {
        return Err("URL must have a host".to_string());
    }
    Ok(())
}

pub async fn submit_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<SubmitBody>,
) -> Response {
    let url = body.url.trim().to_string();
    if let Err(message) = validate_url(&url) {
        return error_response(FolioError::Validation(message));
    }

    let request = SubmitRequest {
        url,
        content: body.content.map(|c| ClientContent {
            title: c.title,
            author: c.author,
            site_name: c.site_name,
            markdown: c.markdown,
        }),
        tag_ids: body.tag_ids,
    };

    match state.submissions.submit(user_id, request).await {
        Ok(receipt) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "article_id": receipt.article_id,
                "task_id": receipt.task_id,
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn task_status(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Response {
    match state.tasks.get(task_id).await {
        Ok(Some(task)) if task.user_id == user_id => Json(task).into_response(),
        // Someone else's task looks like no task at all.
        Ok(_) => error_response(FolioError::NotFound),
        Err(err) => error_response(err),
    }
}

pub async fn quota_info(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Response {
    match state.users.get_user(user_id).await {
        Ok(Some(user)) => Json(serde_json::json!({
            "limit": user.monthly_quota,
            "used": user.current_month_count,
            "reset_at": user.quota_reset_at,
        }))
        .into_response(),
        Ok(None) => error_response(FolioError::NotFound),
        Err(err) => error_response(err),
    }
}
