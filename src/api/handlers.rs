//! Axum request handlers for the HTTP API.
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::api::routes::AppState;
use crate::archive::ARCHIVE_FILE_NAME;
use crate::error::AppError;
use crate::prompt::catalog::DETECTION_CLASSES;
use crate::session::StatusView;
use crate::utils::media::SourceImage;

/// Error wrapper that picks a status code per `AppError` kind.
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Archive(_) | AppError::Api(_) | AppError::NoImage | AppError::HttpClient(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub async fn root() -> &'static str {
    "Expression Forge"
}

pub async fn put_source(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .ok_or_else(|| AppError::InvalidInput("Content-Type header is required".to_string()))?;
    let source = SourceImage::new(body.to_vec(), mime)?;
    state.session.select_source(source).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_source(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.session.clear_source().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn generate(State(state): State<Arc<AppState>>) -> ApiResult<(StatusCode, Json<StatusView>)> {
    state.session.start_generation().await?;
    Ok((StatusCode::ACCEPTED, Json(state.session.status().await)))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusView> {
    Json(state.session.status().await)
}

pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state.session.image_bytes(id).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

pub async fn get_label(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<String> {
    Ok(state.session.image(id).await?.label)
}

pub async fn download(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let bytes = state.session.download().await?;
    let disposition = format!("attachment; filename=\"{}\"", ARCHIVE_FILE_NAME);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

pub async fn dismiss_error(State(state): State<Arc<AppState>>) -> StatusCode {
    state.session.dismiss_error().await;
    StatusCode::NO_CONTENT
}

pub async fn classes() -> String {
    DETECTION_CLASSES.join("\n")
}
