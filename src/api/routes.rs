//! Router and shared state for the HTTP service.
use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::session::Session;

pub struct AppState {
    pub session: Session,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/source", put(handlers::put_source).delete(handlers::delete_source))
        .route("/generate", post(handlers::generate))
        .route("/status", get(handlers::status))
        .route("/images/:id", get(handlers::get_image))
        .route("/images/:id/label", get(handlers::get_label))
        .route("/download", get(handlers::download))
        .route("/error", delete(handlers::dismiss_error))
        .route("/classes", get(handlers::classes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
