pub mod client;
pub mod files;
pub mod health;
pub mod openapi;
pub mod schemas;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use self::client::TrustProxy;
use self::openapi::ApiDoc;
use crate::service::FileService;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FileService>,
    /// Directory uploads are spooled into.
    pub temp_dir: Arc<PathBuf>,
    /// Request body cap for `POST /files`.
    pub max_upload_bytes: usize,
    /// Whether `X-Forwarded-For` names the client.
    pub trust_proxy: bool,
}

impl FromRef<AppState> for TrustProxy {
    fn from_ref(state: &AppState) -> Self {
        Self(state.trust_proxy)
    }
}

/// Build the Axum router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health))
        .route("/files", post(files::upload).layer(upload_limit))
        .route(
            "/files/{key}",
            get(files::download).delete(files::delete),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
