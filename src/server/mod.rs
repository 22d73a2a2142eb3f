mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::redesign_handler, api::refine_handler, api::search_handler),
    components(schemas(
        types::RedesignForm,
        types::RedesignResponse,
        types::RefineRequest,
        types::RefineResponse,
        types::SearchRequest,
        types::SearchResponse,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api::index_handler))
        .route("/api/redesign", post(api::redesign_handler))
        .route("/api/refine", post(api::refine_handler))
        .route("/api/search-furniture", post(api::search_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：16M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 16))
        .with_state(state)
}
