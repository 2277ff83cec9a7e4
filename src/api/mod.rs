pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::service::ValidatorService;

pub use error::{ApiError, ErrorResponse};
pub use handlers::*;

// multipart 边界等额外开销
const BODY_LIMIT_MARGIN: usize = 1024 * 1024;

/// 构建路由
pub fn router(service: Arc<ValidatorService>, config: &AppConfig) -> Router {
    let api_routes = Router::new()
        .route("/contracts", get(handlers::list_contracts).post(handlers::create_contract))
        .route("/contracts/upload", post(handlers::upload_contract))
        .route(
            "/contracts/:id",
            get(handlers::get_contract)
                .put(handlers::update_contract)
                .delete(handlers::delete_contract),
        )
        .route("/invoices", get(handlers::list_invoices))
        .route("/invoices/process", post(handlers::process_invoice))
        .route("/invoices/process-base64", post(handlers::process_invoice_base64))
        .route(
            "/invoices/:id",
            get(handlers::get_invoice).delete(handlers::delete_invoice),
        )
        .route("/documents/verify", post(handlers::verify_document))
        .route("/compare", post(handlers::compare))
        .route(
            "/compare/:contract_id/:invoice_id/export",
            get(handlers::export_comparison),
        )
        .with_state(service);

    // base64 编码后约为原文件的 4/3
    let body_limit = config.upload.max_file_size / 3 * 4 + BODY_LIMIT_MARGIN;

    let origin = HeaderValue::from_str(&config.server.cors_allow_origin).unwrap_or_else(|_| {
        tracing::warn!(
            origin = %config.server.cors_allow_origin,
            "Invalid CORS origin, falling back to *"
        );
        HeaderValue::from_static("*")
    });

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .nest(&config.server.api_prefix, api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_tracing))
                .layer(axum::middleware::from_fn_with_state(origin, middleware::cors))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}
