//! services/api/src/web/router.rs
//!
//! Assembles the HTTP router shared by the server binary and the tests.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::middleware::bucket_context;
use crate::web::rest::{
    export_handler, generate_handler, health_handler, healthz_handler, index_handler,
    privacy_delete_handler, remove_handler, reset_handler, upload_handler, ApiDoc,
};
use crate::web::state::AppState;

pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Bucket routes (the bucket middleware resolves the caller's bucket first)
    let bucket_routes = Router::new()
        .route("/", get(index_handler))
        .route("/upload", post(upload_handler))
        .route("/remove/{file_id}", post(remove_handler))
        .route("/reset", post(reset_handler))
        .route("/generate", post(generate_handler))
        .route("/export", post(export_handler))
        .route("/privacy/delete", post(privacy_delete_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            bucket_context,
        ));

    // Probes touch no bucket
    let probe_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(healthz_handler));

    let mut api_router = Router::new()
        .merge(bucket_routes)
        .merge(probe_routes)
        .layer(DefaultBodyLimit::max(app_state.config.max_request_bytes));

    if let Some(origin) = &app_state.config.cors_origin {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                let cors = CorsLayer::new()
                    .allow_origin(origin)
                    .allow_credentials(true)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([CONTENT_TYPE, ACCEPT]);
                api_router = api_router.layer(cors);
            }
            Err(e) => warn!("Ignoring invalid CORS_ORIGIN: {}", e),
        }
    }

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router.with_state(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
