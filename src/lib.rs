pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod service;
pub mod transfers;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use handlers::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::api::health))

        // Transfers
        .route(
            "/api/transfers",
            get(handlers::transfers::list_transfers).post(handlers::transfers::create_transfer),
        )
        .route("/api/transfers/:id", get(handlers::transfers::get_transfer))
        .route("/api/transfers/:id/cancel", post(handlers::transfers::cancel_transfer))

        // Transfer items
        .route("/api/transfer-items/:id/approve", post(handlers::transfers::approve_item))
        .route("/api/transfer-items/:id/prepare", post(handlers::transfers::prepare_item))
        .route("/api/transfer-items/:id/deliver", post(handlers::transfers::deliver_item))
        .route("/api/transfer-items/:id/cancel", post(handlers::transfers::cancel_item))

        // Reference data
        .route("/api/departments", get(handlers::api::list_departments))
        .route("/api/departments/:id/batches", get(handlers::inventory::department_batches))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        )
        .with_state(state)
}
