//! API handlers for Circulate REST endpoints

pub mod borrows;
pub mod health;
pub mod openapi;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Borrow lifecycle
        .route("/borrows/request", post(borrows::request_borrow))
        .route("/borrows/approve", post(borrows::decide_borrow))
        .route("/borrows/extend", post(borrows::extend_due_date))
        .route("/borrows/:id/complete", post(borrows::complete_borrow))
        .route("/borrows/:id/return", post(borrows::return_borrow))
        .route("/borrows/:id/lost", post(borrows::mark_lost))
        // Borrow queries
        .route("/borrows/:id", get(borrows::get_borrow))
        .route("/borrows/user/:user_id", get(borrows::get_user_history))
        .route("/borrows/item/:item_id", get(borrows::get_item_history))
        .route("/borrows/requests", get(borrows::get_pending_requests))
        .route("/borrows/overdue", get(borrows::get_overdue))
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
