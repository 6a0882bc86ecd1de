//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{borrows, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulate API",
        version = "1.0.0",
        description = "Borrow lifecycle orchestration REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Borrows
        borrows::request_borrow,
        borrows::decide_borrow,
        borrows::complete_borrow,
        borrows::return_borrow,
        borrows::extend_due_date,
        borrows::mark_lost,
        borrows::get_borrow,
        borrows::get_user_history,
        borrows::get_item_history,
        borrows::get_pending_requests,
        borrows::get_overdue,
    ),
    components(
        schemas(
            // Borrows
            borrows::BorrowRequestBody,
            borrows::BorrowApprovalBody,
            borrows::ExtensionRequestBody,
            borrows::MarkLostBody,
            crate::models::LoanView,
            crate::models::LoanStatus,
            crate::models::ItemSnapshot,
            crate::models::ItemStatus,
            crate::models::UserSnapshot,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "borrows", description = "Borrow lifecycle management")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
