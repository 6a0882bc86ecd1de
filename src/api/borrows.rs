//! Borrow lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::LoanView,
};

/// Borrow request body
#[derive(Deserialize, Validate, ToSchema)]
pub struct BorrowRequestBody {
    /// Inventory item to borrow
    #[validate(range(min = 1, message = "item_id must be positive"))]
    pub item_id: i64,
    /// Borrowing user
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,
}

/// Approval decision body. `approved = false` rejects the request and
/// requires a reason.
#[derive(Deserialize, Validate, ToSchema)]
pub struct BorrowApprovalBody {
    /// Loan to decide on
    #[validate(range(min = 1, message = "borrow_id must be positive"))]
    pub borrow_id: i64,
    /// User making the decision
    #[serde(alias = "approved_by")]
    #[validate(range(min = 1, message = "approver_id must be positive"))]
    pub approver_id: i64,
    /// true to approve, false to reject
    pub approved: bool,
    /// Reason for rejection (required when approved is false)
    pub rejection_reason: Option<String>,
}

/// Due date extension body
#[derive(Deserialize, Validate, ToSchema)]
pub struct ExtensionRequestBody {
    /// Loan to extend
    #[validate(range(min = 1, message = "borrow_id must be positive"))]
    pub borrow_id: i64,
    /// New due date, must fall after the current effective due date
    pub new_due_date: DateTime<Utc>,
}

/// Lost write-off body
#[derive(Deserialize, Validate, ToSchema)]
pub struct MarkLostBody {
    /// Operator performing the write-off
    #[validate(range(min = 1, message = "operator_id must be positive"))]
    pub operator_id: i64,
}

fn check(body: &impl Validate) -> AppResult<()> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Request to borrow an item
#[utoipa::path(
    post,
    path = "/borrows/request",
    tag = "borrows",
    request_body = BorrowRequestBody,
    responses(
        (status = 201, description = "Borrow request created", body = LoanView),
        (status = 404, description = "Item or user not found"),
        (status = 409, description = "Precondition failed: inactive user, borrow limit, unavailable item or open loan"),
        (status = 503, description = "Inventory or identity service unavailable")
    )
)]
pub async fn request_borrow(
    State(state): State<crate::AppState>,
    Json(body): Json<BorrowRequestBody>,
) -> AppResult<(StatusCode, Json<LoanView>)> {
    check(&body)?;

    let view = state
        .services
        .borrows
        .request_borrow(body.item_id, body.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Approve or reject a pending borrow request
#[utoipa::path(
    post,
    path = "/borrows/approve",
    tag = "borrows",
    request_body = BorrowApprovalBody,
    responses(
        (status = 200, description = "Decision recorded", body = LoanView),
        (status = 400, description = "Rejection without a reason"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not awaiting a decision"),
        (status = 503, description = "Inventory service unavailable")
    )
)]
pub async fn decide_borrow(
    State(state): State<crate::AppState>,
    Json(body): Json<BorrowApprovalBody>,
) -> AppResult<Json<LoanView>> {
    check(&body)?;

    let view = if body.approved {
        state
            .services
            .borrows
            .approve(body.borrow_id, body.approver_id)
            .await?
    } else {
        let reason = body
            .rejection_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                AppError::Validation("A rejection requires a rejection_reason".to_string())
            })?;
        state
            .services
            .borrows
            .reject(body.borrow_id, body.approver_id, reason)
            .await?
    };
    Ok(Json(view))
}

/// Complete the borrow: hand the item over and activate the loan
#[utoipa::path(
    post,
    path = "/borrows/{id}/complete",
    tag = "borrows",
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan is now active", body = LoanView),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not approved")
    )
)]
pub async fn complete_borrow(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanView>> {
    let view = state.services.borrows.complete_borrow(loan_id).await?;
    Ok(Json(view))
}

/// Return a borrowed item
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Item returned, fine assessed if late", body = LoanView),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not out"),
        (status = 503, description = "Inventory service unavailable")
    )
)]
pub async fn return_borrow(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanView>> {
    let view = state.services.borrows.return_loan(loan_id).await?;
    Ok(Json(view))
}

/// Extend the due date of an active loan
#[utoipa::path(
    post,
    path = "/borrows/extend",
    tag = "borrows",
    request_body = ExtensionRequestBody,
    responses(
        (status = 200, description = "Due date extended", body = LoanView),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not active or the new date does not extend the loan")
    )
)]
pub async fn extend_due_date(
    State(state): State<crate::AppState>,
    Json(body): Json<ExtensionRequestBody>,
) -> AppResult<Json<LoanView>> {
    check(&body)?;

    let view = state
        .services
        .borrows
        .extend_due_date(body.borrow_id, body.new_due_date)
        .await?;
    Ok(Json(view))
}

/// Write an overdue loan off as lost
#[utoipa::path(
    post,
    path = "/borrows/{id}/lost",
    tag = "borrows",
    params(("id" = i64, Path, description = "Loan ID")),
    request_body = MarkLostBody,
    responses(
        (status = 200, description = "Loan written off", body = LoanView),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not overdue")
    )
)]
pub async fn mark_lost(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<i64>,
    Json(body): Json<MarkLostBody>,
) -> AppResult<Json<LoanView>> {
    check(&body)?;

    let view = state
        .services
        .borrows
        .mark_lost(loan_id, body.operator_id)
        .await?;
    Ok(Json(view))
}

/// Get a single loan
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan with item and user snapshots", body = LoanView),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_borrow(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanView>> {
    let view = state.services.borrows.get_loan(loan_id).await?;
    Ok(Json(view))
}

/// Get borrow history for a user
#[utoipa::path(
    get,
    path = "/borrows/user/{user_id}",
    tag = "borrows",
    params(("user_id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User's borrow history, newest first", body = Vec<LoanView>)
    )
)]
pub async fn get_user_history(
    State(state): State<crate::AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<LoanView>>> {
    let views = state.services.borrows.loans_for_user(user_id).await?;
    Ok(Json(views))
}

/// Get borrow history for an item
#[utoipa::path(
    get,
    path = "/borrows/item/{item_id}",
    tag = "borrows",
    params(("item_id" = i64, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item's borrow history, newest first", body = Vec<LoanView>)
    )
)]
pub async fn get_item_history(
    State(state): State<crate::AppState>,
    Path(item_id): Path<i64>,
) -> AppResult<Json<Vec<LoanView>>> {
    let views = state.services.borrows.loans_for_item(item_id).await?;
    Ok(Json(views))
}

/// Get all pending borrow requests
#[utoipa::path(
    get,
    path = "/borrows/requests",
    tag = "borrows",
    responses(
        (status = 200, description = "Requests awaiting a decision, oldest first", body = Vec<LoanView>)
    )
)]
pub async fn get_pending_requests(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<LoanView>>> {
    let views = state.services.borrows.pending_requests().await?;
    Ok(Json(views))
}

/// Get all overdue loans
#[utoipa::path(
    get,
    path = "/borrows/overdue",
    tag = "borrows",
    responses(
        (status = 200, description = "Loans past their effective due date", body = Vec<LoanView>)
    )
)]
pub async fn get_overdue(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<LoanView>>> {
    let views = state.services.borrows.overdue_loans().await?;
    Ok(Json(views))
}
