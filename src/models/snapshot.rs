//! Read-time snapshots of inventory and identity data, and the loan view
//! returned by the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::loan::{LoanRecord, LoanStatus};

// ---------------------------------------------------------------------------
// ItemStatus
// ---------------------------------------------------------------------------

/// Inventory-side status of an item. Only `Available` and `Borrowed` are
/// ever written by this service; the rest can still show up in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Available,
    Borrowed,
    Maintenance,
    Lost,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ItemStatus::Available => "AVAILABLE",
            ItemStatus::Borrowed => "BORROWED",
            ItemStatus::Maintenance => "MAINTENANCE",
            ItemStatus::Lost => "LOST",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Item as reported by the inventory service. Unknown fields in the
/// upstream body are ignored on decode.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemSnapshot {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub status: ItemStatus,
}

/// User as reported by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSnapshot {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// LoanView
// ---------------------------------------------------------------------------

/// Loan record enriched with best-effort snapshots for display. A snapshot
/// is `None` when the owning service could not be reached; the loan data
/// itself is always present.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanView {
    pub id: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub status: LoanStatus,
    pub requested_at: DateTime<Utc>,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub due_at: DateTime<Utc>,
    pub extended_due_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approver_id: Option<i64>,
    pub rejection_reason: Option<String>,
    pub fine_amount: f64,
    pub item: Option<ItemSnapshot>,
    pub user: Option<UserSnapshot>,
}

impl LoanView {
    pub fn assemble(
        record: LoanRecord,
        item: Option<ItemSnapshot>,
        user: Option<UserSnapshot>,
    ) -> Self {
        Self {
            id: record.id,
            item_id: record.item_id,
            user_id: record.user_id,
            status: record.status,
            requested_at: record.requested_at,
            borrowed_at: record.borrowed_at,
            due_at: record.due_at,
            extended_due_at: record.extended_due_at,
            returned_at: record.returned_at,
            approved_at: record.approved_at,
            approver_id: record.approver_id,
            rejection_reason: record.rejection_reason,
            fine_amount: record.fine_amount,
            item,
            user,
        }
    }
}
