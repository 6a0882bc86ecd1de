//! Integration events emitted on loan transitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::loan::{LoanRecord, LoanStatus};

/// Stream carrying every lifecycle transition event.
pub const TOPIC_LIFECYCLE: &str = "borrow-events";
/// Stream carrying overdue promotions from the sweep.
pub const TOPIC_OVERDUE: &str = "borrow-overdue";
/// Stream carrying due-soon reminders from the sweep.
pub const TOPIC_DUE_SOON: &str = "borrow-due-soon";

// ---------------------------------------------------------------------------
// BorrowEventType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorrowEventType {
    BorrowRequested,
    BorrowApproved,
    BorrowRejected,
    BookBorrowed,
    BookReturned,
    DueDateExtended,
    LoanOverdue,
    LoanDueSoon,
    LoanLost,
}

impl std::fmt::Display for BorrowEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BorrowEventType::BorrowRequested => "BORROW_REQUESTED",
            BorrowEventType::BorrowApproved => "BORROW_APPROVED",
            BorrowEventType::BorrowRejected => "BORROW_REJECTED",
            BorrowEventType::BookBorrowed => "BOOK_BORROWED",
            BorrowEventType::BookReturned => "BOOK_RETURNED",
            BorrowEventType::DueDateExtended => "DUE_DATE_EXTENDED",
            BorrowEventType::LoanOverdue => "LOAN_OVERDUE",
            BorrowEventType::LoanDueSoon => "LOAN_DUE_SOON",
            BorrowEventType::LoanLost => "LOAN_LOST",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// BorrowEvent
// ---------------------------------------------------------------------------

/// Event payload published for downstream consumers (notifications,
/// analytics). Field names are camelCase on the wire; this is a
/// cross-service contract, do not rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowEvent {
    pub event_type: BorrowEventType,
    pub loan_id: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub status: LoanStatus,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

impl BorrowEvent {
    pub fn new(
        event_type: BorrowEventType,
        record: &LoanRecord,
        details: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            loan_id: record.id,
            item_id: record.item_id,
            user_id: record.user_id,
            status: record.status,
            timestamp: Utc::now(),
            details: details.into(),
        }
    }
}
