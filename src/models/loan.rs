//! Loan record model and status machine vocabulary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a loan record.
///
/// Stored as SMALLINT; serialized in SCREAMING_SNAKE_CASE on every wire
/// surface (API responses and events) so downstream consumers see the same
/// labels regardless of source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum LoanStatus {
    Requested = 0,
    Approved = 1,
    Rejected = 2,
    Active = 3,
    Returned = 4,
    Overdue = 5,
    Lost = 6,
}

/// Statuses under which a record still blocks new borrows of its item.
pub const OPEN_STATUSES: [LoanStatus; 4] = [
    LoanStatus::Requested,
    LoanStatus::Approved,
    LoanStatus::Active,
    LoanStatus::Overdue,
];

impl LoanStatus {
    /// Terminal records are kept for history and never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoanStatus::Rejected | LoanStatus::Returned | LoanStatus::Lost
        )
    }

    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

impl From<i16> for LoanStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => LoanStatus::Approved,
            2 => LoanStatus::Rejected,
            3 => LoanStatus::Active,
            4 => LoanStatus::Returned,
            5 => LoanStatus::Overdue,
            6 => LoanStatus::Lost,
            _ => LoanStatus::Requested,
        }
    }
}

impl From<LoanStatus> for i16 {
    fn from(s: LoanStatus) -> Self {
        s as i16
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoanStatus::Requested => "REQUESTED",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Overdue => "OVERDUE",
            LoanStatus::Lost => "LOST",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// LoanRecord
// ---------------------------------------------------------------------------

/// Loan record from the store.
///
/// `item_id` and `user_id` are weak references into the inventory and
/// identity services; no foreign keys exist on them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanRecord {
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanRecord {
    /// The due date in force: the extension when one was granted, the
    /// original otherwise. Fines and due-soon selection use this; the
    /// overdue sweep deliberately matches on the original `due_at`.
    pub fn effective_due_at(&self) -> DateTime<Utc> {
        self.extended_due_at.unwrap_or(self.due_at)
    }

    /// Whole days past the effective due date at `at`, zero when not late.
    /// Partial days do not count.
    pub fn days_late(&self, at: DateTime<Utc>) -> i64 {
        (at - self.effective_due_at()).num_days().max(0)
    }
}

/// Insert shape for a new borrow request. Status always starts at
/// `Requested` with a zero fine.
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub item_id: i64,
    pub user_id: i64,
    pub requested_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(due_at: DateTime<Utc>, extended: Option<DateTime<Utc>>) -> LoanRecord {
        LoanRecord {
            id: 1,
            item_id: 10,
            user_id: 20,
            status: LoanStatus::Active,
            requested_at: due_at - Duration::days(14),
            borrowed_at: Some(due_at - Duration::days(14)),
            due_at,
            extended_due_at: extended,
            returned_at: None,
            approved_at: None,
            approver_id: None,
            rejection_reason: None,
            fine_amount: 0.0,
            created_at: due_at - Duration::days(14),
            updated_at: due_at - Duration::days(14),
        }
    }

    #[test]
    fn effective_due_prefers_extension() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let extended = due + Duration::days(7);
        assert_eq!(record(due, None).effective_due_at(), due);
        assert_eq!(record(due, Some(extended)).effective_due_at(), extended);
    }

    #[test]
    fn days_late_truncates_partial_days() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let rec = record(due, None);
        assert_eq!(rec.days_late(due), 0);
        assert_eq!(rec.days_late(due + Duration::hours(23)), 0);
        assert_eq!(rec.days_late(due + Duration::days(3)), 3);
        assert_eq!(rec.days_late(due + Duration::days(3) + Duration::hours(5)), 3);
    }

    #[test]
    fn days_late_is_zero_before_due() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let rec = record(due, None);
        assert_eq!(rec.days_late(due - Duration::days(2)), 0);
    }

    #[test]
    fn days_late_uses_extension_when_present() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let rec = record(due, Some(due + Duration::days(7)));
        assert_eq!(rec.days_late(due + Duration::days(3)), 0);
        assert_eq!(rec.days_late(due + Duration::days(9)), 2);
    }

    #[test]
    fn status_roundtrips_through_i16() {
        for status in [
            LoanStatus::Requested,
            LoanStatus::Approved,
            LoanStatus::Rejected,
            LoanStatus::Active,
            LoanStatus::Returned,
            LoanStatus::Overdue,
            LoanStatus::Lost,
        ] {
            assert_eq!(LoanStatus::from(i16::from(status)), status);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(LoanStatus::Rejected.is_terminal());
        assert!(LoanStatus::Returned.is_terminal());
        assert!(LoanStatus::Lost.is_terminal());
        for status in OPEN_STATUSES {
            assert!(status.is_open());
        }
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&LoanStatus::Active).unwrap();
        assert_eq!(json, "\"ACTIVE\"");
        assert_eq!(LoanStatus::Overdue.to_string(), "OVERDUE");
    }
}
