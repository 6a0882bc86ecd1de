//! Loan record persistence.
//!
//! Everything mutating goes through [`LoanStore::update_if_status`], a
//! status-guarded write: the store only persists the new field values if the
//! stored row still holds one of the expected statuses. That single gate is
//! what makes replayed and concurrent transitions safe without any
//! application-level locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{LoanRecord, LoanStatus, NewLoan};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLoanStore;
pub use postgres::PgLoanStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("loan {0} not found")]
    NotFound(i64),

    /// The guarded write found the row in a different status than expected.
    #[error("loan status changed concurrently (now {actual})")]
    StatusConflict { actual: LoanStatus },

    /// An open (non-terminal) record already exists for the item.
    #[error("item {0} already has an open loan")]
    OpenLoanExists(i64),

    /// More rows matched than the data model allows.
    #[error("data integrity violation: {0}")]
    Integrity(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Insert a new `Requested` record. Refuses with `OpenLoanExists` when
    /// the item already has a non-terminal record.
    async fn create(&self, new: &NewLoan) -> StoreResult<LoanRecord>;

    async fn get_by_id(&self, id: i64) -> StoreResult<LoanRecord>;

    /// Persist `record`'s field values only if the stored row's status is
    /// one of `expected`; returns the stored result. `StatusConflict`
    /// carries the actual status on a stale expectation.
    async fn update_if_status(
        &self,
        record: &LoanRecord,
        expected: &[LoanStatus],
    ) -> StoreResult<LoanRecord>;

    /// Full borrow history of a user, newest request first.
    async fn list_by_user(&self, user_id: i64) -> StoreResult<Vec<LoanRecord>>;

    /// Full borrow history of an item, newest request first.
    async fn list_by_item(&self, item_id: i64) -> StoreResult<Vec<LoanRecord>>;

    /// All records currently in `status`, oldest request first.
    async fn list_by_status(&self, status: LoanStatus) -> StoreResult<Vec<LoanRecord>>;

    /// Records in `status` whose original due date lies strictly before
    /// `cutoff`, soonest due first. Feed for the overdue sweep.
    async fn list_due_before(
        &self,
        status: LoanStatus,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<LoanRecord>>;

    /// Active records whose effective due date falls within
    /// `[from, until]`, soonest due first. Feed for the due-soon sweep.
    async fn list_active_due_within(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<LoanRecord>>;

    /// The at-most-one non-terminal record for an item. Finding more than
    /// one is an `Integrity` error, not a result.
    async fn find_open_loan(&self, item_id: i64) -> StoreResult<Option<LoanRecord>>;

    /// Number of the user's records in {Active, Overdue}; the borrow-limit
    /// counter.
    async fn count_active_borrows(&self, user_id: i64) -> StoreResult<i64>;
}
