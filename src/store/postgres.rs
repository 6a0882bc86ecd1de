//! PostgreSQL-backed loan store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::models::{LoanRecord, LoanStatus, NewLoan, OPEN_STATUSES};

use super::{LoanStore, StoreError, StoreResult};

/// Name of the partial unique index backing the one-open-loan-per-item
/// invariant, see migrations/0001_create_loans.sql.
const OPEN_LOAN_INDEX: &str = "loans_open_item_key";

#[derive(Clone)]
pub struct PgLoanStore {
    pool: Pool<Postgres>,
}

impl PgLoanStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn status_codes(statuses: &[LoanStatus]) -> Vec<i16> {
    statuses.iter().map(|s| i16::from(*s)).collect()
}

fn map_insert_error(e: sqlx::Error, item_id: i64) -> StoreError {
    // A racing insert trips the partial unique index instead of the
    // check-then-insert guard.
    match &e {
        sqlx::Error::Database(db) if db.constraint() == Some(OPEN_LOAN_INDEX) => {
            StoreError::OpenLoanExists(item_id)
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl LoanStore for PgLoanStore {
    async fn create(&self, new: &NewLoan) -> StoreResult<LoanRecord> {
        let mut tx = self.pool.begin().await?;

        // Intake guard inside the transaction; the unique index backstops
        // anything that slips between check and insert.
        let open: Option<i64> =
            sqlx::query_scalar("SELECT id FROM loans WHERE item_id = $1 AND status = ANY($2)")
                .bind(new.item_id)
                .bind(status_codes(&OPEN_STATUSES))
                .fetch_optional(&mut *tx)
                .await?;

        if open.is_some() {
            return Err(StoreError::OpenLoanExists(new.item_id));
        }

        let record = sqlx::query_as::<_, LoanRecord>(
            r#"
            INSERT INTO loans (item_id, user_id, status, requested_at, due_at, fine_amount)
            VALUES ($1, $2, $3, $4, $5, 0)
            RETURNING *
            "#,
        )
        .bind(new.item_id)
        .bind(new.user_id)
        .bind(LoanStatus::Requested)
        .bind(new.requested_at)
        .bind(new.due_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, new.item_id))?;

        tx.commit().await?;
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<LoanRecord> {
        sqlx::query_as::<_, LoanRecord>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_if_status(
        &self,
        record: &LoanRecord,
        expected: &[LoanStatus],
    ) -> StoreResult<LoanRecord> {
        let mut tx = self.pool.begin().await?;

        // Guarded write: no row comes back if the status moved under us.
        // item_id, user_id, requested_at and created_at are immutable.
        let updated = sqlx::query_as::<_, LoanRecord>(
            r#"
            UPDATE loans SET
                status = $2,
                borrowed_at = $3,
                due_at = $4,
                extended_due_at = $5,
                returned_at = $6,
                approved_at = $7,
                approver_id = $8,
                rejection_reason = $9,
                fine_amount = $10,
                updated_at = now()
            WHERE id = $1 AND status = ANY($11)
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.status)
        .bind(record.borrowed_at)
        .bind(record.due_at)
        .bind(record.extended_due_at)
        .bind(record.returned_at)
        .bind(record.approved_at)
        .bind(record.approver_id)
        .bind(record.rejection_reason.as_deref())
        .bind(record.fine_amount)
        .bind(status_codes(expected))
        .fetch_optional(&mut *tx)
        .await?;

        match updated {
            Some(row) => {
                tx.commit().await?;
                Ok(row)
            }
            None => {
                let actual: Option<i16> =
                    sqlx::query_scalar("SELECT status FROM loans WHERE id = $1")
                        .bind(record.id)
                        .fetch_optional(&mut *tx)
                        .await?;
                match actual {
                    Some(code) => Err(StoreError::StatusConflict {
                        actual: LoanStatus::from(code),
                    }),
                    None => Err(StoreError::NotFound(record.id)),
                }
            }
        }
    }

    async fn list_by_user(&self, user_id: i64) -> StoreResult<Vec<LoanRecord>> {
        let rows = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loans WHERE user_id = $1 ORDER BY requested_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_by_item(&self, item_id: i64) -> StoreResult<Vec<LoanRecord>> {
        let rows = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loans WHERE item_id = $1 ORDER BY requested_at DESC",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_by_status(&self, status: LoanStatus) -> StoreResult<Vec<LoanRecord>> {
        let rows = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loans WHERE status = $1 ORDER BY requested_at",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_due_before(
        &self,
        status: LoanStatus,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<LoanRecord>> {
        let rows = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loans WHERE status = $1 AND due_at < $2 ORDER BY due_at",
        )
        .bind(status)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_active_due_within(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<LoanRecord>> {
        let rows = sqlx::query_as::<_, LoanRecord>(
            r#"
            SELECT * FROM loans
            WHERE status = $1
              AND COALESCE(extended_due_at, due_at) BETWEEN $2 AND $3
            ORDER BY COALESCE(extended_due_at, due_at)
            "#,
        )
        .bind(LoanStatus::Active)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_open_loan(&self, item_id: i64) -> StoreResult<Option<LoanRecord>> {
        let mut rows = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loans WHERE item_id = $1 AND status = ANY($2)",
        )
        .bind(item_id)
        .bind(status_codes(&OPEN_STATUSES))
        .fetch_all(&self.pool)
        .await?;

        if rows.len() > 1 {
            return Err(StoreError::Integrity(format!(
                "item {} has {} open loans, expected at most one",
                item_id,
                rows.len()
            )));
        }
        Ok(rows.pop())
    }

    async fn count_active_borrows(&self, user_id: i64) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status = ANY($2)",
        )
        .bind(user_id)
        .bind(status_codes(&[LoanStatus::Active, LoanStatus::Overdue]))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
