//! In-memory loan store for development and tests.
//!
//! Mirrors the PostgreSQL implementation's semantics exactly, including the
//! open-loan guard and the immutability of identity columns on update. All
//! operations run under one mutex, which stands in for the per-operation
//! transaction.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{LoanRecord, LoanStatus, NewLoan};

use super::{LoanStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, LoanRecord>,
}

#[derive(Default)]
pub struct MemoryLoanStore {
    inner: Mutex<Inner>,
}

impl MemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("loan store mutex poisoned")
    }
}

#[async_trait]
impl LoanStore for MemoryLoanStore {
    async fn create(&self, new: &NewLoan) -> StoreResult<LoanRecord> {
        let mut inner = self.locked();

        if inner
            .rows
            .values()
            .any(|r| r.item_id == new.item_id && r.status.is_open())
        {
            return Err(StoreError::OpenLoanExists(new.item_id));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let record = LoanRecord {
            id: inner.next_id,
            item_id: new.item_id,
            user_id: new.user_id,
            status: LoanStatus::Requested,
            requested_at: new.requested_at,
            borrowed_at: None,
            due_at: new.due_at,
            extended_due_at: None,
            returned_at: None,
            approved_at: None,
            approver_id: None,
            rejection_reason: None,
            fine_amount: 0.0,
            created_at: now,
            updated_at: now,
        };
        inner.rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<LoanRecord> {
        self.locked()
            .rows
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_if_status(
        &self,
        record: &LoanRecord,
        expected: &[LoanStatus],
    ) -> StoreResult<LoanRecord> {
        let mut inner = self.locked();
        let stored = inner
            .rows
            .get(&record.id)
            .ok_or(StoreError::NotFound(record.id))?;

        if !expected.contains(&stored.status) {
            return Err(StoreError::StatusConflict {
                actual: stored.status,
            });
        }

        // Identity columns never move on update, matching the SQL UPDATE's
        // column list.
        let mut updated = record.clone();
        updated.item_id = stored.item_id;
        updated.user_id = stored.user_id;
        updated.requested_at = stored.requested_at;
        updated.created_at = stored.created_at;
        updated.updated_at = Utc::now();

        inner.rows.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn list_by_user(&self, user_id: i64) -> StoreResult<Vec<LoanRecord>> {
        let mut rows: Vec<LoanRecord> = self
            .locked()
            .rows
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(rows)
    }

    async fn list_by_item(&self, item_id: i64) -> StoreResult<Vec<LoanRecord>> {
        let mut rows: Vec<LoanRecord> = self
            .locked()
            .rows
            .values()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(rows)
    }

    async fn list_by_status(&self, status: LoanStatus) -> StoreResult<Vec<LoanRecord>> {
        let mut rows: Vec<LoanRecord> = self
            .locked()
            .rows
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.requested_at);
        Ok(rows)
    }

    async fn list_due_before(
        &self,
        status: LoanStatus,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<LoanRecord>> {
        let mut rows: Vec<LoanRecord> = self
            .locked()
            .rows
            .values()
            .filter(|r| r.status == status && r.due_at < cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.due_at);
        Ok(rows)
    }

    async fn list_active_due_within(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<LoanRecord>> {
        let mut rows: Vec<LoanRecord> = self
            .locked()
            .rows
            .values()
            .filter(|r| {
                let due = r.effective_due_at();
                r.status == LoanStatus::Active && due >= from && due <= until
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.effective_due_at());
        Ok(rows)
    }

    async fn find_open_loan(&self, item_id: i64) -> StoreResult<Option<LoanRecord>> {
        let inner = self.locked();
        let mut open: Vec<&LoanRecord> = inner
            .rows
            .values()
            .filter(|r| r.item_id == item_id && r.status.is_open())
            .collect();

        if open.len() > 1 {
            return Err(StoreError::Integrity(format!(
                "item {} has {} open loans, expected at most one",
                item_id,
                open.len()
            )));
        }
        Ok(open.pop().cloned())
    }

    async fn count_active_borrows(&self, user_id: i64) -> StoreResult<i64> {
        let count = self
            .locked()
            .rows
            .values()
            .filter(|r| {
                r.user_id == user_id
                    && matches!(r.status, LoanStatus::Active | LoanStatus::Overdue)
            })
            .count();
        Ok(count as i64)
    }
}
