//! Borrow lifecycle engine.
//!
//! Owns the loan state machine and every business invariant around it:
//! intake preconditions, the one-open-loan-per-item rule, fine assessment
//! on return, and the compensation steps that keep this store and the
//! inventory service consistent. Commands re-read the record, check the
//! precondition against the current status and write through the store's
//! status-guarded update, so a concurrent or replayed command fails with
//! `InvalidState` instead of double-applying.
//!
//! Events are published only after the final successful write of a command;
//! publish failures are logged and never roll a transition back.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::{
    clients::{IdentityClient, InventoryClient},
    config::PolicyConfig,
    error::{dependency_error, AppError, AppResult},
    models::{
        BorrowEvent, BorrowEventType, ItemStatus, LoanRecord, LoanStatus, LoanView, NewLoan,
        TOPIC_DUE_SOON, TOPIC_LIFECYCLE, TOPIC_OVERDUE,
    },
    publisher::EventPublisher,
    store::LoanStore,
};

/// Outcome counters for one sweep run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Records matched by the sweep query.
    pub scanned: usize,
    /// Records transitioned (overdue sweep) or notified (due-soon sweep).
    pub processed: usize,
    /// Records whose transition or notification failed; the rest of the
    /// batch is unaffected.
    pub failed: usize,
}

#[derive(Clone)]
pub struct BorrowService {
    store: Arc<dyn LoanStore>,
    inventory: Arc<dyn InventoryClient>,
    identity: Arc<dyn IdentityClient>,
    publisher: Arc<dyn EventPublisher>,
    policy: PolicyConfig,
}

fn require_status(record: &LoanRecord, allowed: &[LoanStatus], action: &str) -> AppResult<()> {
    if allowed.contains(&record.status) {
        Ok(())
    } else {
        Err(AppError::InvalidState {
            current: Some(record.status),
            message: format!("Cannot {} loan {}", action, record.id),
        })
    }
}

impl BorrowService {
    pub fn new(
        store: Arc<dyn LoanStore>,
        inventory: Arc<dyn InventoryClient>,
        identity: Arc<dyn IdentityClient>,
        publisher: Arc<dyn EventPublisher>,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            store,
            inventory,
            identity,
            publisher,
            policy,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle commands
    // -----------------------------------------------------------------------

    /// Take in a new borrow request: status `Requested`, due date fixed at
    /// request time.
    pub async fn request_borrow(&self, item_id: i64, user_id: i64) -> AppResult<LoanView> {
        // User must exist and be active. A dependency failure here aborts
        // the command; nothing has been written yet.
        let user = self
            .identity
            .get_user(user_id)
            .await
            .map_err(|e| dependency_error("identity", e))?;
        if !user.active {
            return Err(AppError::InvalidState {
                current: None,
                message: format!("User {} is not active", user_id),
            });
        }

        // Borrow limit counts Active and Overdue loans.
        let loans_out = self.store.count_active_borrows(user_id).await?;
        if loans_out >= self.policy.max_active_borrows {
            return Err(AppError::InvalidState {
                current: None,
                message: format!(
                    "User {} has reached the maximum of {} concurrent borrows",
                    user_id, self.policy.max_active_borrows
                ),
            });
        }

        // Item must exist and currently be available.
        let item = self
            .inventory
            .get_item(item_id)
            .await
            .map_err(|e| dependency_error("inventory", e))?;
        if item.status != ItemStatus::Available {
            return Err(AppError::InvalidState {
                current: None,
                message: format!(
                    "Item {} is not available (inventory status {})",
                    item_id, item.status
                ),
            });
        }

        // A pending or running loan for the item blocks intake. The store
        // enforces this again inside the insert transaction.
        if let Some(open) = self.store.find_open_loan(item_id).await? {
            return Err(AppError::InvalidState {
                current: Some(open.status),
                message: format!("Item {} already has an open loan", item_id),
            });
        }

        let now = Utc::now();
        let record = self
            .store
            .create(&NewLoan {
                item_id,
                user_id,
                requested_at: now,
                due_at: now + Duration::days(self.policy.loan_period_days),
            })
            .await?;

        info!(loan_id = record.id, item_id, user_id, "borrow requested");
        self.emit(
            TOPIC_LIFECYCLE,
            BorrowEvent::new(
                BorrowEventType::BorrowRequested,
                &record,
                "Borrow request created",
            ),
        )
        .await;

        Ok(self.to_view(record).await)
    }

    /// Approve a pending request and mark the item borrowed in inventory.
    /// If the inventory update fails the approval is rolled back so the
    /// request stays retryable.
    pub async fn approve(&self, loan_id: i64, approver_id: i64) -> AppResult<LoanView> {
        let record = self.store.get_by_id(loan_id).await?;
        require_status(&record, &[LoanStatus::Requested], "approve")?;

        let mut approved = record;
        approved.status = LoanStatus::Approved;
        approved.approver_id = Some(approver_id);
        approved.approved_at = Some(Utc::now());

        let approved = self
            .store
            .update_if_status(&approved, &[LoanStatus::Requested])
            .await?;

        if let Err(e) = self
            .inventory
            .set_item_status(approved.item_id, ItemStatus::Borrowed)
            .await
        {
            self.revert_approval(&approved).await;
            return Err(dependency_error("inventory", e));
        }

        info!(loan_id, approver_id, "borrow approved");
        self.emit(
            TOPIC_LIFECYCLE,
            BorrowEvent::new(
                BorrowEventType::BorrowApproved,
                &approved,
                format!("Borrow approved by user {}", approver_id),
            ),
        )
        .await;

        Ok(self.to_view(approved).await)
    }

    /// Reject a pending request, recording who decided and why.
    pub async fn reject(
        &self,
        loan_id: i64,
        approver_id: i64,
        reason: &str,
    ) -> AppResult<LoanView> {
        let record = self.store.get_by_id(loan_id).await?;
        require_status(&record, &[LoanStatus::Requested], "reject")?;

        let mut rejected = record;
        rejected.status = LoanStatus::Rejected;
        rejected.approver_id = Some(approver_id);
        rejected.approved_at = Some(Utc::now());
        rejected.rejection_reason = Some(reason.to_string());

        let rejected = self
            .store
            .update_if_status(&rejected, &[LoanStatus::Requested])
            .await?;

        info!(loan_id, approver_id, "borrow rejected");
        self.emit(
            TOPIC_LIFECYCLE,
            BorrowEvent::new(
                BorrowEventType::BorrowRejected,
                &rejected,
                format!("Borrow request rejected: {}", reason),
            ),
        )
        .await;

        Ok(self.to_view(rejected).await)
    }

    /// Hand the item over: the approved loan becomes active. The due date
    /// was fixed at request time and does not move here.
    pub async fn complete_borrow(&self, loan_id: i64) -> AppResult<LoanView> {
        let record = self.store.get_by_id(loan_id).await?;
        require_status(&record, &[LoanStatus::Approved], "complete")?;

        let mut active = record;
        active.status = LoanStatus::Active;
        active.borrowed_at = Some(Utc::now());

        let active = self
            .store
            .update_if_status(&active, &[LoanStatus::Approved])
            .await?;

        info!(loan_id, "borrow completed, loan active");
        self.emit(
            TOPIC_LIFECYCLE,
            BorrowEvent::new(
                BorrowEventType::BookBorrowed,
                &active,
                "Book handed over to borrower",
            ),
        )
        .await;

        Ok(self.to_view(active).await)
    }

    /// Return the item. The fine is assessed here, exactly once, from the
    /// effective due date; the item goes back to available in inventory,
    /// with the same rollback contract as approval.
    pub async fn return_loan(&self, loan_id: i64) -> AppResult<LoanView> {
        let record = self.store.get_by_id(loan_id).await?;
        require_status(&record, &[LoanStatus::Active, LoanStatus::Overdue], "return")?;

        let now = Utc::now();
        let fine = record.days_late(now) as f64 * self.policy.fine_per_day;
        let prior_status = record.status;

        let mut returned = record;
        returned.status = LoanStatus::Returned;
        returned.returned_at = Some(now);
        returned.fine_amount = fine;

        let returned = self
            .store
            .update_if_status(&returned, &[LoanStatus::Active, LoanStatus::Overdue])
            .await?;

        if let Err(e) = self
            .inventory
            .set_item_status(returned.item_id, ItemStatus::Available)
            .await
        {
            self.revert_return(&returned, prior_status).await;
            return Err(dependency_error("inventory", e));
        }

        info!(loan_id, fine, "loan returned");
        self.emit(
            TOPIC_LIFECYCLE,
            BorrowEvent::new(
                BorrowEventType::BookReturned,
                &returned,
                format!("Book returned. Fine: {}", fine),
            ),
        )
        .await;

        Ok(self.to_view(returned).await)
    }

    /// Grant a later due date on an active loan. The original `due_at`
    /// never moves; the extension lives in `extended_due_at`.
    pub async fn extend_due_date(
        &self,
        loan_id: i64,
        new_due: DateTime<Utc>,
    ) -> AppResult<LoanView> {
        let record = self.store.get_by_id(loan_id).await?;
        require_status(&record, &[LoanStatus::Active], "extend")?;

        if new_due <= record.effective_due_at() {
            return Err(AppError::InvalidState {
                current: Some(record.status),
                message: format!(
                    "New due date must be after the current effective due date ({})",
                    record.effective_due_at()
                ),
            });
        }

        let mut extended = record;
        extended.extended_due_at = Some(new_due);

        let extended = self
            .store
            .update_if_status(&extended, &[LoanStatus::Active])
            .await?;

        info!(loan_id, new_due = %new_due, "due date extended");
        self.emit(
            TOPIC_LIFECYCLE,
            BorrowEvent::new(
                BorrowEventType::DueDateExtended,
                &extended,
                format!("Due date extended to {}", new_due),
            ),
        )
        .await;

        Ok(self.to_view(extended).await)
    }

    /// Operator-only: write an overdue loan off as lost. Inventory is left
    /// alone; reconciling the physical item is a back-office process.
    pub async fn mark_lost(&self, loan_id: i64, operator_id: i64) -> AppResult<LoanView> {
        let record = self.store.get_by_id(loan_id).await?;
        require_status(&record, &[LoanStatus::Overdue], "mark lost")?;

        let mut lost = record;
        lost.status = LoanStatus::Lost;

        let lost = self
            .store
            .update_if_status(&lost, &[LoanStatus::Overdue])
            .await?;

        info!(loan_id, operator_id, "loan marked lost");
        self.emit(
            TOPIC_LIFECYCLE,
            BorrowEvent::new(
                BorrowEventType::LoanLost,
                &lost,
                format!("Loan marked lost by operator {}", operator_id),
            ),
        )
        .await;

        Ok(self.to_view(lost).await)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get_loan(&self, loan_id: i64) -> AppResult<LoanView> {
        let record = self.store.get_by_id(loan_id).await?;
        Ok(self.to_view(record).await)
    }

    /// Full borrow history of a user, newest first.
    pub async fn loans_for_user(&self, user_id: i64) -> AppResult<Vec<LoanView>> {
        let records = self.store.list_by_user(user_id).await?;
        Ok(self.to_views(records).await)
    }

    /// Full borrow history of an item, newest first.
    pub async fn loans_for_item(&self, item_id: i64) -> AppResult<Vec<LoanView>> {
        let records = self.store.list_by_item(item_id).await?;
        Ok(self.to_views(records).await)
    }

    /// Requests waiting for an approval decision, oldest first.
    pub async fn pending_requests(&self) -> AppResult<Vec<LoanView>> {
        let records = self.store.list_by_status(LoanStatus::Requested).await?;
        Ok(self.to_views(records).await)
    }

    /// Everything past due: promoted records plus Active records the sweep
    /// has not visited yet.
    pub async fn overdue_loans(&self) -> AppResult<Vec<LoanView>> {
        let mut records = self.store.list_by_status(LoanStatus::Overdue).await?;
        records.extend(
            self.store
                .list_due_before(LoanStatus::Active, Utc::now())
                .await?,
        );
        records.sort_by_key(|r| r.effective_due_at());
        Ok(self.to_views(records).await)
    }

    // -----------------------------------------------------------------------
    // Sweeps
    // -----------------------------------------------------------------------

    /// Promote every Active record past its original due date to Overdue,
    /// one guarded write per record. A failure on one record is logged and
    /// the batch continues; a rerun is a no-op because promoted records are
    /// no longer Active.
    pub async fn sweep_overdue(&self) -> AppResult<SweepStats> {
        let now = Utc::now();
        let batch = self.store.list_due_before(LoanStatus::Active, now).await?;
        let mut stats = SweepStats {
            scanned: batch.len(),
            ..Default::default()
        };

        for record in batch {
            let loan_id = record.id;
            match self.promote_overdue(record).await {
                Ok(()) => stats.processed += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(loan_id, error = %e, "overdue promotion failed");
                }
            }
        }
        Ok(stats)
    }

    async fn promote_overdue(&self, record: LoanRecord) -> AppResult<()> {
        let mut overdue = record;
        overdue.status = LoanStatus::Overdue;

        let overdue = self
            .store
            .update_if_status(&overdue, &[LoanStatus::Active])
            .await?;

        self.emit(
            TOPIC_OVERDUE,
            BorrowEvent::new(BorrowEventType::LoanOverdue, &overdue, "Loan is overdue"),
        )
        .await;
        Ok(())
    }

    /// Remind about every Active loan whose effective due date falls inside
    /// the configured forward window. Read-only, and it re-notifies on
    /// every run: de-duplication belongs to the notification consumer.
    pub async fn sweep_due_soon(&self) -> AppResult<SweepStats> {
        let now = Utc::now();
        let until = now + Duration::hours(self.policy.due_soon_window_hours);
        let batch = self.store.list_active_due_within(now, until).await?;
        let mut stats = SweepStats {
            scanned: batch.len(),
            ..Default::default()
        };

        for record in batch {
            let event = BorrowEvent::new(
                BorrowEventType::LoanDueSoon,
                &record,
                format!("Loan due on {}", record.effective_due_at()),
            );
            match self.publisher.publish(TOPIC_DUE_SOON, &event).await {
                Ok(()) => stats.processed += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(loan_id = record.id, error = %e, "failed to publish due-soon reminder");
                }
            }
        }
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn revert_approval(&self, approved: &LoanRecord) {
        let mut reverted = approved.clone();
        reverted.status = LoanStatus::Requested;
        reverted.approver_id = None;
        reverted.approved_at = None;

        if let Err(e) = self
            .store
            .update_if_status(&reverted, &[LoanStatus::Approved])
            .await
        {
            error!(
                loan_id = approved.id,
                error = %e,
                "failed to roll back approval after inventory failure"
            );
        }
    }

    async fn revert_return(&self, returned: &LoanRecord, prior_status: LoanStatus) {
        let mut reverted = returned.clone();
        reverted.status = prior_status;
        reverted.returned_at = None;
        reverted.fine_amount = 0.0;

        if let Err(e) = self
            .store
            .update_if_status(&reverted, &[LoanStatus::Returned])
            .await
        {
            error!(
                loan_id = returned.id,
                error = %e,
                "failed to roll back return after inventory failure"
            );
        }
    }

    /// Publish after commit; failures are logged, never surfaced.
    async fn emit(&self, topic: &str, event: BorrowEvent) {
        if let Err(e) = self.publisher.publish(topic, &event).await {
            warn!(
                loan_id = event.loan_id,
                event_type = %event.event_type,
                error = %e,
                "failed to publish event"
            );
        }
    }

    /// Enrich a record with item and user snapshots, fetched concurrently.
    /// Either fetch failing degrades that snapshot to None.
    async fn to_view(&self, record: LoanRecord) -> LoanView {
        let (item, user) = tokio::join!(
            self.inventory.get_item(record.item_id),
            self.identity.get_user(record.user_id)
        );

        let item = match item {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(item_id = record.item_id, error = %e, "item snapshot unavailable");
                None
            }
        };
        let user = match user {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(user_id = record.user_id, error = %e, "user snapshot unavailable");
                None
            }
        };

        LoanView::assemble(record, item, user)
    }

    async fn to_views(&self, records: Vec<LoanRecord>) -> Vec<LoanView> {
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            views.push(self.to_view(record).await);
        }
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientError, MockIdentityClient, MockInventoryClient};
    use crate::models::{ItemSnapshot, UserSnapshot};
    use crate::publisher::{MemoryEventPublisher, MockEventPublisher, PublishError};
    use crate::store::{MemoryLoanStore, MockLoanStore, StoreError};

    fn active_user(id: i64) -> UserSnapshot {
        UserSnapshot {
            id,
            username: format!("user{}", id),
            email: Some(format!("user{}@example.net", id)),
            active: true,
        }
    }

    fn item(id: i64, status: ItemStatus) -> ItemSnapshot {
        ItemSnapshot {
            id,
            title: format!("Item {}", id),
            author: None,
            isbn: None,
            status,
        }
    }

    fn record(id: i64, status: LoanStatus) -> LoanRecord {
        let now = Utc::now();
        LoanRecord {
            id,
            item_id: id * 10,
            user_id: 1,
            status,
            requested_at: now - Duration::days(20),
            borrowed_at: Some(now - Duration::days(19)),
            due_at: now - Duration::days(5),
            extended_due_at: None,
            returned_at: None,
            approved_at: Some(now - Duration::days(19)),
            approver_id: Some(2),
            rejection_reason: None,
            fine_amount: 0.0,
            created_at: now - Duration::days(20),
            updated_at: now - Duration::days(19),
        }
    }

    struct Fixture {
        store: Arc<MemoryLoanStore>,
        publisher: Arc<MemoryEventPublisher>,
    }

    fn engine(
        inventory: MockInventoryClient,
        identity: MockIdentityClient,
    ) -> (BorrowService, Fixture) {
        let store = Arc::new(MemoryLoanStore::new());
        let publisher = Arc::new(MemoryEventPublisher::new());
        let service = BorrowService::new(
            store.clone(),
            Arc::new(inventory),
            Arc::new(identity),
            publisher.clone(),
            PolicyConfig::default(),
        );
        (
            service,
            Fixture { store, publisher },
        )
    }

    async fn seed(store: &MemoryLoanStore, item_id: i64, status: LoanStatus) -> LoanRecord {
        let now = Utc::now();
        let mut rec = store
            .create(&NewLoan {
                item_id,
                user_id: 1,
                requested_at: now,
                due_at: now + Duration::days(14),
            })
            .await
            .unwrap();
        if status != LoanStatus::Requested {
            rec.status = status;
            rec = store
                .update_if_status(&rec, &[LoanStatus::Requested])
                .await
                .unwrap();
        }
        rec
    }

    #[tokio::test]
    async fn approve_rolls_back_when_inventory_fails() {
        let mut inventory = MockInventoryClient::new();
        inventory
            .expect_set_item_status()
            .times(1)
            .returning(|_, _| Err(ClientError::Unavailable("boom".into())));
        let (service, fx) = engine(inventory, MockIdentityClient::new());

        let rec = seed(&fx.store, 7, LoanStatus::Requested).await;
        let err = service.approve(rec.id, 99).await.unwrap_err();
        assert!(matches!(err, AppError::DependencyUnavailable { .. }));

        // Approval was compensated; the request is retryable and no event
        // went out.
        let stored = fx.store.get_by_id(rec.id).await.unwrap();
        assert_eq!(stored.status, LoanStatus::Requested);
        assert!(stored.approver_id.is_none());
        assert!(stored.approved_at.is_none());
        assert!(fx.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn return_rolls_back_when_inventory_fails() {
        let mut inventory = MockInventoryClient::new();
        inventory
            .expect_set_item_status()
            .times(1)
            .returning(|_, _| Err(ClientError::Timeout));
        let (service, fx) = engine(inventory, MockIdentityClient::new());

        let rec = seed(&fx.store, 7, LoanStatus::Active).await;
        let err = service.return_loan(rec.id).await.unwrap_err();
        assert!(matches!(err, AppError::DependencyUnavailable { .. }));

        let stored = fx.store.get_by_id(rec.id).await.unwrap();
        assert_eq!(stored.status, LoanStatus::Active);
        assert!(stored.returned_at.is_none());
        assert_eq!(stored.fine_amount, 0.0);
        assert!(fx.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn request_aborts_when_identity_is_down() {
        let mut identity = MockIdentityClient::new();
        identity
            .expect_get_user()
            .returning(|_| Err(ClientError::Timeout));
        let (service, fx) = engine(MockInventoryClient::new(), identity);

        let err = service.request_borrow(7, 1).await.unwrap_err();
        assert!(matches!(err, AppError::DependencyUnavailable { .. }));
        assert!(fx.store.list_by_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_rejects_unknown_user() {
        let mut identity = MockIdentityClient::new();
        identity
            .expect_get_user()
            .returning(|id| Err(ClientError::NotFound(format!("User {} not found", id))));
        let (service, _fx) = engine(MockInventoryClient::new(), identity);

        let err = service.request_borrow(7, 12).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn request_rejects_inactive_user() {
        let mut identity = MockIdentityClient::new();
        identity.expect_get_user().returning(|id| {
            Ok(UserSnapshot {
                active: false,
                ..active_user(id)
            })
        });
        let (service, fx) = engine(MockInventoryClient::new(), identity);

        let err = service.request_borrow(7, 1).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState { .. }));
        assert!(fx.store.list_by_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_rejects_unavailable_item() {
        let mut identity = MockIdentityClient::new();
        identity.expect_get_user().returning(|id| Ok(active_user(id)));
        let mut inventory = MockInventoryClient::new();
        inventory
            .expect_get_item()
            .returning(|id| Ok(item(id, ItemStatus::Borrowed)));
        let (service, fx) = engine(inventory, identity);

        let err = service.request_borrow(7, 1).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState { .. }));
        assert!(fx.store.list_by_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn views_degrade_when_snapshot_fetch_fails() {
        let mut inventory = MockInventoryClient::new();
        inventory
            .expect_get_item()
            .returning(|_| Err(ClientError::Unavailable("down".into())));
        let mut identity = MockIdentityClient::new();
        identity.expect_get_user().returning(|id| Ok(active_user(id)));
        let (service, fx) = engine(inventory, identity);

        let rec = seed(&fx.store, 7, LoanStatus::Active).await;
        let view = service.get_loan(rec.id).await.unwrap();
        assert!(view.item.is_none());
        assert!(view.user.is_some());
        assert_eq!(view.status, LoanStatus::Active);
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_the_command() {
        let mut inventory = MockInventoryClient::new();
        inventory.expect_set_item_status().returning(|_, _| Ok(()));
        inventory
            .expect_get_item()
            .returning(|id| Ok(item(id, ItemStatus::Borrowed)));
        let mut identity = MockIdentityClient::new();
        identity.expect_get_user().returning(|id| Ok(active_user(id)));

        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().returning(|_, _| {
            Err(PublishError::Serialization(
                serde_json::from_str::<i64>("x").unwrap_err(),
            ))
        });

        let store = Arc::new(MemoryLoanStore::new());
        let service = BorrowService::new(
            store.clone(),
            Arc::new(inventory),
            Arc::new(identity),
            Arc::new(publisher),
            PolicyConfig::default(),
        );

        let rec = seed(&store, 7, LoanStatus::Requested).await;
        let view = service.approve(rec.id, 99).await.unwrap();
        assert_eq!(view.status, LoanStatus::Approved);
    }

    #[tokio::test]
    async fn overdue_sweep_isolates_per_record_failures() {
        let mut store = MockLoanStore::new();
        store
            .expect_list_due_before()
            .returning(|_, _| {
                Ok(vec![
                    record(1, LoanStatus::Active),
                    record(2, LoanStatus::Active),
                    record(3, LoanStatus::Active),
                ])
            });
        store.expect_update_if_status().returning(|rec, _| {
            if rec.id == 2 {
                Err(StoreError::Database(sqlx::Error::PoolClosed))
            } else {
                Ok(rec.clone())
            }
        });

        let publisher = Arc::new(MemoryEventPublisher::new());
        let service = BorrowService::new(
            Arc::new(store),
            Arc::new(MockInventoryClient::new()),
            Arc::new(MockIdentityClient::new()),
            publisher.clone(),
            PolicyConfig::default(),
        );

        let stats = service.sweep_overdue().await.unwrap();
        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 1);

        let events = publisher.published_on(crate::models::TOPIC_OVERDUE);
        let loan_ids: Vec<i64> = events.iter().map(|e| e.loan_id).collect();
        assert_eq!(loan_ids, vec![1, 3]);
    }
}
