//! Sweep job semantics over the in-memory backends.

mod common;

use chrono::{Duration, Utc};

use circulate_server::models::{ItemStatus, LoanStatus, TOPIC_DUE_SOON, TOPIC_OVERDUE};
use common::TestApp;

#[tokio::test]
async fn overdue_sweep_promotes_each_past_due_loan_exactly_once() {
    let app = TestApp::new();
    app.identity.put_user(common::user(1, true));
    for item_id in [10, 11, 12] {
        app.inventory
            .put_item(common::item(item_id, ItemStatus::Available));
    }

    let late_a = app.activate_loan(10, 1, 2).await;
    let late_b = app.activate_loan(11, 1, 2).await;
    let current = app.activate_loan(12, 1, 2).await;
    app.backdate_due(late_a, 2).await;
    app.backdate_due(late_b, 9).await;

    let stats = app.borrows().sweep_overdue().await.unwrap();
    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.failed, 0);

    assert_eq!(app.loan_status(late_a).await, LoanStatus::Overdue);
    assert_eq!(app.loan_status(late_b).await, LoanStatus::Overdue);
    assert_eq!(app.loan_status(current).await, LoanStatus::Active);

    let mut notified: Vec<i64> = app
        .publisher
        .published_on(TOPIC_OVERDUE)
        .iter()
        .map(|e| e.loan_id)
        .collect();
    notified.sort_unstable();
    assert_eq!(notified, vec![late_a, late_b]);

    // Rerunning immediately is a no-op: the records are no longer Active.
    let stats = app.borrows().sweep_overdue().await.unwrap();
    assert_eq!(stats.scanned, 0);
    assert_eq!(app.publisher.published_on(TOPIC_OVERDUE).len(), 2);
}

#[tokio::test]
async fn due_soon_sweep_notifies_only_active_loans_inside_the_window() {
    let app = TestApp::new();
    app.identity.put_user(common::user(1, true));
    for item_id in [20, 21, 22, 23, 24] {
        app.inventory
            .put_item(common::item(item_id, ItemStatus::Available));
    }
    let borrows = app.borrows();
    let now = Utc::now();

    // Two active loans due inside 48h.
    let soon_a = app.activate_loan(20, 1, 2).await;
    app.set_due(soon_a, now + Duration::hours(24), None).await;
    let soon_b = app.activate_loan(21, 1, 2).await;
    app.set_due(soon_b, now + Duration::hours(47), None).await;

    // Active but due beyond the window.
    let later = app.activate_loan(22, 1, 2).await;
    app.set_due(later, now + Duration::hours(72), None).await;

    // Active but already past due.
    let past = app.activate_loan(23, 1, 2).await;
    app.set_due(past, now - Duration::hours(1), None).await;

    // Due inside the window but still awaiting a decision.
    let pending = borrows.request_borrow(24, 1).await.unwrap();
    app.set_due(pending.id, now + Duration::hours(24), None).await;

    let stats = borrows.sweep_due_soon().await.unwrap();
    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.processed, 2);

    let mut notified: Vec<i64> = app
        .publisher
        .published_on(TOPIC_DUE_SOON)
        .iter()
        .map(|e| e.loan_id)
        .collect();
    notified.sort_unstable();
    assert_eq!(notified, vec![soon_a, soon_b]);

    // Read-only: nothing changed state.
    assert_eq!(app.loan_status(soon_a).await, LoanStatus::Active);
    assert_eq!(app.loan_status(soon_b).await, LoanStatus::Active);
    assert_eq!(app.loan_status(pending.id).await, LoanStatus::Requested);
}

#[tokio::test]
async fn due_soon_sweep_renotifies_on_every_run() {
    let app = TestApp::new();
    app.seed_item_and_user(7, 1);
    let loan_id = app.activate_loan(7, 1, 2).await;
    app.set_due(loan_id, Utc::now() + Duration::hours(12), None)
        .await;

    app.borrows().sweep_due_soon().await.unwrap();
    app.borrows().sweep_due_soon().await.unwrap();

    // No dedup here; the notification consumer owns that.
    assert_eq!(app.publisher.published_on(TOPIC_DUE_SOON).len(), 2);
}

#[tokio::test]
async fn due_soon_window_follows_the_extended_due_date() {
    let app = TestApp::new();
    app.seed_item_and_user(7, 1);
    let loan_id = app.activate_loan(7, 1, 2).await;
    let now = Utc::now();

    // Originally due in 24h, extended out to ten days: no reminder.
    app.set_due(
        loan_id,
        now + Duration::hours(24),
        Some(now + Duration::days(10)),
    )
    .await;
    let stats = app.borrows().sweep_due_soon().await.unwrap();
    assert_eq!(stats.scanned, 0);

    // An extension that lands inside the window is picked up.
    app.set_due(
        loan_id,
        now - Duration::days(4),
        Some(now + Duration::hours(24)),
    )
    .await;
    let stats = app.borrows().sweep_due_soon().await.unwrap();
    assert_eq!(stats.scanned, 1);
    assert_eq!(app.publisher.published_on(TOPIC_DUE_SOON).len(), 1);
}

#[tokio::test]
async fn overdue_sweep_uses_the_original_due_date() {
    let app = TestApp::new();
    app.seed_item_and_user(7, 1);
    let loan_id = app.activate_loan(7, 1, 2).await;
    let now = Utc::now();

    // Past-due original date with a future extension: the promotion query
    // keys on the original date, so this record is still swept.
    app.set_due(
        loan_id,
        now - Duration::days(1),
        Some(now + Duration::days(6)),
    )
    .await;

    let stats = app.borrows().sweep_overdue().await.unwrap();
    assert_eq!(stats.processed, 1);
    assert_eq!(app.loan_status(loan_id).await, LoanStatus::Overdue);
}
