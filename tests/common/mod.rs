#![allow(dead_code)]

//! Shared test fixtures: an in-process service over the memory store with
//! scripted fakes for the inventory and identity services.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use circulate_server::{
    clients::{ClientError, IdentityClient, InventoryClient},
    config::{AppConfig, PolicyConfig},
    models::{ItemSnapshot, ItemStatus, LoanRecord, LoanStatus, UserSnapshot},
    publisher::MemoryEventPublisher,
    services::{BorrowService, Services},
    store::{LoanStore, MemoryLoanStore},
    AppState,
};

/// Inventory fake holding item state in memory, with switchable write
/// failures to exercise compensation paths.
pub struct FakeInventory {
    items: Mutex<HashMap<i64, ItemSnapshot>>,
    fail_writes: Mutex<bool>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            fail_writes: Mutex::new(false),
        }
    }

    pub fn put_item(&self, snapshot: ItemSnapshot) {
        self.items.lock().unwrap().insert(snapshot.id, snapshot);
    }

    pub fn item_status(&self, item_id: i64) -> Option<ItemStatus> {
        self.items.lock().unwrap().get(&item_id).map(|i| i.status)
    }

    /// Make every status write fail until switched back.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }
}

#[async_trait]
impl InventoryClient for FakeInventory {
    async fn get_item(&self, item_id: i64) -> Result<ItemSnapshot, ClientError> {
        self.items
            .lock()
            .unwrap()
            .get(&item_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("Item {} not found", item_id)))
    }

    async fn set_item_status(
        &self,
        item_id: i64,
        status: ItemStatus,
    ) -> Result<(), ClientError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(ClientError::Unavailable("inventory offline".to_string()));
        }
        let mut items = self.items.lock().unwrap();
        match items.get_mut(&item_id) {
            Some(item) => {
                item.status = status;
                Ok(())
            }
            None => Err(ClientError::NotFound(format!("Item {} not found", item_id))),
        }
    }
}

/// Identity fake holding user state in memory.
pub struct FakeIdentity {
    users: Mutex<HashMap<i64, UserSnapshot>>,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    pub fn put_user(&self, snapshot: UserSnapshot) {
        self.users.lock().unwrap().insert(snapshot.id, snapshot);
    }
}

#[async_trait]
impl IdentityClient for FakeIdentity {
    async fn get_user(&self, user_id: i64) -> Result<UserSnapshot, ClientError> {
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("User {} not found", user_id)))
    }
}

pub fn item(id: i64, status: ItemStatus) -> ItemSnapshot {
    ItemSnapshot {
        id,
        title: format!("Item {}", id),
        author: Some("Author".to_string()),
        isbn: None,
        status,
    }
}

pub fn user(id: i64, active: bool) -> UserSnapshot {
    UserSnapshot {
        id,
        username: format!("user{}", id),
        email: Some(format!("user{}@example.net", id)),
        active,
    }
}

/// Everything a test needs to drive the service end to end.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryLoanStore>,
    pub inventory: Arc<FakeInventory>,
    pub identity: Arc<FakeIdentity>,
    pub publisher: Arc<MemoryEventPublisher>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryLoanStore::new());
        let inventory = Arc::new(FakeInventory::new());
        let identity = Arc::new(FakeIdentity::new());
        let publisher = Arc::new(MemoryEventPublisher::new());

        let services = Services::new(
            store.clone(),
            inventory.clone(),
            identity.clone(),
            publisher.clone(),
            PolicyConfig::default(),
        );
        let state = AppState {
            config: Arc::new(AppConfig::default()),
            services: Arc::new(services),
        };

        Self {
            state,
            store,
            inventory,
            identity,
            publisher,
        }
    }

    pub fn borrows(&self) -> BorrowService {
        self.state.services.borrows.clone()
    }

    /// Seed one available item and one active user.
    pub fn seed_item_and_user(&self, item_id: i64, user_id: i64) {
        self.inventory.put_item(item(item_id, ItemStatus::Available));
        self.identity.put_user(user(user_id, true));
    }

    /// Drive a loan through request, approval and handover so it sits in
    /// Active.
    pub async fn activate_loan(&self, item_id: i64, user_id: i64, approver_id: i64) -> i64 {
        let borrows = self.borrows();
        let view = borrows.request_borrow(item_id, user_id).await.unwrap();
        borrows.approve(view.id, approver_id).await.unwrap();
        borrows.complete_borrow(view.id).await.unwrap();
        view.id
    }

    /// Rewrite the loan's due date in place, bypassing the lifecycle rules,
    /// so tests can put a loan in the past or near future.
    pub async fn set_due(
        &self,
        loan_id: i64,
        due_at: DateTime<Utc>,
        extended_due_at: Option<DateTime<Utc>>,
    ) -> LoanRecord {
        let mut record = self.store.get_by_id(loan_id).await.unwrap();
        record.due_at = due_at;
        record.extended_due_at = extended_due_at;
        let status = record.status;
        self.store
            .update_if_status(&record, &[status])
            .await
            .unwrap()
    }

    /// Shorthand for an already-overdue active loan.
    pub async fn backdate_due(&self, loan_id: i64, days: i64) -> LoanRecord {
        self.set_due(loan_id, Utc::now() - Duration::days(days), None)
            .await
    }

    pub async fn loan_status(&self, loan_id: i64) -> LoanStatus {
        self.store.get_by_id(loan_id).await.unwrap().status
    }
}
