//! Business logic services

pub mod borrows;
pub mod sweeper;

pub use borrows::{BorrowService, SweepStats};
pub use sweeper::SweepScheduler;

use std::sync::Arc;

use crate::{
    clients::{IdentityClient, InventoryClient},
    config::PolicyConfig,
    publisher::EventPublisher,
    store::LoanStore,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub borrows: BorrowService,
}

impl Services {
    /// Create all services over the given backends
    pub fn new(
        store: Arc<dyn LoanStore>,
        inventory: Arc<dyn InventoryClient>,
        identity: Arc<dyn IdentityClient>,
        publisher: Arc<dyn EventPublisher>,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            borrows: BorrowService::new(store, inventory, identity, publisher, policy),
        }
    }
}
