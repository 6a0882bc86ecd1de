//! Typed HTTP clients for the inventory and identity services.
//!
//! Both services are autonomous; this service holds only weak id references
//! and asks them for current state when a command or view needs it. Every
//! call carries the configured request timeout. There are no in-process
//! retries; a failed call surfaces as a `ClientError` and the caller decides
//! whether that aborts a command or just degrades a view.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ItemSnapshot, ItemStatus, UserSnapshot};

pub mod identity;
pub mod inventory;

pub use identity::HttpIdentityClient;
pub use inventory::HttpInventoryClient;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    NotFound(String),

    #[error("request timed out")]
    Timeout,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected response: {0}")]
    BadResponse(String),
}

/// Map a reqwest transport failure onto the client error taxonomy.
pub(crate) fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Unavailable(e.to_string())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Current inventory snapshot of an item.
    async fn get_item(&self, item_id: i64) -> Result<ItemSnapshot, ClientError>;

    /// Flip the item's inventory status (borrowed on approval, available on
    /// return).
    async fn set_item_status(&self, item_id: i64, status: ItemStatus)
        -> Result<(), ClientError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Current identity snapshot of a user.
    async fn get_user(&self, user_id: i64) -> Result<UserSnapshot, ClientError>;
}
