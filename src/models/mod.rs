//! Data models for Circulate

pub mod event;
pub mod loan;
pub mod snapshot;

// Re-export commonly used types
pub use event::{BorrowEvent, BorrowEventType, TOPIC_DUE_SOON, TOPIC_LIFECYCLE, TOPIC_OVERDUE};
pub use loan::{LoanRecord, LoanStatus, NewLoan, OPEN_STATUSES};
pub use snapshot::{ItemSnapshot, ItemStatus, LoanView, UserSnapshot};
