//! Circulate - Borrow Lifecycle Orchestration
//!
//! A REST JSON service that owns the full lifecycle of library loans, from
//! borrow request through approval, activation, return or loss. Item and
//! user master data live in the inventory and identity services; this
//! service keeps only their ids and orchestrates state changes across
//! service boundaries, emitting an event for every transition.

use std::sync::Arc;

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod publisher;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
