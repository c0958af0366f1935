//! Equiptrack Equipment Borrow-Return Tracking Server
//!
//! A Rust implementation of the equipment borrow-return ticket lifecycle
//! engine: approval-flow state machine, time-driven status transitions, and
//! the device-availability bookkeeping they drive.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
