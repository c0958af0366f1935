//! Repository layer for database operations
//!
//! State-machine mutations always run through methods taking the enclosing
//! `Transaction`; no other code path writes the ticket, stage, unit or
//! availability tables.

pub mod audit;
pub mod availability;
pub mod devices;
pub mod flows;
pub mod tickets;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub devices: devices::DevicesRepository,
    pub flows: flows::FlowsRepository,
    pub tickets: tickets::TicketsRepository,
    pub availability: availability::AvailabilityRepository,
    pub audit: audit::AuditRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            devices: devices::DevicesRepository::new(pool.clone()),
            flows: flows::FlowsRepository::new(pool.clone()),
            tickets: tickets::TicketsRepository::new(pool.clone()),
            availability: availability::AvailabilityRepository::new(pool.clone()),
            audit: audit::AuditRepository::new(pool.clone()),
            pool,
        }
    }
}
