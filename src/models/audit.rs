//! Append-only audit log models
//!
//! Three record shapes: ticket, device unit, repair. `actor_id = NULL`
//! denotes a system-originated (scheduler) transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Ticket audit entry; `stage_no` is set when the entry records a stage
/// action rather than an overall ticket transition
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TicketAuditEntry {
    pub id: i32,
    pub ticket_id: i32,
    pub stage_no: Option<i16>,
    pub action: String,
    pub actor_id: Option<i32>,
    pub old_status: Option<i16>,
    pub new_status: Option<i16>,
    pub note: Option<String>,
    pub crea_date: Option<DateTime<Utc>>,
}

/// Device unit audit entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UnitAuditEntry {
    pub id: i32,
    pub unit_id: i32,
    pub ticket_id: Option<i32>,
    pub action: String,
    pub actor_id: Option<i32>,
    pub old_status: Option<i16>,
    pub new_status: Option<i16>,
    pub note: Option<String>,
    pub crea_date: Option<DateTime<Utc>>,
}

/// Repair audit entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RepairAuditEntry {
    pub id: i32,
    pub unit_id: i32,
    pub action: String,
    pub actor_id: Option<i32>,
    pub old_status: Option<i16>,
    pub new_status: Option<i16>,
    pub note: Option<String>,
    pub crea_date: Option<DateTime<Utc>>,
}
