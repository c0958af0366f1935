//! Borrow-return ticket models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::UnitStatus;

/// Ticket row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Ticket {
    pub id: i32,
    pub requester_id: i32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub purpose: Option<String>,
    pub location: Option<String>,
    /// Step number of the stage that must act next
    pub current_stage: i16,
    /// Status (0=pending, 1=approved, 2=in_use, 3=completed, 4=overdue, 5=rejected)
    pub status: i16,
    pub pickup_at: Option<DateTime<Utc>>,
    pub return_at: Option<DateTime<Utc>>,
    pub reject_reason: Option<String>,
    /// Lifecycle (0=active, 1=retired)
    pub lifecycle: i16,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

/// One materialized approval stage bound to a ticket
///
/// Role/department/section are copied from the flow step at creation time so
/// later flow edits cannot retroactively alter an in-flight ticket.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TicketStage {
    pub id: i32,
    pub ticket_id: i32,
    pub step_no: i16,
    pub role: i16,
    pub department_id: Option<i32>,
    pub section_id: Option<i32>,
    /// Status (0=pending, 1=approved, 2=rejected)
    pub status: i16,
    pub acted_by: Option<i32>,
    pub acted_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

/// Create ticket request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTicket {
    /// Units requested; all must belong to the same device
    pub unit_ids: Vec<i32>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub purpose: Option<String>,
    pub location: Option<String>,
}

/// Decision taken on a pending stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageDecision {
    Approve,
    Reject,
}

/// Act-on-stage request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActOnStage {
    pub decision: StageDecision,
    pub note: Option<String>,
}

/// Reported condition of a unit at return time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnCondition {
    Ready,
    Damaged,
    Lost,
}

impl From<ReturnCondition> for UnitStatus {
    fn from(c: ReturnCondition) -> Self {
        match c {
            ReturnCondition::Ready => UnitStatus::Ready,
            ReturnCondition::Damaged => UnitStatus::Damaged,
            ReturnCondition::Lost => UnitStatus::Lost,
        }
    }
}

/// Per-unit return report; units not listed are assumed returned intact
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnedUnit {
    pub unit_id: i32,
    pub condition: ReturnCondition,
}

/// Complete ticket request body
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompleteTicket {
    #[serde(default)]
    pub returned: Vec<ReturnedUnit>,
}

/// Ticket with stages and requested units, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TicketDetails {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub stages: Vec<TicketStage>,
    pub unit_ids: Vec<i32>,
}
