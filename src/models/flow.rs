//! Approval flow models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::Role;

/// Approval flow header, one active flow per device
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalFlow {
    pub id: i32,
    pub device_id: i32,
    pub lifecycle: i16,
    pub crea_date: Option<DateTime<Utc>>,
}

/// One stored step of a device's approval flow
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalFlowStep {
    pub id: i32,
    pub flow_id: i32,
    /// 1..N, strictly increasing, no gaps
    pub step_no: i16,
    pub role: i16,
    pub department_id: Option<i32>,
    /// None = any section within the department
    pub section_id: Option<i32>,
}

/// Flow step as supplied at device creation
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateFlowStep {
    pub step_no: i16,
    pub role: i16,
    pub department_id: Option<i32>,
    pub section_id: Option<i32>,
}

/// Resolved stage specification, ready to be copied onto a new ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StageSpec {
    pub step_no: i16,
    pub role: Role,
    pub department_id: Option<i32>,
    pub section_id: Option<i32>,
}
