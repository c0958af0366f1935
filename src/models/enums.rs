//! Shared domain enums
//!
//! Status columns are stored as SMALLINT codes; these enums are the
//! authoritative mapping between codes and meaning.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// UnitStatus
// ---------------------------------------------------------------------------

/// Point-in-time status of a physical device unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum UnitStatus {
    Ready = 0,
    Borrowed = 1,
    Repairing = 2,
    Damaged = 3,
    Lost = 4,
}

impl From<i16> for UnitStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => UnitStatus::Borrowed,
            2 => UnitStatus::Repairing,
            3 => UnitStatus::Damaged,
            4 => UnitStatus::Lost,
            _ => UnitStatus::Ready,
        }
    }
}

impl From<UnitStatus> for i16 {
    fn from(s: UnitStatus) -> Self {
        s as i16
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            UnitStatus::Ready => "READY",
            UnitStatus::Borrowed => "BORROWED",
            UnitStatus::Repairing => "REPAIRING",
            UnitStatus::Damaged => "DAMAGED",
            UnitStatus::Lost => "LOST",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// TicketStatus
// ---------------------------------------------------------------------------

/// Overall borrow-return ticket status
///
/// `Completed` and `Rejected` are terminal. `Overdue` is not: an overdue
/// ticket still resolves to `Completed` once the units come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum TicketStatus {
    Pending = 0,
    Approved = 1,
    InUse = 2,
    Completed = 3,
    Overdue = 4,
    Rejected = 5,
}

impl From<i16> for TicketStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => TicketStatus::Approved,
            2 => TicketStatus::InUse,
            3 => TicketStatus::Completed,
            4 => TicketStatus::Overdue,
            5 => TicketStatus::Rejected,
            _ => TicketStatus::Pending,
        }
    }
}

impl From<TicketStatus> for i16 {
    fn from(s: TicketStatus) -> Self {
        s as i16
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::Approved => "APPROVED",
            TicketStatus::InUse => "IN_USE",
            TicketStatus::Completed => "COMPLETED",
            TicketStatus::Overdue => "OVERDUE",
            TicketStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// StageStatus
// ---------------------------------------------------------------------------

/// Status of one approval stage on a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum StageStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
}

impl From<i16> for StageStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => StageStatus::Approved,
            2 => StageStatus::Rejected,
            _ => StageStatus::Pending,
        }
    }
}

impl From<StageStatus> for i16 {
    fn from(s: StageStatus) -> Self {
        s as i16
    }
}

// ---------------------------------------------------------------------------
// AvailabilityStatus
// ---------------------------------------------------------------------------

/// Status of an interval reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum AvailabilityStatus {
    Active = 0,
    Ended = 1,
}

impl From<i16> for AvailabilityStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => AvailabilityStatus::Ended,
            _ => AvailabilityStatus::Active,
        }
    }
}

impl From<AvailabilityStatus> for i16 {
    fn from(s: AvailabilityStatus) -> Self {
        s as i16
    }
}

// ---------------------------------------------------------------------------
// LifecycleStatus
// ---------------------------------------------------------------------------

/// Explicit soft-deletion lifecycle. Rows are retired, never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum LifecycleStatus {
    Active = 0,
    Retired = 1,
}

impl From<i16> for LifecycleStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => LifecycleStatus::Retired,
            _ => LifecycleStatus::Active,
        }
    }
}

impl From<LifecycleStatus> for i16 {
    fn from(s: LifecycleStatus) -> Self {
        s as i16
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Approver / caller role codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum Role {
    Admin = 0,
    Hod = 1,
    Staff = 2,
    Technician = 3,
    Student = 4,
}

impl Role {
    /// Strict code lookup used when validating approval flow configuration
    pub fn from_code(v: i16) -> Option<Self> {
        match v {
            0 => Some(Role::Admin),
            1 => Some(Role::Hod),
            2 => Some(Role::Staff),
            3 => Some(Role::Technician),
            4 => Some(Role::Student),
            _ => None,
        }
    }
}

impl From<i16> for Role {
    fn from(v: i16) -> Self {
        Role::from_code(v).unwrap_or(Role::Student)
    }
}

impl From<Role> for i16 {
    fn from(r: Role) -> Self {
        r as i16
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Role::Admin => "ADMIN",
            Role::Hod => "HOD",
            Role::Staff => "STAFF",
            Role::Technician => "TECHNICIAN",
            Role::Student => "STUDENT",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_status_codes_round_trip() {
        for status in [
            TicketStatus::Pending,
            TicketStatus::Approved,
            TicketStatus::InUse,
            TicketStatus::Completed,
            TicketStatus::Overdue,
            TicketStatus::Rejected,
        ] {
            assert_eq!(TicketStatus::from(i16::from(status)), status);
        }
    }

    #[test]
    fn unit_status_codes_round_trip() {
        for status in [
            UnitStatus::Ready,
            UnitStatus::Borrowed,
            UnitStatus::Repairing,
            UnitStatus::Damaged,
            UnitStatus::Lost,
        ] {
            assert_eq!(UnitStatus::from(i16::from(status)), status);
        }
    }

    #[test]
    fn unknown_role_code_is_rejected_strictly() {
        assert_eq!(Role::from_code(42), None);
        // the lenient conversion falls back to the least-privileged role
        assert_eq!(Role::from(42), Role::Student);
    }
}
