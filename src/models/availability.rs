//! Device availability models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Interval reservation binding a device unit to a ticket
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AvailabilityRecord {
    pub id: i32,
    pub unit_id: i32,
    pub ticket_id: i32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Status (0=active, 1=ended)
    pub status: i16,
    pub crea_date: Option<DateTime<Utc>>,
}

/// Half-open borrow window `[start, end)`
///
/// Back-to-back bookings at the exact boundary do not conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BorrowWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BorrowWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Overlap test: `other.start < self.end AND other.end > self.start`
    pub fn overlaps(&self, other_start: DateTime<Utc>, other_end: DateTime<Utc>) -> bool {
        other_start < self.end && other_end > self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0).single().expect("valid time")
    }

    #[test]
    fn partial_overlap_conflicts() {
        let w = BorrowWindow::new(t(10), t(12));
        assert!(w.overlaps(t(11), t(13)));
        assert!(w.overlaps(t(9), t(11)));
    }

    #[test]
    fn containment_conflicts() {
        let w = BorrowWindow::new(t(10), t(14));
        assert!(w.overlaps(t(11), t(12)));
        assert!(w.overlaps(t(9), t(15)));
    }

    #[test]
    fn back_to_back_bookings_do_not_conflict() {
        let w = BorrowWindow::new(t(10), t(12));
        assert!(!w.overlaps(t(12), t(14)));
        assert!(!w.overlaps(t(8), t(10)));
    }

    #[test]
    fn disjoint_windows_do_not_conflict() {
        let w = BorrowWindow::new(t(10), t(11));
        assert!(!w.overlaps(t(11) + Duration::minutes(30), t(13)));
    }
}
