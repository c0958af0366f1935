//! Device availability ledger, read side
//!
//! The write side (reserve/release) runs inside the ticket state machine's
//! transactions; see `repository::availability`.

use crate::{
    error::{AppError, AppResult},
    models::{availability::BorrowWindow, device::DeviceAvailability},
    repository::Repository,
};

#[derive(Clone)]
pub struct AvailabilityService {
    repository: Repository,
}

impl AvailabilityService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Subset of the given units free of overlapping reservations for the
    /// window
    pub async fn check_availability(
        &self,
        unit_ids: &[i32],
        window: BorrowWindow,
    ) -> AppResult<Vec<i32>> {
        if unit_ids.is_empty() {
            return Err(AppError::Validation(
                "at least one device unit is required".to_string(),
            ));
        }
        if window.end <= window.start {
            return Err(AppError::Validation(
                "window end must be after window start".to_string(),
            ));
        }
        self.repository
            .availability
            .available_subset(unit_ids, window)
            .await
    }

    /// Per-device total and free unit counts for a window
    pub async fn device_availability(
        &self,
        window: BorrowWindow,
    ) -> AppResult<Vec<DeviceAvailability>> {
        if window.end <= window.start {
            return Err(AppError::Validation(
                "window end must be after window start".to_string(),
            ));
        }
        self.repository.availability.device_counts(window).await
    }
}
