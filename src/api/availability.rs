//! Device availability endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{availability::BorrowWindow, device::DeviceAvailability},
};

use super::AuthenticatedActor;

/// Requested borrow window
#[derive(Debug, Deserialize, IntoParams)]
pub struct WindowQuery {
    /// Window start (RFC 3339)
    pub start: DateTime<Utc>,
    /// Window end (RFC 3339)
    pub end: DateTime<Utc>,
}

/// Unit-level availability check request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckAvailabilityRequest {
    pub unit_ids: Vec<i32>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Unit-level availability check response
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckAvailabilityResponse {
    /// Requested units free of overlapping reservations
    pub available: Vec<i32>,
}

/// Per-device availability counts for a window
#[utoipa::path(
    get,
    path = "/availability",
    tag = "availability",
    security(("bearer_auth" = [])),
    params(WindowQuery),
    responses(
        (status = 200, description = "Per-device total and free unit counts", body = Vec<DeviceAvailability>),
        (status = 400, description = "Invalid window")
    )
)]
pub async fn device_availability(
    State(state): State<crate::AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<Vec<DeviceAvailability>>> {
    let window = BorrowWindow::new(query.start, query.end);
    let counts = state.services.availability.device_availability(window).await?;
    Ok(Json(counts))
}

/// Which of the given units are free for a window
#[utoipa::path(
    post,
    path = "/availability/check",
    tag = "availability",
    security(("bearer_auth" = [])),
    request_body = CheckAvailabilityRequest,
    responses(
        (status = 200, description = "Available subset of the requested units", body = CheckAvailabilityResponse),
        (status = 400, description = "Invalid window or empty unit list")
    )
)]
pub async fn check_units(
    State(state): State<crate::AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    Json(request): Json<CheckAvailabilityRequest>,
) -> AppResult<Json<CheckAvailabilityResponse>> {
    let window = BorrowWindow::new(request.window_start, request.window_end);
    let available = state
        .services
        .availability
        .check_availability(&request.unit_ids, window)
        .await?;
    Ok(Json(CheckAvailabilityResponse { available }))
}
