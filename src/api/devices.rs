//! Device and inventory endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        audit::{RepairAuditEntry, UnitAuditEntry},
        device::{CreateDevice, CreateDeviceUnit, Device, DeviceDetails, DeviceUnit},
        flow::StageSpec,
    },
};

use super::AuthenticatedActor;

/// Repair hand-off request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RepairRequest {
    pub note: Option<String>,
}

/// List active devices
#[utoipa::path(
    get,
    path = "/devices",
    tag = "devices",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active devices", body = Vec<Device>)
    )
)]
pub async fn list_devices(
    State(state): State<crate::AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
) -> AppResult<Json<Vec<Device>>> {
    let devices = state.services.devices.list().await?;
    Ok(Json(devices))
}

/// Get a device with its units
#[utoipa::path(
    get,
    path = "/devices/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Device ID")
    ),
    responses(
        (status = 200, description = "Device with units", body = DeviceDetails),
        (status = 404, description = "Device not found")
    )
)]
pub async fn get_device(
    State(state): State<crate::AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    Path(device_id): Path<i32>,
) -> AppResult<Json<DeviceDetails>> {
    let device = state.services.devices.get(device_id).await?;
    Ok(Json(device))
}

/// The resolved approval path tickets for this device will follow
#[utoipa::path(
    get,
    path = "/devices/{id}/flow",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Device ID")
    ),
    responses(
        (status = 200, description = "Ordered stage specifications", body = Vec<StageSpec>),
        (status = 422, description = "Device has no usable approval flow")
    )
)]
pub async fn get_device_flow(
    State(state): State<crate::AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    Path(device_id): Path<i32>,
) -> AppResult<Json<Vec<StageSpec>>> {
    state.services.devices.get(device_id).await?;
    let specs = state.services.flows.resolve_flow(device_id).await?;
    Ok(Json(specs))
}

/// Create a device with its approval flow and initial units
#[utoipa::path(
    post,
    path = "/devices",
    tag = "devices",
    security(("bearer_auth" = [])),
    request_body = CreateDevice,
    responses(
        (status = 201, description = "Device created", body = DeviceDetails),
        (status = 403, description = "Administrator role required"),
        (status = 422, description = "Approval flow is misconfigured")
    )
)]
pub async fn create_device(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(request): Json<CreateDevice>,
) -> AppResult<(StatusCode, Json<DeviceDetails>)> {
    actor.require_admin()?;

    let device = state.services.devices.create_device(&actor, &request).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// Add one physical unit to a device
#[utoipa::path(
    post,
    path = "/devices/{id}/units",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Device ID")
    ),
    request_body = CreateDeviceUnit,
    responses(
        (status = 201, description = "Unit added", body = DeviceUnit),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Device not found")
    )
)]
pub async fn add_unit(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(device_id): Path<i32>,
    Json(request): Json<CreateDeviceUnit>,
) -> AppResult<(StatusCode, Json<DeviceUnit>)> {
    actor.require_admin()?;

    let unit = state.services.devices.add_unit(&actor, device_id, &request).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

/// Soft-retire a unit
#[utoipa::path(
    delete,
    path = "/units/{id}",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Device unit ID")
    ),
    responses(
        (status = 204, description = "Unit retired"),
        (status = 403, description = "Administrator role required"),
        (status = 422, description = "Unit is on loan or already retired")
    )
)]
pub async fn retire_unit(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(unit_id): Path<i32>,
) -> AppResult<StatusCode> {
    actor.require_admin()?;

    state.services.devices.retire_unit(&actor, unit_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Hand a unit over to repair
#[utoipa::path(
    post,
    path = "/units/{id}/repair",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Device unit ID")
    ),
    request_body = RepairRequest,
    responses(
        (status = 200, description = "Unit moved to REPAIRING", body = DeviceUnit),
        (status = 403, description = "Technician role required"),
        (status = 422, description = "Unit cannot enter repair from its current status")
    )
)]
pub async fn start_repair(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(unit_id): Path<i32>,
    Json(request): Json<RepairRequest>,
) -> AppResult<Json<DeviceUnit>> {
    actor.require_technician()?;

    let unit = state
        .services
        .devices
        .start_repair(&actor, unit_id, request.note.as_deref())
        .await?;
    Ok(Json(unit))
}

/// Mark a repair as finished
#[utoipa::path(
    post,
    path = "/units/{id}/repair/complete",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Device unit ID")
    ),
    request_body = RepairRequest,
    responses(
        (status = 200, description = "Unit back to READY", body = DeviceUnit),
        (status = 403, description = "Technician role required"),
        (status = 422, description = "Unit is not under repair")
    )
)]
pub async fn complete_repair(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(unit_id): Path<i32>,
    Json(request): Json<RepairRequest>,
) -> AppResult<Json<DeviceUnit>> {
    actor.require_technician()?;

    let unit = state
        .services
        .devices
        .complete_repair(&actor, unit_id, request.note.as_deref())
        .await?;
    Ok(Json(unit))
}

/// A unit's append-only audit history
#[utoipa::path(
    get,
    path = "/units/{id}/history",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Device unit ID")
    ),
    responses(
        (status = 200, description = "Audit entries, oldest first", body = Vec<UnitAuditEntry>),
        (status = 404, description = "Unit not found")
    )
)]
pub async fn unit_history(
    State(state): State<crate::AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    Path(unit_id): Path<i32>,
) -> AppResult<Json<Vec<UnitAuditEntry>>> {
    let entries = state.services.devices.unit_history(unit_id).await?;
    Ok(Json(entries))
}

/// A unit's repair history
#[utoipa::path(
    get,
    path = "/units/{id}/repairs",
    tag = "devices",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Device unit ID")
    ),
    responses(
        (status = 200, description = "Repair audit entries, oldest first", body = Vec<RepairAuditEntry>),
        (status = 404, description = "Unit not found")
    )
)]
pub async fn repair_history(
    State(state): State<crate::AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    Path(unit_id): Path<i32>,
) -> AppResult<Json<Vec<RepairAuditEntry>>> {
    let entries = state.services.devices.repair_history(unit_id).await?;
    Ok(Json(entries))
}
