//! Device and device unit models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::flow::CreateFlowStep;

/// Borrowable equipment type
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Device {
    pub id: i32,
    pub name: String,
    pub category_id: Option<i32>,
    /// Section that owns the inventory
    pub section_id: Option<i32>,
    /// Longest allowed borrow window, in days
    pub max_borrow_days: i16,
    /// Lifecycle (0=active, 1=retired)
    pub lifecycle: i16,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

/// One physical, individually trackable instance of a device
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DeviceUnit {
    pub id: i32,
    pub device_id: i32,
    pub serial_no: Option<String>,
    pub asset_code: String,
    /// Status (0=ready, 1=borrowed, 2=repairing, 3=damaged, 4=lost)
    pub status: i16,
    /// Lifecycle (0=active, 1=retired)
    pub lifecycle: i16,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

/// Create device request: the approval flow is fixed here, at creation time
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDevice {
    pub name: String,
    pub category_id: Option<i32>,
    pub section_id: Option<i32>,
    pub max_borrow_days: i16,
    /// Ordered approval path every ticket for this device must traverse
    pub flow_steps: Vec<CreateFlowStep>,
    #[serde(default)]
    pub units: Vec<CreateDeviceUnit>,
}

/// Add one physical unit to a device's inventory
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDeviceUnit {
    pub serial_no: Option<String>,
    pub asset_code: String,
}

/// Device with its units, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceDetails {
    #[serde(flatten)]
    pub device: Device,
    pub units: Vec<DeviceUnit>,
}

/// Per-device availability counts for a window
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DeviceAvailability {
    pub device_id: i32,
    pub name: String,
    pub total_units: i64,
    /// Units free of overlapping reservations for the requested window
    pub free_units: i64,
}
