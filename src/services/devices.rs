//! Device and inventory administration
//!
//! Device creation fixes the approval flow for good; there is deliberately
//! no flow-edit operation. Unit status writes outside the borrow cycle
//! (repair hand-off) also live here and share the audit machinery.

use crate::{
    error::{AppError, AppResult},
    models::{
        actor::Actor,
        audit::{RepairAuditEntry, UnitAuditEntry},
        device::{CreateDevice, CreateDeviceUnit, Device, DeviceDetails, DeviceUnit},
        enums::{LifecycleStatus, UnitStatus},
    },
    repository::Repository,
    services::flows,
};

#[derive(Clone)]
pub struct DevicesService {
    repository: Repository,
}

impl DevicesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List active devices
    pub async fn list(&self) -> AppResult<Vec<Device>> {
        self.repository.devices.list().await
    }

    /// Get a device with its active units
    pub async fn get(&self, device_id: i32) -> AppResult<DeviceDetails> {
        let device = self.repository.devices.get_by_id(device_id).await?;
        let units = self.repository.devices.units_of_device(device_id).await?;
        Ok(DeviceDetails { device, units })
    }

    /// Create a device together with its approval flow and initial units
    pub async fn create_device(&self, actor: &Actor, data: &CreateDevice) -> AppResult<DeviceDetails> {
        if data.name.trim().is_empty() {
            return Err(AppError::Validation("device name is required".to_string()));
        }
        if data.max_borrow_days < 1 {
            return Err(AppError::Validation(
                "max_borrow_days must be at least 1".to_string(),
            ));
        }
        // Misconfigured flows are rejected here, before any ticket exists
        let specs = flows::materialize_request(&data.flow_steps)?;

        let mut tx = self.repository.pool.begin().await?;

        let device = self.repository.devices.insert_device(&mut tx, data).await?;
        let flow_id = self.repository.flows.insert_flow(&mut tx, device.id).await?;
        for step in &data.flow_steps {
            self.repository.flows.insert_step(&mut tx, flow_id, step).await?;
        }

        let mut units = Vec::with_capacity(data.units.len());
        for unit_data in &data.units {
            let unit = self
                .repository
                .devices
                .insert_unit(&mut tx, device.id, unit_data)
                .await?;
            self.repository
                .audit
                .unit_entry(
                    &mut tx,
                    unit.id,
                    None,
                    "REGISTERED",
                    actor.id,
                    None,
                    Some(unit.status),
                    None,
                )
                .await?;
            units.push(unit);
        }

        tx.commit().await?;

        tracing::info!(device_id = device.id, stages = specs.len(), "device created");
        Ok(DeviceDetails { device, units })
    }

    /// Add one physical unit to an existing device
    pub async fn add_unit(
        &self,
        actor: &Actor,
        device_id: i32,
        data: &CreateDeviceUnit,
    ) -> AppResult<DeviceUnit> {
        if data.asset_code.trim().is_empty() {
            return Err(AppError::Validation("asset_code is required".to_string()));
        }

        let mut tx = self.repository.pool.begin().await?;

        let device = self.repository.devices.get_by_id_tx(&mut tx, device_id).await?;
        if LifecycleStatus::from(device.lifecycle) != LifecycleStatus::Active {
            return Err(AppError::State(format!("Device {} is retired", device_id)));
        }

        let unit = self
            .repository
            .devices
            .insert_unit(&mut tx, device_id, data)
            .await?;
        self.repository
            .audit
            .unit_entry(
                &mut tx,
                unit.id,
                None,
                "REGISTERED",
                actor.id,
                None,
                Some(unit.status),
                None,
            )
            .await?;

        tx.commit().await?;
        Ok(unit)
    }

    /// Soft-retire a unit. Refused while the unit is out on loan.
    pub async fn retire_unit(&self, actor: &Actor, unit_id: i32) -> AppResult<()> {
        let mut tx = self.repository.pool.begin().await?;

        let unit = self.repository.devices.lock_unit(&mut tx, unit_id).await?;
        if UnitStatus::from(unit.status) == UnitStatus::Borrowed {
            return Err(AppError::State(format!(
                "Device unit {} is on loan and cannot be retired",
                unit_id
            )));
        }

        let retired = self.repository.devices.retire_unit(&mut tx, unit_id).await?;
        if !retired {
            return Err(AppError::State(format!(
                "Device unit {} is already retired",
                unit_id
            )));
        }
        self.repository
            .audit
            .unit_entry(
                &mut tx,
                unit_id,
                None,
                "RETIRED",
                actor.id,
                Some(unit.status),
                Some(unit.status),
                None,
            )
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Hand a unit over to repair: READY or DAMAGED -> REPAIRING
    pub async fn start_repair(
        &self,
        actor: &Actor,
        unit_id: i32,
        note: Option<&str>,
    ) -> AppResult<DeviceUnit> {
        self.repair_transition(
            actor,
            unit_id,
            &[UnitStatus::Ready, UnitStatus::Damaged],
            UnitStatus::Repairing,
            "REPAIR_STARTED",
            note,
        )
        .await
    }

    /// Repair finished: REPAIRING -> READY
    pub async fn complete_repair(
        &self,
        actor: &Actor,
        unit_id: i32,
        note: Option<&str>,
    ) -> AppResult<DeviceUnit> {
        self.repair_transition(
            actor,
            unit_id,
            &[UnitStatus::Repairing],
            UnitStatus::Ready,
            "REPAIR_COMPLETED",
            note,
        )
        .await
    }

    /// A unit's append-only audit history
    pub async fn unit_history(&self, unit_id: i32) -> AppResult<Vec<UnitAuditEntry>> {
        self.repository.devices.get_unit(unit_id).await?;
        self.repository.audit.unit_history(unit_id).await
    }

    /// A unit's repair history
    pub async fn repair_history(&self, unit_id: i32) -> AppResult<Vec<RepairAuditEntry>> {
        self.repository.devices.get_unit(unit_id).await?;
        self.repository.audit.repair_history(unit_id).await
    }

    async fn repair_transition(
        &self,
        actor: &Actor,
        unit_id: i32,
        allowed_from: &[UnitStatus],
        to: UnitStatus,
        action: &str,
        note: Option<&str>,
    ) -> AppResult<DeviceUnit> {
        let mut tx = self.repository.pool.begin().await?;

        let unit = self.repository.devices.lock_unit(&mut tx, unit_id).await?;
        let current = UnitStatus::from(unit.status);
        if !allowed_from.contains(&current) {
            return Err(AppError::State(format!(
                "Device unit {} is {} and cannot move to {}",
                unit_id, current, to
            )));
        }

        let updated = self
            .repository
            .devices
            .set_unit_status(&mut tx, unit_id, current, to)
            .await?;
        if !updated {
            return Err(AppError::Conflict(format!(
                "Device unit {} changed concurrently",
                unit_id
            )));
        }
        self.repository
            .audit
            .repair_entry(
                &mut tx,
                unit_id,
                action,
                actor.id,
                Some(i16::from(current)),
                Some(i16::from(to)),
                note,
            )
            .await?;

        tx.commit().await?;
        self.repository.devices.get_unit(unit_id).await
    }
}
