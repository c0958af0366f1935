//! Devices and device units repository

use chrono::Utc;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        device::{CreateDevice, CreateDeviceUnit, Device, DeviceUnit},
        enums::{LifecycleStatus, UnitStatus},
    },
};

#[derive(Clone)]
pub struct DevicesRepository {
    pool: Pool<Postgres>,
}

impl DevicesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get device by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Device> {
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// Get device by ID inside a transaction
    pub async fn get_by_id_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> AppResult<Device> {
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))
    }

    /// List active devices
    pub async fn list(&self) -> AppResult<Vec<Device>> {
        let rows = sqlx::query_as::<_, Device>(
            "SELECT * FROM devices WHERE lifecycle = $1 ORDER BY name",
        )
        .bind(i16::from(LifecycleStatus::Active))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get device unit by ID
    pub async fn get_unit(&self, id: i32) -> AppResult<DeviceUnit> {
        sqlx::query_as::<_, DeviceUnit>("SELECT * FROM device_units WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device unit {} not found", id)))
    }

    /// List a device's active units
    pub async fn units_of_device(&self, device_id: i32) -> AppResult<Vec<DeviceUnit>> {
        let rows = sqlx::query_as::<_, DeviceUnit>(
            "SELECT * FROM device_units WHERE device_id = $1 AND lifecycle = $2 ORDER BY asset_code",
        )
        .bind(device_id)
        .bind(i16::from(LifecycleStatus::Active))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert a device
    pub async fn insert_device(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        data: &CreateDevice,
    ) -> AppResult<Device> {
        let row = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (name, category_id, section_id, max_borrow_days)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(data.category_id)
        .bind(data.section_id)
        .bind(data.max_borrow_days)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Insert a device unit (status READY)
    pub async fn insert_unit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        device_id: i32,
        data: &CreateDeviceUnit,
    ) -> AppResult<DeviceUnit> {
        let row = sqlx::query_as::<_, DeviceUnit>(
            r#"
            INSERT INTO device_units (device_id, serial_no, asset_code)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(device_id)
        .bind(&data.serial_no)
        .bind(&data.asset_code)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Lock one unit row for the duration of the transaction
    pub async fn lock_unit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> AppResult<DeviceUnit> {
        sqlx::query_as::<_, DeviceUnit>("SELECT * FROM device_units WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device unit {} not found", id)))
    }

    /// Lock a set of unit rows; serializes concurrent ticket creations that
    /// touch the same units
    pub async fn lock_units(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        unit_ids: &[i32],
    ) -> AppResult<Vec<DeviceUnit>> {
        let rows = sqlx::query_as::<_, DeviceUnit>(
            "SELECT * FROM device_units WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(unit_ids.to_vec())
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    /// Conditional unit status transition; false means the unit was not in
    /// the expected `from` status
    pub async fn set_unit_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        unit_id: i32,
        from: UnitStatus,
        to: UnitStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE device_units SET status = $1, modif_date = $2 WHERE id = $3 AND status = $4",
        )
        .bind(i16::from(to))
        .bind(Utc::now())
        .bind(unit_id)
        .bind(i16::from(from))
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-retire a unit; false means it was already retired
    pub async fn retire_unit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        unit_id: i32,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE device_units SET lifecycle = $1, modif_date = $2 WHERE id = $3 AND lifecycle = $4",
        )
        .bind(i16::from(LifecycleStatus::Retired))
        .bind(Utc::now())
        .bind(unit_id)
        .bind(i16::from(LifecycleStatus::Active))
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
