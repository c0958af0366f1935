//! Device availability ledger repository
//!
//! Reservations use half-open interval semantics: an existing record
//! conflicts with a window iff `existing.start < w.end AND existing.end >
//! w.start`, so back-to-back bookings at the exact boundary do not collide.

use std::collections::HashSet;

use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        availability::{AvailabilityRecord, BorrowWindow},
        device::DeviceAvailability,
        enums::{AvailabilityStatus, LifecycleStatus},
    },
};

#[derive(Clone)]
pub struct AvailabilityRepository {
    pool: Pool<Postgres>,
}

impl AvailabilityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Active records overlapping the window for any of the units, locked
    /// for the transaction
    pub async fn conflicting(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        unit_ids: &[i32],
        window: BorrowWindow,
    ) -> AppResult<Vec<AvailabilityRecord>> {
        let rows = sqlx::query_as::<_, AvailabilityRecord>(
            r#"
            SELECT * FROM availability_records
            WHERE unit_id = ANY($1) AND status = $2
              AND window_start < $3 AND window_end > $4
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(unit_ids.to_vec())
        .bind(i16::from(AvailabilityStatus::Active))
        .bind(window.end)
        .bind(window.start)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    /// Subset of the given units with no overlapping active reservation
    pub async fn available_subset(
        &self,
        unit_ids: &[i32],
        window: BorrowWindow,
    ) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT u.id FROM device_units u
            WHERE u.id = ANY($1) AND u.lifecycle = $2
              AND NOT EXISTS (
                  SELECT 1 FROM availability_records r
                  WHERE r.unit_id = u.id AND r.status = $3
                    AND r.window_start < $4 AND r.window_end > $5
              )
            ORDER BY u.id
            "#,
        )
        .bind(unit_ids.to_vec())
        .bind(i16::from(LifecycleStatus::Active))
        .bind(i16::from(AvailabilityStatus::Active))
        .bind(window.end)
        .bind(window.start)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Reserve the units for a ticket's window. Idempotent for units this
    /// ticket already holds; any unit held by another active record is a
    /// conflict.
    pub async fn reserve(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        unit_ids: &[i32],
        window: BorrowWindow,
    ) -> AppResult<()> {
        let existing = self.conflicting(tx, unit_ids, window).await?;

        for record in &existing {
            if record.ticket_id != ticket_id {
                return Err(AppError::Conflict(format!(
                    "Device unit {} is already reserved for an overlapping window",
                    record.unit_id
                )));
            }
        }

        let held: HashSet<i32> = existing.iter().map(|r| r.unit_id).collect();

        for unit_id in unit_ids {
            if held.contains(unit_id) {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO availability_records (unit_id, ticket_id, window_start, window_end)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(unit_id)
            .bind(ticket_id)
            .bind(window.start)
            .bind(window.end)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// End all of a ticket's active records; returns how many were closed
    pub async fn release(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE availability_records SET status = $1 WHERE ticket_id = $2 AND status = $3",
        )
        .bind(i16::from(AvailabilityStatus::Ended))
        .bind(ticket_id)
        .bind(i16::from(AvailabilityStatus::Active))
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Active records held by a ticket
    pub async fn records_for_ticket(&self, ticket_id: i32) -> AppResult<Vec<AvailabilityRecord>> {
        let rows = sqlx::query_as::<_, AvailabilityRecord>(
            "SELECT * FROM availability_records WHERE ticket_id = $1 ORDER BY unit_id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Per-device unit counts: total active units and units free of
    /// overlapping reservations for the window
    pub async fn device_counts(&self, window: BorrowWindow) -> AppResult<Vec<DeviceAvailability>> {
        let rows = sqlx::query_as::<_, DeviceAvailability>(
            r#"
            SELECT d.id AS device_id, d.name,
                   COUNT(u.id) AS total_units,
                   COUNT(u.id) FILTER (WHERE NOT EXISTS (
                       SELECT 1 FROM availability_records r
                       WHERE r.unit_id = u.id AND r.status = $1
                         AND r.window_start < $2 AND r.window_end > $3
                   )) AS free_units
            FROM devices d
            LEFT JOIN device_units u ON u.device_id = d.id AND u.lifecycle = $4
            WHERE d.lifecycle = $4
            GROUP BY d.id, d.name
            ORDER BY d.name
            "#,
        )
        .bind(i16::from(AvailabilityStatus::Active))
        .bind(window.end)
        .bind(window.start)
        .bind(i16::from(LifecycleStatus::Active))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
