//! Append-only audit trail repository
//!
//! Writers take the enclosing transaction: an unaudited state change must
//! not commit, so an audit failure fails the whole operation. There is no
//! update or delete method here on purpose.

use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::AppResult,
    models::audit::{RepairAuditEntry, TicketAuditEntry, UnitAuditEntry},
};

#[derive(Clone)]
pub struct AuditRepository {
    pool: Pool<Postgres>,
}

impl AuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Append a ticket audit entry
    #[allow(clippy::too_many_arguments)]
    pub async fn ticket_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        stage_no: Option<i16>,
        action: &str,
        actor_id: Option<i32>,
        old_status: Option<i16>,
        new_status: Option<i16>,
        note: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_audit (ticket_id, stage_no, action, actor_id, old_status, new_status, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(ticket_id)
        .bind(stage_no)
        .bind(action)
        .bind(actor_id)
        .bind(old_status)
        .bind(new_status)
        .bind(note)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Append a device unit audit entry
    #[allow(clippy::too_many_arguments)]
    pub async fn unit_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        unit_id: i32,
        ticket_id: Option<i32>,
        action: &str,
        actor_id: Option<i32>,
        old_status: Option<i16>,
        new_status: Option<i16>,
        note: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO unit_audit (unit_id, ticket_id, action, actor_id, old_status, new_status, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(unit_id)
        .bind(ticket_id)
        .bind(action)
        .bind(actor_id)
        .bind(old_status)
        .bind(new_status)
        .bind(note)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Append a repair audit entry
    pub async fn repair_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        unit_id: i32,
        action: &str,
        actor_id: Option<i32>,
        old_status: Option<i16>,
        new_status: Option<i16>,
        note: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO repair_audit (unit_id, action, actor_id, old_status, new_status, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(unit_id)
        .bind(action)
        .bind(actor_id)
        .bind(old_status)
        .bind(new_status)
        .bind(note)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// A ticket's audit history, oldest first
    pub async fn ticket_history(&self, ticket_id: i32) -> AppResult<Vec<TicketAuditEntry>> {
        let rows = sqlx::query_as::<_, TicketAuditEntry>(
            "SELECT * FROM ticket_audit WHERE ticket_id = $1 ORDER BY id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// A unit's audit history, oldest first
    pub async fn unit_history(&self, unit_id: i32) -> AppResult<Vec<UnitAuditEntry>> {
        let rows = sqlx::query_as::<_, UnitAuditEntry>(
            "SELECT * FROM unit_audit WHERE unit_id = $1 ORDER BY id",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// A unit's repair history, oldest first
    pub async fn repair_history(&self, unit_id: i32) -> AppResult<Vec<RepairAuditEntry>> {
        let rows = sqlx::query_as::<_, RepairAuditEntry>(
            "SELECT * FROM repair_audit WHERE unit_id = $1 ORDER BY id",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
