//! Tickets repository
//!
//! Every transition is a conditional UPDATE guarded by the expected current
//! state; zero rows affected means a concurrent writer got there first and
//! the caller decides whether that is a conflict or a benign no-op.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{LifecycleStatus, StageStatus, TicketStatus},
        flow::StageSpec,
        ticket::{CreateTicket, Ticket, TicketStage},
    },
};

#[derive(Clone)]
pub struct TicketsRepository {
    pool: Pool<Postgres>,
}

impl TicketsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get ticket by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Ticket> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))
    }

    /// Get ticket by ID, locking the row for the transaction
    pub async fn get_by_id_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> AppResult<Ticket> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))
    }

    /// Insert a ticket (status PENDING, current_stage 1)
    pub async fn insert_ticket(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        requester_id: i32,
        data: &CreateTicket,
    ) -> AppResult<Ticket> {
        let row = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (requester_id, window_start, window_end, purpose, location)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(requester_id)
        .bind(data.window_start)
        .bind(data.window_end)
        .bind(&data.purpose)
        .bind(&data.location)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Bind a requested unit to a ticket
    pub async fn insert_ticket_unit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        unit_id: i32,
    ) -> AppResult<()> {
        sqlx::query("INSERT INTO ticket_units (ticket_id, unit_id) VALUES ($1, $2)")
            .bind(ticket_id)
            .bind(unit_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Materialize one resolved flow step onto a ticket
    pub async fn insert_stage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        spec: &StageSpec,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_stages (ticket_id, step_no, role, department_id, section_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(ticket_id)
        .bind(spec.step_no)
        .bind(i16::from(spec.role))
        .bind(spec.department_id)
        .bind(spec.section_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Unit IDs requested by a ticket
    pub async fn unit_ids(&self, ticket_id: i32) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT unit_id FROM ticket_units WHERE ticket_id = $1 ORDER BY unit_id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Unit IDs requested by a ticket, read inside a transaction
    pub async fn unit_ids_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
    ) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT unit_id FROM ticket_units WHERE ticket_id = $1 ORDER BY unit_id",
        )
        .bind(ticket_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(ids)
    }

    /// Ordered stages of a ticket
    pub async fn stages(&self, ticket_id: i32) -> AppResult<Vec<TicketStage>> {
        let rows = sqlx::query_as::<_, TicketStage>(
            "SELECT * FROM ticket_stages WHERE ticket_id = $1 ORDER BY step_no",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// One stage of a ticket, read inside a transaction
    pub async fn get_stage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        step_no: i16,
    ) -> AppResult<TicketStage> {
        sqlx::query_as::<_, TicketStage>(
            "SELECT * FROM ticket_stages WHERE ticket_id = $1 AND step_no = $2",
        )
        .bind(ticket_id)
        .bind(step_no)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Ticket {} has no stage {}", ticket_id, step_no))
        })
    }

    /// Number of stages materialized on a ticket
    pub async fn stage_count(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
    ) -> AppResult<i16> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ticket_stages WHERE ticket_id = $1")
                .bind(ticket_id)
                .fetch_one(&mut **tx)
                .await?;
        Ok(count as i16)
    }

    /// Conditional stage decision; false means the stage was concurrently
    /// acted on
    pub async fn mark_stage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        step_no: i16,
        status: StageStatus,
        acted_by: Option<i32>,
        note: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ticket_stages
            SET status = $1, acted_by = $2, acted_at = $3, note = $4
            WHERE ticket_id = $5 AND step_no = $6 AND status = $7
            "#,
        )
        .bind(i16::from(status))
        .bind(acted_by)
        .bind(Utc::now())
        .bind(note)
        .bind(ticket_id)
        .bind(step_no)
        .bind(i16::from(StageStatus::Pending))
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Advance a PENDING ticket past an intermediate approved stage
    pub async fn advance_stage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        expected_stage: i16,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET current_stage = current_stage + 1, modif_date = $1
            WHERE id = $2 AND status = $3 AND current_stage = $4
            "#,
        )
        .bind(Utc::now())
        .bind(ticket_id)
        .bind(i16::from(TicketStatus::Pending))
        .bind(expected_stage)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Final-stage approval: PENDING -> APPROVED
    pub async fn approve(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        expected_stage: i16,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $1, modif_date = $2
            WHERE id = $3 AND status = $4 AND current_stage = $5
            "#,
        )
        .bind(i16::from(TicketStatus::Approved))
        .bind(Utc::now())
        .bind(ticket_id)
        .bind(i16::from(TicketStatus::Pending))
        .bind(expected_stage)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stage rejection: PENDING -> REJECTED, reason stored
    pub async fn reject(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        expected_stage: i16,
        reason: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $1, reject_reason = $2, modif_date = $3
            WHERE id = $4 AND status = $5 AND current_stage = $6
            "#,
        )
        .bind(i16::from(TicketStatus::Rejected))
        .bind(reason)
        .bind(Utc::now())
        .bind(ticket_id)
        .bind(i16::from(TicketStatus::Pending))
        .bind(expected_stage)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pickup: APPROVED -> IN_USE. Zero rows affected is the benign outcome
    /// of the human/scheduler race, not an error.
    pub async fn begin_use(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $1, pickup_at = $2, modif_date = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(i16::from(TicketStatus::InUse))
        .bind(now)
        .bind(ticket_id)
        .bind(i16::from(TicketStatus::Approved))
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return: IN_USE or OVERDUE -> COMPLETED
    pub async fn complete(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $1, return_at = $2, modif_date = $2
            WHERE id = $3 AND status = ANY($4)
            "#,
        )
        .bind(i16::from(TicketStatus::Completed))
        .bind(now)
        .bind(ticket_id)
        .bind(vec![
            i16::from(TicketStatus::InUse),
            i16::from(TicketStatus::Overdue),
        ])
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// IN_USE -> OVERDUE, informational only
    pub async fn mark_overdue(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i32,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $1, modif_date = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(i16::from(TicketStatus::Overdue))
        .bind(Utc::now())
        .bind(ticket_id)
        .bind(i16::from(TicketStatus::InUse))
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// First unit (if any) already requested for an overlapping window by a
    /// live ticket. Availability records only exist once a ticket is fully
    /// approved, so creation must also look at pending requests to keep two
    /// concurrent creations from claiming the same unit.
    pub async fn overlapping_request(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        unit_ids: &[i32],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Option<i32>> {
        let unit_id = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT tu.unit_id FROM ticket_units tu
            JOIN tickets t ON t.id = tu.ticket_id
            WHERE tu.unit_id = ANY($1)
              AND t.status = ANY($2)
              AND t.window_start < $3 AND t.window_end > $4
            ORDER BY tu.unit_id
            LIMIT 1
            "#,
        )
        .bind(unit_ids.to_vec())
        .bind(vec![
            i16::from(TicketStatus::Pending),
            i16::from(TicketStatus::Approved),
        ])
        .bind(window_end)
        .bind(window_start)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(unit_id)
    }

    /// Approved tickets whose borrow window has started
    pub async fn due_for_pickup(&self, now: DateTime<Utc>) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM tickets WHERE status = $1 AND window_start <= $2 ORDER BY window_start",
        )
        .bind(i16::from(TicketStatus::Approved))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// In-use tickets past their window end
    pub async fn due_for_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM tickets WHERE status = $1 AND window_end < $2 ORDER BY window_end",
        )
        .bind(i16::from(TicketStatus::InUse))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// In-use tickets ending within the lead window (notification cadence)
    pub async fn due_soon(
        &self,
        now: DateTime<Utc>,
        lead_hours: i64,
    ) -> AppResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE status = $1 AND window_end > $2 AND window_end <= $3
            ORDER BY window_end
            "#,
        )
        .bind(i16::from(TicketStatus::InUse))
        .bind(now)
        .bind(now + Duration::hours(lead_hours))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// A requester's tickets, newest first
    pub async fn list_for_requester(&self, requester_id: i32) -> AppResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE requester_id = $1 AND lifecycle = $2
            ORDER BY crea_date DESC
            "#,
        )
        .bind(requester_id)
        .bind(i16::from(LifecycleStatus::Active))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Pending tickets whose current stage matches the approver's
    /// role/department/section (the approver's inbox)
    pub async fn pending_for_approver(
        &self,
        role: i16,
        department_id: Option<i32>,
        section_id: Option<i32>,
    ) -> AppResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT t.* FROM tickets t
            JOIN ticket_stages s ON s.ticket_id = t.id AND s.step_no = t.current_stage
            WHERE t.status = $1 AND t.lifecycle = $2
              AND s.status = $3
              AND s.role = $4
              AND (s.department_id IS NULL OR s.department_id = $5)
              AND (s.section_id IS NULL OR s.section_id = $6)
            ORDER BY t.crea_date
            "#,
        )
        .bind(i16::from(TicketStatus::Pending))
        .bind(i16::from(LifecycleStatus::Active))
        .bind(i16::from(StageStatus::Pending))
        .bind(role)
        .bind(department_id)
        .bind(section_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
