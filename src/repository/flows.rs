//! Approval flow repository

use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::AppResult,
    models::{
        enums::LifecycleStatus,
        flow::{ApprovalFlow, ApprovalFlowStep, CreateFlowStep},
    },
};

#[derive(Clone)]
pub struct FlowsRepository {
    pool: Pool<Postgres>,
}

impl FlowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get a device's active approval flow, if any
    pub async fn active_flow_for_device(&self, device_id: i32) -> AppResult<Option<ApprovalFlow>> {
        let row = sqlx::query_as::<_, ApprovalFlow>(
            "SELECT * FROM approval_flows WHERE device_id = $1 AND lifecycle = $2",
        )
        .bind(device_id)
        .bind(i16::from(LifecycleStatus::Active))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Ordered steps of a flow
    pub async fn steps_for_flow(&self, flow_id: i32) -> AppResult<Vec<ApprovalFlowStep>> {
        let rows = sqlx::query_as::<_, ApprovalFlowStep>(
            "SELECT * FROM approval_flow_steps WHERE flow_id = $1 ORDER BY step_no",
        )
        .bind(flow_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Ordered steps of a device's active flow, read inside a transaction.
    /// Returns None when the device has no active flow.
    pub async fn active_steps_for_device(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        device_id: i32,
    ) -> AppResult<Option<Vec<ApprovalFlowStep>>> {
        let flow = sqlx::query_as::<_, ApprovalFlow>(
            "SELECT * FROM approval_flows WHERE device_id = $1 AND lifecycle = $2",
        )
        .bind(device_id)
        .bind(i16::from(LifecycleStatus::Active))
        .fetch_optional(&mut **tx)
        .await?;

        let Some(flow) = flow else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, ApprovalFlowStep>(
            "SELECT * FROM approval_flow_steps WHERE flow_id = $1 ORDER BY step_no",
        )
        .bind(flow.id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(Some(rows))
    }

    /// Insert a flow header for a device
    pub async fn insert_flow(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        device_id: i32,
    ) -> AppResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO approval_flows (device_id) VALUES ($1) RETURNING id",
        )
        .bind(device_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Insert one flow step
    pub async fn insert_step(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        flow_id: i32,
        step: &CreateFlowStep,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO approval_flow_steps (flow_id, step_no, role, department_id, section_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(flow_id)
        .bind(step.step_no)
        .bind(step.role)
        .bind(step.department_id)
        .bind(step.section_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
