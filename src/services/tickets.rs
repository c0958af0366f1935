//! Ticket state machine
//!
//! Owns every ticket, stage, unit-status and reservation mutation. Each
//! operation is one transaction: read current state, validate, write, audit,
//! commit. Events are published only after the commit succeeds.
//!
//! `PENDING -> APPROVED -> IN_USE -> COMPLETED`, with `PENDING -> REJECTED`
//! and `IN_USE -> OVERDUE` as branches. COMPLETED and REJECTED are terminal;
//! OVERDUE resolves to COMPLETED on return.

use chrono::{Duration, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        actor::Actor,
        audit::TicketAuditEntry,
        availability::BorrowWindow,
        enums::{LifecycleStatus, Role, StageStatus, TicketStatus, UnitStatus},
        flow::StageSpec,
        ticket::{
            ActOnStage, CompleteTicket, CreateTicket, StageDecision, Ticket, TicketDetails,
            TicketStage,
        },
    },
    repository::Repository,
    services::{
        events::{EngineEvent, EventPublisher, StageRouting},
        flows,
    },
};

#[derive(Clone)]
pub struct TicketsService {
    repository: Repository,
    events: EventPublisher,
}

impl TicketsService {
    pub fn new(repository: Repository, events: EventPublisher) -> Self {
        Self { repository, events }
    }

    /// Get a ticket with its stages and requested units
    pub async fn get_ticket(&self, ticket_id: i32) -> AppResult<TicketDetails> {
        let ticket = self.repository.tickets.get_by_id(ticket_id).await?;
        let stages = self.repository.tickets.stages(ticket_id).await?;
        let unit_ids = self.repository.tickets.unit_ids(ticket_id).await?;
        Ok(TicketDetails {
            ticket,
            stages,
            unit_ids,
        })
    }

    /// A requester's tickets
    pub async fn list_for_requester(&self, requester_id: i32) -> AppResult<Vec<Ticket>> {
        self.repository.tickets.list_for_requester(requester_id).await
    }

    /// Pending tickets whose current stage the actor is eligible to act on
    pub async fn approver_inbox(&self, actor: &Actor) -> AppResult<Vec<Ticket>> {
        self.repository
            .tickets
            .pending_for_approver(
                i16::from(actor.role),
                actor.department_id,
                actor.section_id,
            )
            .await
    }

    /// A ticket's append-only audit history
    pub async fn ticket_history(&self, ticket_id: i32) -> AppResult<Vec<TicketAuditEntry>> {
        self.repository.tickets.get_by_id(ticket_id).await?;
        self.repository.audit.ticket_history(ticket_id).await
    }

    /// Create a borrow-return ticket: validate the window against the
    /// device, check the units, materialize the approval stages, audit.
    pub async fn create_ticket(&self, actor: &Actor, data: &CreateTicket) -> AppResult<TicketDetails> {
        let requester_id = actor.user_id()?;

        if data.unit_ids.is_empty() {
            return Err(AppError::Validation(
                "at least one device unit is required".to_string(),
            ));
        }
        let mut unique = data.unit_ids.clone();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != data.unit_ids.len() {
            return Err(AppError::Validation(
                "duplicate device unit ids in request".to_string(),
            ));
        }
        if data.window_end <= data.window_start {
            return Err(AppError::Validation(
                "window end must be after window start".to_string(),
            ));
        }
        let window = BorrowWindow::new(data.window_start, data.window_end);

        let mut tx = self.repository.pool.begin().await?;

        // Row locks on the units serialize concurrent creations that touch
        // the same inventory; the availability check below reads under the
        // same transaction.
        let units = self.repository.devices.lock_units(&mut tx, &data.unit_ids).await?;
        if units.len() != unique.len() {
            return Err(AppError::NotFound(
                "one or more device units not found".to_string(),
            ));
        }

        let device_id = units[0].device_id;
        if units.iter().any(|u| u.device_id != device_id) {
            return Err(AppError::Validation(
                "all requested units must belong to the same device".to_string(),
            ));
        }

        let device = self.repository.devices.get_by_id_tx(&mut tx, device_id).await?;
        if LifecycleStatus::from(device.lifecycle) != LifecycleStatus::Active {
            return Err(AppError::Validation(format!(
                "Device {} is retired",
                device_id
            )));
        }
        if data.window_end - data.window_start > Duration::days(device.max_borrow_days as i64) {
            return Err(AppError::Validation(format!(
                "window exceeds the device's maximum of {} borrow days",
                device.max_borrow_days
            )));
        }

        for unit in &units {
            if LifecycleStatus::from(unit.lifecycle) != LifecycleStatus::Active
                || UnitStatus::from(unit.status) != UnitStatus::Ready
            {
                return Err(AppError::Conflict(format!(
                    "Device unit {} is not available",
                    unit.id
                )));
            }
        }

        let conflicts = self
            .repository
            .availability
            .conflicting(&mut tx, &data.unit_ids, window)
            .await?;
        if let Some(record) = conflicts.first() {
            return Err(AppError::Conflict(format!(
                "Device unit {} is already reserved for an overlapping window",
                record.unit_id
            )));
        }
        // Pending tickets have no availability record yet; their requested
        // windows still block a second claim on the same unit.
        if let Some(unit_id) = self
            .repository
            .tickets
            .overlapping_request(&mut tx, &data.unit_ids, data.window_start, data.window_end)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Device unit {} is already requested for an overlapping window",
                unit_id
            )));
        }

        let steps = self
            .repository
            .flows
            .active_steps_for_device(&mut tx, device_id)
            .await?
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "Device {} has no active approval flow",
                    device_id
                ))
            })?;
        let specs = flows::materialize(&steps)?;

        let ticket = self
            .repository
            .tickets
            .insert_ticket(&mut tx, requester_id, data)
            .await?;
        for unit in &units {
            self.repository
                .tickets
                .insert_ticket_unit(&mut tx, ticket.id, unit.id)
                .await?;
        }
        for spec in &specs {
            self.repository.tickets.insert_stage(&mut tx, ticket.id, spec).await?;
        }
        self.repository
            .audit
            .ticket_entry(
                &mut tx,
                ticket.id,
                None,
                "CREATED",
                actor.id,
                None,
                Some(i16::from(TicketStatus::Pending)),
                data.purpose.as_deref(),
            )
            .await?;

        tx.commit().await?;

        self.events.publish(EngineEvent::TicketCreated {
            ticket_id: ticket.id,
            requester_id,
            routing: spec_routing(&specs[0]),
        });

        self.get_ticket(ticket.id).await
    }

    /// Approve or reject the ticket's current stage
    pub async fn act_on_stage(
        &self,
        actor: &Actor,
        ticket_id: i32,
        step_no: i16,
        data: &ActOnStage,
    ) -> AppResult<TicketDetails> {
        if actor.id.is_none() {
            return Err(AppError::Forbidden(
                "stage decisions require an identified approver".to_string(),
            ));
        }

        let mut tx = self.repository.pool.begin().await?;

        let ticket = self.repository.tickets.get_by_id_for_update(&mut tx, ticket_id).await?;
        let status = TicketStatus::from(ticket.status);
        if status != TicketStatus::Pending {
            return Err(AppError::State(format!(
                "Ticket {} is {} and cannot be acted on",
                ticket_id, status
            )));
        }
        if step_no != ticket.current_stage {
            return Err(AppError::State(format!(
                "Stage {} cannot be acted on; ticket {} is at stage {}",
                step_no, ticket_id, ticket.current_stage
            )));
        }

        let stage = self.repository.tickets.get_stage(&mut tx, ticket_id, step_no).await?;
        if StageStatus::from(stage.status) != StageStatus::Pending {
            return Err(AppError::State(format!(
                "Stage {} of ticket {} has already been decided",
                step_no, ticket_id
            )));
        }
        stage_eligibility(actor, &stage)?;

        let total_stages = self.repository.tickets.stage_count(&mut tx, ticket_id).await?;
        let note = data.note.as_deref();

        match data.decision {
            StageDecision::Reject => {
                let marked = self
                    .repository
                    .tickets
                    .mark_stage(&mut tx, ticket_id, step_no, StageStatus::Rejected, actor.id, note)
                    .await?;
                let rejected = self
                    .repository
                    .tickets
                    .reject(&mut tx, ticket_id, step_no, note)
                    .await?;
                if !marked || !rejected {
                    return Err(AppError::Conflict(format!(
                        "Stage {} of ticket {} was decided concurrently",
                        step_no, ticket_id
                    )));
                }
                self.repository
                    .audit
                    .ticket_entry(
                        &mut tx,
                        ticket_id,
                        Some(step_no),
                        "STAGE_REJECTED",
                        actor.id,
                        Some(i16::from(StageStatus::Pending)),
                        Some(i16::from(StageStatus::Rejected)),
                        note,
                    )
                    .await?;
                self.repository
                    .audit
                    .ticket_entry(
                        &mut tx,
                        ticket_id,
                        None,
                        "REJECTED",
                        actor.id,
                        Some(i16::from(TicketStatus::Pending)),
                        Some(i16::from(TicketStatus::Rejected)),
                        note,
                    )
                    .await?;

                tx.commit().await?;

                self.events.publish(EngineEvent::TicketRejected {
                    ticket_id,
                    reason: data.note.clone(),
                });
            }
            StageDecision::Approve if step_no < total_stages => {
                let marked = self
                    .repository
                    .tickets
                    .mark_stage(&mut tx, ticket_id, step_no, StageStatus::Approved, actor.id, note)
                    .await?;
                let advanced = self
                    .repository
                    .tickets
                    .advance_stage(&mut tx, ticket_id, step_no)
                    .await?;
                if !marked || !advanced {
                    return Err(AppError::Conflict(format!(
                        "Stage {} of ticket {} was decided concurrently",
                        step_no, ticket_id
                    )));
                }
                self.repository
                    .audit
                    .ticket_entry(
                        &mut tx,
                        ticket_id,
                        Some(step_no),
                        "STAGE_APPROVED",
                        actor.id,
                        Some(i16::from(StageStatus::Pending)),
                        Some(i16::from(StageStatus::Approved)),
                        note,
                    )
                    .await?;
                let next = self
                    .repository
                    .tickets
                    .get_stage(&mut tx, ticket_id, step_no + 1)
                    .await?;

                tx.commit().await?;

                self.events.publish(EngineEvent::StageApproved {
                    ticket_id,
                    step_no,
                    routing: stage_routing(&next),
                });
            }
            StageDecision::Approve => {
                // Final stage: the ticket becomes APPROVED and every
                // requested unit gets an active reservation for the window.
                let marked = self
                    .repository
                    .tickets
                    .mark_stage(&mut tx, ticket_id, step_no, StageStatus::Approved, actor.id, note)
                    .await?;
                let approved = self
                    .repository
                    .tickets
                    .approve(&mut tx, ticket_id, step_no)
                    .await?;
                if !marked || !approved {
                    return Err(AppError::Conflict(format!(
                        "Stage {} of ticket {} was decided concurrently",
                        step_no, ticket_id
                    )));
                }

                let unit_ids = self.repository.tickets.unit_ids_tx(&mut tx, ticket_id).await?;
                let window = BorrowWindow::new(ticket.window_start, ticket.window_end);
                self.repository
                    .availability
                    .reserve(&mut tx, ticket_id, &unit_ids, window)
                    .await?;

                self.repository
                    .audit
                    .ticket_entry(
                        &mut tx,
                        ticket_id,
                        Some(step_no),
                        "STAGE_APPROVED",
                        actor.id,
                        Some(i16::from(StageStatus::Pending)),
                        Some(i16::from(StageStatus::Approved)),
                        note,
                    )
                    .await?;
                self.repository
                    .audit
                    .ticket_entry(
                        &mut tx,
                        ticket_id,
                        None,
                        "APPROVED",
                        actor.id,
                        Some(i16::from(TicketStatus::Pending)),
                        Some(i16::from(TicketStatus::Approved)),
                        None,
                    )
                    .await?;

                tx.commit().await?;

                self.events.publish(EngineEvent::TicketApproved { ticket_id });
            }
        }

        self.get_ticket(ticket_id).await
    }

    /// APPROVED -> IN_USE once the window has started. Both pickup
    /// confirmation and the scheduler call this; whichever commits first
    /// wins and the loser sees `Ok(false)`, not an error.
    pub async fn transition_to_in_use(&self, actor: &Actor, ticket_id: i32) -> AppResult<bool> {
        let mut tx = self.repository.pool.begin().await?;

        let ticket = self.repository.tickets.get_by_id_for_update(&mut tx, ticket_id).await?;
        match TicketStatus::from(ticket.status) {
            TicketStatus::InUse => return Ok(false),
            TicketStatus::Approved => {}
            status => {
                return Err(AppError::State(format!(
                    "Ticket {} is {} and cannot be picked up",
                    ticket_id, status
                )));
            }
        }

        let now = Utc::now();
        if now < ticket.window_start {
            return Err(AppError::State(format!(
                "Ticket {} borrow window has not started",
                ticket_id
            )));
        }

        let transitioned = self.repository.tickets.begin_use(&mut tx, ticket_id, now).await?;
        if !transitioned {
            return Ok(false);
        }

        let unit_ids = self.repository.tickets.unit_ids_tx(&mut tx, ticket_id).await?;
        for unit_id in &unit_ids {
            let updated = self
                .repository
                .devices
                .set_unit_status(&mut tx, *unit_id, UnitStatus::Ready, UnitStatus::Borrowed)
                .await?;
            if !updated {
                return Err(AppError::Conflict(format!(
                    "Device unit {} is no longer ready for pickup",
                    unit_id
                )));
            }
            self.repository
                .audit
                .unit_entry(
                    &mut tx,
                    *unit_id,
                    Some(ticket_id),
                    "BORROWED",
                    actor.id,
                    Some(i16::from(UnitStatus::Ready)),
                    Some(i16::from(UnitStatus::Borrowed)),
                    None,
                )
                .await?;
        }
        self.repository
            .audit
            .ticket_entry(
                &mut tx,
                ticket_id,
                None,
                "IN_USE",
                actor.id,
                Some(i16::from(TicketStatus::Approved)),
                Some(i16::from(TicketStatus::InUse)),
                None,
            )
            .await?;

        tx.commit().await?;

        self.events.publish(EngineEvent::TicketInUse { ticket_id });
        Ok(true)
    }

    /// IN_USE or OVERDUE -> COMPLETED: units return to READY (or DAMAGED /
    /// LOST as reported), reservations end.
    pub async fn complete_ticket(
        &self,
        actor: &Actor,
        ticket_id: i32,
        data: &CompleteTicket,
    ) -> AppResult<TicketDetails> {
        let mut tx = self.repository.pool.begin().await?;

        let ticket = self.repository.tickets.get_by_id_for_update(&mut tx, ticket_id).await?;
        let old_status = TicketStatus::from(ticket.status);
        if !matches!(old_status, TicketStatus::InUse | TicketStatus::Overdue) {
            return Err(AppError::State(format!(
                "Ticket {} is {} and cannot be returned",
                ticket_id, old_status
            )));
        }

        let unit_ids = self.repository.tickets.unit_ids_tx(&mut tx, ticket_id).await?;
        for returned in &data.returned {
            if !unit_ids.contains(&returned.unit_id) {
                return Err(AppError::Validation(format!(
                    "Device unit {} is not part of ticket {}",
                    returned.unit_id, ticket_id
                )));
            }
        }

        let now = Utc::now();
        let completed = self.repository.tickets.complete(&mut tx, ticket_id, now).await?;
        if !completed {
            return Err(AppError::Conflict(format!(
                "Ticket {} was returned concurrently",
                ticket_id
            )));
        }

        for unit_id in &unit_ids {
            let condition = data
                .returned
                .iter()
                .find(|r| r.unit_id == *unit_id)
                .map(|r| UnitStatus::from(r.condition))
                .unwrap_or(UnitStatus::Ready);
            let updated = self
                .repository
                .devices
                .set_unit_status(&mut tx, *unit_id, UnitStatus::Borrowed, condition)
                .await?;
            if !updated {
                return Err(AppError::Conflict(format!(
                    "Device unit {} is not recorded as borrowed",
                    unit_id
                )));
            }
            self.repository
                .audit
                .unit_entry(
                    &mut tx,
                    *unit_id,
                    Some(ticket_id),
                    "RETURNED",
                    actor.id,
                    Some(i16::from(UnitStatus::Borrowed)),
                    Some(i16::from(condition)),
                    None,
                )
                .await?;
        }

        self.repository.availability.release(&mut tx, ticket_id).await?;
        self.repository
            .audit
            .ticket_entry(
                &mut tx,
                ticket_id,
                None,
                "COMPLETED",
                actor.id,
                Some(i16::from(old_status)),
                Some(i16::from(TicketStatus::Completed)),
                None,
            )
            .await?;

        tx.commit().await?;

        self.events.publish(EngineEvent::TicketCompleted { ticket_id });
        self.get_ticket(ticket_id).await
    }

    /// IN_USE -> OVERDUE once the window has ended. Informational: units
    /// stay BORROWED and return is not blocked.
    pub async fn mark_overdue(&self, actor: &Actor, ticket_id: i32) -> AppResult<bool> {
        let mut tx = self.repository.pool.begin().await?;

        let ticket = self.repository.tickets.get_by_id_for_update(&mut tx, ticket_id).await?;
        match TicketStatus::from(ticket.status) {
            TicketStatus::Overdue => return Ok(false),
            TicketStatus::InUse => {}
            status => {
                return Err(AppError::State(format!(
                    "Ticket {} is {} and cannot be marked overdue",
                    ticket_id, status
                )));
            }
        }
        if Utc::now() <= ticket.window_end {
            return Err(AppError::State(format!(
                "Ticket {} is not past its borrow window",
                ticket_id
            )));
        }

        let marked = self.repository.tickets.mark_overdue(&mut tx, ticket_id).await?;
        if !marked {
            return Ok(false);
        }
        self.repository
            .audit
            .ticket_entry(
                &mut tx,
                ticket_id,
                None,
                "OVERDUE",
                actor.id,
                Some(i16::from(TicketStatus::InUse)),
                Some(i16::from(TicketStatus::Overdue)),
                None,
            )
            .await?;

        tx.commit().await?;

        self.events.publish(EngineEvent::TicketOverdue { ticket_id });
        Ok(true)
    }
}

/// The actor must hold the stage's role, and belong to the stage's
/// department and section where those are constrained
fn stage_eligibility(actor: &Actor, stage: &TicketStage) -> AppResult<()> {
    if i16::from(actor.role) != stage.role {
        return Err(AppError::Forbidden(format!(
            "Stage {} requires role {}",
            stage.step_no,
            Role::from(stage.role)
        )));
    }
    if let Some(department_id) = stage.department_id {
        if actor.department_id != Some(department_id) {
            return Err(AppError::Forbidden(format!(
                "Stage {} requires department {}",
                stage.step_no, department_id
            )));
        }
    }
    if let Some(section_id) = stage.section_id {
        if actor.section_id != Some(section_id) {
            return Err(AppError::Forbidden(format!(
                "Stage {} requires section {}",
                stage.step_no, section_id
            )));
        }
    }
    Ok(())
}

fn stage_routing(stage: &TicketStage) -> StageRouting {
    StageRouting {
        step_no: stage.step_no,
        role: Role::from(stage.role),
        department_id: stage.department_id,
        section_id: stage.section_id,
    }
}

fn spec_routing(spec: &StageSpec) -> StageRouting {
    StageRouting {
        step_no: spec.step_no,
        role: spec.role,
        department_id: spec.department_id,
        section_id: spec.section_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(role: Role, department_id: Option<i32>, section_id: Option<i32>) -> TicketStage {
        TicketStage {
            id: 1,
            ticket_id: 1,
            step_no: 1,
            role: i16::from(role),
            department_id,
            section_id,
            status: i16::from(StageStatus::Pending),
            acted_by: None,
            acted_at: None,
            note: None,
        }
    }

    fn approver(role: Role, department_id: Option<i32>, section_id: Option<i32>) -> Actor {
        Actor {
            id: Some(10),
            role,
            department_id,
            section_id,
        }
    }

    #[test]
    fn matching_role_and_department_is_eligible() {
        let actor = approver(Role::Hod, Some(1), Some(2));
        assert!(stage_eligibility(&actor, &stage(Role::Hod, Some(1), None)).is_ok());
    }

    #[test]
    fn wrong_role_is_forbidden() {
        let actor = approver(Role::Staff, Some(1), None);
        let err = stage_eligibility(&actor, &stage(Role::Hod, Some(1), None)).expect_err("must fail");
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn wrong_department_is_forbidden() {
        let actor = approver(Role::Hod, Some(2), None);
        let err = stage_eligibility(&actor, &stage(Role::Hod, Some(1), None)).expect_err("must fail");
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn missing_department_on_actor_is_forbidden_when_constrained() {
        let actor = approver(Role::Hod, None, None);
        let err = stage_eligibility(&actor, &stage(Role::Hod, Some(1), None)).expect_err("must fail");
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn unconstrained_department_accepts_any_actor_department() {
        let actor = approver(Role::Staff, Some(9), None);
        assert!(stage_eligibility(&actor, &stage(Role::Staff, None, None)).is_ok());
    }

    #[test]
    fn section_constraint_is_enforced() {
        let actor = approver(Role::Staff, Some(1), Some(3));
        assert!(stage_eligibility(&actor, &stage(Role::Staff, Some(1), Some(3))).is_ok());
        let err = stage_eligibility(&actor, &stage(Role::Staff, Some(1), Some(4)))
            .expect_err("must fail");
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
