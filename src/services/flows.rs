//! Approval flow resolver
//!
//! Translates a device's stored approval flow into the ordered stage list
//! materialized on new tickets. Resolution is a pure read; the copy onto
//! the ticket happens in the ticket state machine, so later flow edits can
//! never retroactively alter an in-flight ticket.

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::Role,
        flow::{ApprovalFlowStep, CreateFlowStep, StageSpec},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct FlowsService {
    repository: Repository,
}

impl FlowsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Resolve a device's approval path into ordered stage specifications
    pub async fn resolve_flow(&self, device_id: i32) -> AppResult<Vec<StageSpec>> {
        let flow = self
            .repository
            .flows
            .active_flow_for_device(device_id)
            .await?
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "Device {} has no active approval flow",
                    device_id
                ))
            })?;
        let steps = self.repository.flows.steps_for_flow(flow.id).await?;
        materialize(&steps)
    }
}

/// Build stage specs from stored flow steps, validating the configuration
pub fn materialize(steps: &[ApprovalFlowStep]) -> AppResult<Vec<StageSpec>> {
    let specs = steps
        .iter()
        .map(|s| to_spec(s.step_no, s.role, s.department_id, s.section_id))
        .collect::<AppResult<Vec<_>>>()?;
    validate_contiguous(&specs)?;
    Ok(specs)
}

/// Build stage specs from a create-device request, same validation rules
pub fn materialize_request(steps: &[CreateFlowStep]) -> AppResult<Vec<StageSpec>> {
    let specs = steps
        .iter()
        .map(|s| to_spec(s.step_no, s.role, s.department_id, s.section_id))
        .collect::<AppResult<Vec<_>>>()?;
    validate_contiguous(&specs)?;
    Ok(specs)
}

fn to_spec(
    step_no: i16,
    role: i16,
    department_id: Option<i32>,
    section_id: Option<i32>,
) -> AppResult<StageSpec> {
    let role = Role::from_code(role)
        .ok_or_else(|| AppError::Configuration(format!("Unknown approver role code {}", role)))?;
    Ok(StageSpec {
        step_no,
        role,
        department_id,
        section_id,
    })
}

/// Steps must be numbered 1..N, strictly increasing, no gaps
fn validate_contiguous(specs: &[StageSpec]) -> AppResult<()> {
    if specs.is_empty() {
        return Err(AppError::Configuration(
            "Approval flow has no steps".to_string(),
        ));
    }
    for (i, spec) in specs.iter().enumerate() {
        let expected = (i + 1) as i16;
        if spec.step_no != expected {
            return Err(AppError::Configuration(format!(
                "Approval flow steps are not contiguous: expected step {}, found {}",
                expected, spec.step_no
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(step_no: i16, role: i16) -> CreateFlowStep {
        CreateFlowStep {
            step_no,
            role,
            department_id: Some(1),
            section_id: None,
        }
    }

    #[test]
    fn valid_flow_materializes_in_order() {
        let specs = materialize_request(&[step(1, 1), step(2, 2)]).expect("valid flow");
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].step_no, 1);
        assert_eq!(specs[0].role, Role::Hod);
        assert_eq!(specs[1].role, Role::Staff);
    }

    #[test]
    fn empty_flow_is_a_configuration_error() {
        let err = materialize_request(&[]).expect_err("must fail");
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn gapped_steps_are_a_configuration_error() {
        let err = materialize_request(&[step(1, 1), step(3, 2)]).expect_err("must fail");
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn steps_not_starting_at_one_are_a_configuration_error() {
        let err = materialize_request(&[step(2, 1), step(3, 2)]).expect_err("must fail");
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn duplicate_step_numbers_are_a_configuration_error() {
        let err = materialize_request(&[step(1, 1), step(1, 2)]).expect_err("must fail");
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn unknown_role_code_is_a_configuration_error() {
        let err = materialize_request(&[step(1, 99)]).expect_err("must fail");
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
