//! First assignment of compensation.

use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{Assignee, CompensationSnapshot, SnapshotSource};
use crate::store::TenantData;

/// Freezes a template's breakdown as an assignee's first snapshot.
///
/// The snapshot is locked at version 1, the employee's current snapshot
/// pointer moves to it and the template becomes locked.
///
/// # Errors
///
/// - `NotFound` if the template, or the employee for an employee assignee,
///   does not exist
/// - `Validation` if the assignee already has a snapshot; later changes
///   go through revisions
pub fn assign_compensation(
    data: &mut TenantData,
    assignee: Assignee,
    template_id: Uuid,
    effective_from: NaiveDate,
) -> EngineResult<CompensationSnapshot> {
    let template = data.template(template_id)?;
    if let Assignee::Employee(employee_id) = assignee {
        data.employee(employee_id)?;
    }
    if data.current_snapshot(assignee).is_some() {
        return Err(EngineError::validation(
            "assignee",
            format!(
                "{} already has compensation assigned; create a revision instead",
                assignee
            ),
        ));
    }

    let snapshot = CompensationSnapshot {
        id: Uuid::new_v4(),
        assignee,
        version: 1,
        effective_from,
        annual_ctc: template.annual_ctc,
        breakdown: template.breakdown.clone(),
        template_id: Some(template_id),
        source: SnapshotSource::Assignment,
        locked: true,
        locked_at: Utc::now(),
    };

    data.append_snapshot(snapshot.clone())?;
    if let Some(template) = data.templates.get_mut(&template_id) {
        template.locked = true;
    }
    if let Assignee::Employee(employee_id) = assignee {
        if let Some(employee) = data.employees.get_mut(&employee_id) {
            employee.current_snapshot_id = Some(snapshot.id);
        }
    }

    info!(
        assignee = %assignee,
        snapshot_id = %snapshot.id,
        template_id = %template_id,
        annual_ctc = %snapshot.annual_ctc,
        "Compensation assigned"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompensationDefaults;
    use crate::ledger::create_template;
    use crate::models::{Employee, NewTemplate, StructureOverrides};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (TenantData, Uuid, Uuid) {
        let mut data = TenantData::default();
        let employee = Employee::new("EMP-1", "Asha Rao", date(2025, 4, 1));
        let employee_id = employee.id;
        data.employees.insert(employee_id, employee);
        let template = create_template(
            &mut data,
            NewTemplate {
                name: "Engineer L2".to_string(),
                description: None,
                annual_ctc: dec!(600000),
                overrides: StructureOverrides::default(),
            },
            &CompensationDefaults::default(),
        )
        .unwrap();
        (data, employee_id, template.id)
    }

    #[test]
    fn test_first_assignment_creates_locked_version_one() {
        let (mut data, employee_id, template_id) = setup();
        let snapshot = assign_compensation(
            &mut data,
            Assignee::Employee(employee_id),
            template_id,
            date(2025, 4, 1),
        )
        .unwrap();

        assert_eq!(snapshot.version, 1);
        assert!(snapshot.locked);
        assert_eq!(snapshot.source, SnapshotSource::Assignment);
        assert_eq!(snapshot.annual_ctc, dec!(600000));
        assert_eq!(
            data.employees[&employee_id].current_snapshot_id,
            Some(snapshot.id)
        );
        assert!(data.templates[&template_id].locked);
    }

    #[test]
    fn test_second_assignment_is_rejected() {
        let (mut data, employee_id, template_id) = setup();
        let assignee = Assignee::Employee(employee_id);
        assign_compensation(&mut data, assignee, template_id, date(2025, 4, 1)).unwrap();

        let result = assign_compensation(&mut data, assignee, template_id, date(2025, 5, 1));
        assert!(matches!(result, Err(EngineError::Validation { .. })));
        assert_eq!(data.snapshots_for(assignee).len(), 1);
    }

    #[test]
    fn test_applicant_assignment_needs_no_employee() {
        let (mut data, _, template_id) = setup();
        let applicant = Assignee::Applicant(Uuid::new_v4());
        let snapshot =
            assign_compensation(&mut data, applicant, template_id, date(2025, 6, 1)).unwrap();
        assert_eq!(snapshot.assignee, applicant);
    }

    #[test]
    fn test_unknown_employee_is_not_found() {
        let (mut data, _, template_id) = setup();
        let result = assign_compensation(
            &mut data,
            Assignee::Employee(Uuid::new_v4()),
            template_id,
            date(2025, 4, 1),
        );
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
        assert!(!data.templates[&template_id].locked);
    }
}
