//! Compensation revisions and their approval workflow.
//!
//! A revision is computed against the employee's current snapshot (its
//! baseline). Approval appends a new snapshot one version past the
//! baseline; if another revision was approved in between, the baseline is
//! stale and approval fails.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::calculation::{resolve, round_currency};
use crate::config::CompensationDefaults;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Assignee, ChangeSummary, CompensationSnapshot, NewRevision, PromotionDetails, Revision,
    RevisionStatus, RevisionType, SnapshotSource, StructureOverrides,
};
use crate::store::TenantData;

const ENTITY: &str = "revision";

fn transition_error(revision: &Revision, action: &'static str) -> EngineError {
    EngineError::StatusTransition {
        entity: ENTITY,
        id: revision.id,
        from: revision.status.to_string(),
        action,
    }
}

/// Computes the CTC delta between two annual figures.
pub fn change_summary(previous_ctc: Decimal, new_ctc: Decimal) -> ChangeSummary {
    let absolute_change = new_ctc - previous_ctc;
    let percentage_change = if previous_ctc.is_zero() {
        Decimal::ZERO
    } else {
        round_currency(absolute_change / previous_ctc * Decimal::ONE_HUNDRED)
    };
    ChangeSummary {
        previous_ctc,
        new_ctc,
        absolute_change,
        percentage_change,
    }
}

/// Drafts a revision against the employee's current snapshot.
///
/// The new breakdown is resolved from the proposed template, or from the
/// proposed CTC with the baseline template's overrides. When both are
/// given the proposed CTC is resolved with the template's overrides.
///
/// # Errors
///
/// - `NotFound` for an unknown employee or template
/// - `NoBaseline` if the employee has no snapshot yet
/// - `Validation` if neither template nor CTC is given, `effective_from`
///   is not after the baseline's, or a promotion has no details
/// - Any resolution error for the new structure
pub fn create_revision(
    data: &mut TenantData,
    new: NewRevision,
    defaults: &CompensationDefaults,
) -> EngineResult<Revision> {
    let employee = data.employee(new.employee_id)?;
    let baseline = data
        .current_snapshot(Assignee::Employee(new.employee_id))
        .ok_or(EngineError::NoBaseline {
            employee_id: new.employee_id,
        })?;

    if new.effective_from <= baseline.effective_from {
        return Err(EngineError::validation(
            "effective_from",
            format!(
                "must be after the current compensation's effective date {}",
                baseline.effective_from
            ),
        ));
    }
    if new.created_by.trim().is_empty() {
        return Err(EngineError::validation("created_by", "must not be empty"));
    }

    let promotion = match (new.revision_type, new.promotion) {
        (RevisionType::Promotion, Some(details)) if !details.is_empty() => {
            Some(PromotionDetails {
                previous_designation: employee.designation.clone(),
                previous_department: employee.department.clone(),
                previous_grade: employee.grade.clone(),
                ..details
            })
        }
        (RevisionType::Promotion, _) => {
            return Err(EngineError::validation(
                "promotion",
                "a promotion needs a new designation, department or grade",
            ));
        }
        (_, Some(_)) => {
            return Err(EngineError::validation(
                "promotion",
                "promotion details are only accepted on PROMOTION revisions",
            ));
        }
        (_, None) => None,
    };

    let (template_id, annual_ctc, overrides) = match (new.template_id, new.annual_ctc) {
        (Some(id), ctc) => {
            let template = data.template(id)?;
            (
                Some(id),
                ctc.unwrap_or(template.annual_ctc),
                template.overrides.clone(),
            )
        }
        (None, Some(ctc)) => {
            let overrides = match baseline.template_id {
                Some(id) => data.template(id)?.overrides.clone(),
                None => StructureOverrides::default(),
            };
            (baseline.template_id, ctc, overrides)
        }
        (None, None) => {
            return Err(EngineError::validation(
                "template_id",
                "either a template or a new annual CTC is required",
            ));
        }
    };

    let new_breakdown = resolve(annual_ctc, &overrides, defaults)?;
    let revision = Revision {
        id: Uuid::new_v4(),
        employee_id: new.employee_id,
        revision_type: new.revision_type,
        status: RevisionStatus::Draft,
        effective_from: new.effective_from,
        template_id,
        reason: new.reason,
        baseline_version: baseline.version,
        baseline_snapshot_id: baseline.id,
        old_breakdown: baseline.breakdown.clone(),
        change: change_summary(baseline.annual_ctc, new_breakdown.annual_ctc),
        new_breakdown,
        promotion,
        created_by: new.created_by,
        created_at: Utc::now(),
        submitted_at: None,
        decided_by: None,
        decided_at: None,
        rejection_reason: None,
        resulting_snapshot_id: None,
    };

    data.revisions.insert(revision.id, revision.clone());
    Ok(revision)
}

/// Moves a draft to `PENDING_APPROVAL`.
pub fn submit_revision(data: &mut TenantData, revision_id: Uuid) -> EngineResult<Revision> {
    let revision = data.revision(revision_id)?;
    if revision.status != RevisionStatus::Draft {
        return Err(transition_error(revision, "submit"));
    }
    let revision = data
        .revisions
        .get_mut(&revision_id)
        .ok_or_else(|| EngineError::not_found("Revision", revision_id))?;
    revision.status = RevisionStatus::PendingApproval;
    revision.submitted_at = Some(Utc::now());
    Ok(revision.clone())
}

/// Approves a draft or pending revision and mints its snapshot.
///
/// Submission is optional: a `DRAFT` revision may be approved directly,
/// skipping `PENDING_APPROVAL`.
///
/// The employee's current snapshot version must still equal the
/// revision's baseline version. On success the new snapshot is appended,
/// the employee's current pointer moves, promotion details are applied and
/// the template is locked, all in the same unit of work.
///
/// # Errors
///
/// - `StatusTransition` unless the revision is `DRAFT` or
///   `PENDING_APPROVAL`
/// - `StaleRevision` if another revision was approved since drafting
pub fn approve_revision(
    data: &mut TenantData,
    revision_id: Uuid,
    approved_by: &str,
) -> EngineResult<(Revision, CompensationSnapshot)> {
    let revision = data.revision(revision_id)?;
    if !revision.status.is_open() {
        return Err(transition_error(revision, "approve"));
    }
    let assignee = Assignee::Employee(revision.employee_id);
    let current_version = data.current_snapshot(assignee).map_or(0, |s| s.version);
    if current_version != revision.baseline_version {
        return Err(EngineError::StaleRevision {
            revision_id,
            baseline_version: revision.baseline_version,
            current_version,
        });
    }
    data.employee(revision.employee_id)?;

    let now = Utc::now();
    let snapshot = CompensationSnapshot {
        id: Uuid::new_v4(),
        assignee,
        version: current_version + 1,
        effective_from: revision.effective_from,
        annual_ctc: revision.new_breakdown.annual_ctc,
        breakdown: revision.new_breakdown.clone(),
        template_id: revision.template_id,
        source: SnapshotSource::Revision(revision_id),
        locked: true,
        locked_at: now,
    };
    let promotion = revision.promotion.clone();
    let template_id = revision.template_id;
    let employee_id = revision.employee_id;

    data.append_snapshot(snapshot.clone())?;
    if let Some(employee) = data.employees.get_mut(&employee_id) {
        employee.current_snapshot_id = Some(snapshot.id);
        if let Some(details) = promotion {
            if details.designation.is_some() {
                employee.designation = details.designation;
            }
            if details.department.is_some() {
                employee.department = details.department;
            }
            if details.grade.is_some() {
                employee.grade = details.grade;
            }
        }
    }
    if let Some(template) = template_id.and_then(|id| data.templates.get_mut(&id)) {
        template.locked = true;
    }
    let revision = data
        .revisions
        .get_mut(&revision_id)
        .ok_or_else(|| EngineError::not_found("Revision", revision_id))?;
    revision.status = RevisionStatus::Approved;
    revision.decided_by = Some(approved_by.to_string());
    revision.decided_at = Some(now);
    revision.resulting_snapshot_id = Some(snapshot.id);

    info!(
        revision_id = %revision_id,
        employee_id = %employee_id,
        version = snapshot.version,
        annual_ctc = %snapshot.annual_ctc,
        "Revision approved"
    );
    Ok((revision.clone(), snapshot))
}

/// Rejects a draft or pending revision. No snapshot is minted.
pub fn reject_revision(
    data: &mut TenantData,
    revision_id: Uuid,
    rejected_by: &str,
    reason: &str,
) -> EngineResult<Revision> {
    let revision = data.revision(revision_id)?;
    if !revision.status.is_open() {
        return Err(transition_error(revision, "reject"));
    }
    if reason.trim().is_empty() {
        return Err(EngineError::validation("reason", "must not be empty"));
    }
    let revision = data
        .revisions
        .get_mut(&revision_id)
        .ok_or_else(|| EngineError::not_found("Revision", revision_id))?;
    revision.status = RevisionStatus::Rejected;
    revision.decided_by = Some(rejected_by.to_string());
    revision.decided_at = Some(Utc::now());
    revision.rejection_reason = Some(reason.trim().to_string());
    Ok(revision.clone())
}

/// Deletes a draft. Anything past `DRAFT` is part of the audit history.
pub fn delete_revision(data: &mut TenantData, revision_id: Uuid) -> EngineResult<()> {
    let revision = data.revision(revision_id)?;
    if revision.status != RevisionStatus::Draft {
        return Err(transition_error(revision, "delete"));
    }
    data.revisions.remove(&revision_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{assign_compensation, create_template};
    use crate::models::{Employee, NewTemplate};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        data: TenantData,
        employee_id: Uuid,
        template_id: Uuid,
    }

    fn create_test_fixture() -> Fixture {
        let mut data = TenantData::default();
        let mut employee = Employee::new("EMP-1", "Asha Rao", date(2025, 4, 1));
        employee.designation = Some("Engineer".to_string());
        employee.grade = Some("L2".to_string());
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
        assign_compensation(
            &mut data,
            Assignee::Employee(employee_id),
            template.id,
            date(2025, 4, 1),
        )
        .unwrap();

        Fixture {
            data,
            employee_id,
            template_id: template.id,
        }
    }

    fn increment(employee_id: Uuid, ctc: Decimal, effective_from: NaiveDate) -> NewRevision {
        NewRevision {
            employee_id,
            revision_type: RevisionType::Increment,
            template_id: None,
            annual_ctc: Some(ctc),
            effective_from,
            reason: Some("Annual appraisal".to_string()),
            promotion: None,
            created_by: "hr.manager".to_string(),
        }
    }

    #[test]
    fn test_create_revision_computes_change_summary() {
        let mut f = create_test_fixture();
        let revision = create_revision(
            &mut f.data,
            increment(f.employee_id, dec!(660000), date(2026, 4, 1)),
            &CompensationDefaults::default(),
        )
        .unwrap();

        assert_eq!(revision.status, RevisionStatus::Draft);
        assert_eq!(revision.baseline_version, 1);
        assert_eq!(revision.template_id, Some(f.template_id));
        assert_eq!(revision.change.previous_ctc, dec!(600000));
        assert_eq!(revision.change.absolute_change, dec!(60000));
        assert_eq!(revision.change.percentage_change, dec!(10));
        assert_eq!(revision.old_breakdown.annual_ctc, dec!(600000));
        assert_eq!(revision.new_breakdown.annual_ctc, dec!(660000));
    }

    #[test]
    fn test_revision_without_baseline_fails() {
        let mut f = create_test_fixture();
        let newcomer = Employee::new("EMP-2", "Ravi", date(2025, 9, 1));
        let id = newcomer.id;
        f.data.employees.insert(id, newcomer);

        let result = create_revision(
            &mut f.data,
            increment(id, dec!(500000), date(2026, 1, 1)),
            &CompensationDefaults::default(),
        );
        assert!(matches!(result, Err(EngineError::NoBaseline { .. })));
    }

    #[test]
    fn test_effective_date_must_follow_baseline() {
        let mut f = create_test_fixture();
        let result = create_revision(
            &mut f.data,
            increment(f.employee_id, dec!(660000), date(2025, 4, 1)),
            &CompensationDefaults::default(),
        );
        assert!(matches!(result, Err(EngineError::Validation { .. })));
    }

    #[test]
    fn test_promotion_requires_details() {
        let mut f = create_test_fixture();
        let new = NewRevision {
            revision_type: RevisionType::Promotion,
            ..increment(f.employee_id, dec!(700000), date(2026, 4, 1))
        };
        match create_revision(&mut f.data, new, &CompensationDefaults::default()) {
            Err(EngineError::Validation { field, .. }) => assert_eq!(field, "promotion"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_approve_mints_next_version_and_applies_promotion() {
        let mut f = create_test_fixture();
        let new = NewRevision {
            revision_type: RevisionType::Promotion,
            promotion: Some(PromotionDetails {
                designation: Some("Senior Engineer".to_string()),
                grade: Some("L3".to_string()),
                ..PromotionDetails::default()
            }),
            ..increment(f.employee_id, dec!(800000), date(2026, 4, 1))
        };
        let draft = create_revision(&mut f.data, new, &CompensationDefaults::default()).unwrap();
        assert_eq!(
            draft.promotion.as_ref().unwrap().previous_designation.as_deref(),
            Some("Engineer")
        );
        submit_revision(&mut f.data, draft.id).unwrap();

        let (approved, snapshot) = approve_revision(&mut f.data, draft.id, "cfo").unwrap();

        assert_eq!(approved.status, RevisionStatus::Approved);
        assert_eq!(approved.resulting_snapshot_id, Some(snapshot.id));
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.source, SnapshotSource::Revision(draft.id));
        assert_eq!(snapshot.annual_ctc, dec!(800000));

        let employee = &f.data.employees[&f.employee_id];
        assert_eq!(employee.current_snapshot_id, Some(snapshot.id));
        assert_eq!(employee.designation.as_deref(), Some("Senior Engineer"));
        assert_eq!(employee.grade.as_deref(), Some("L3"));
        assert!(employee.department.is_none());
    }

    #[test]
    fn test_approve_directly_from_draft() {
        let mut f = create_test_fixture();
        let draft = create_revision(
            &mut f.data,
            increment(f.employee_id, dec!(650000), date(2026, 1, 1)),
            &CompensationDefaults::default(),
        )
        .unwrap();
        assert!(approve_revision(&mut f.data, draft.id, "cfo").is_ok());
    }

    #[test]
    fn test_stale_revision_is_rejected_on_approval() {
        let mut f = create_test_fixture();
        let defaults = CompensationDefaults::default();
        let first = create_revision(
            &mut f.data,
            increment(f.employee_id, dec!(650000), date(2026, 1, 1)),
            &defaults,
        )
        .unwrap();
        let second = create_revision(
            &mut f.data,
            increment(f.employee_id, dec!(700000), date(2026, 4, 1)),
            &defaults,
        )
        .unwrap();

        approve_revision(&mut f.data, first.id, "cfo").unwrap();
        match approve_revision(&mut f.data, second.id, "cfo") {
            Err(EngineError::StaleRevision {
                baseline_version,
                current_version,
                ..
            }) => {
                assert_eq!(baseline_version, 1);
                assert_eq!(current_version, 2);
            }
            other => panic!("Expected StaleRevision, got {:?}", other),
        }
        assert_eq!(
            f.data.snapshots_for(Assignee::Employee(f.employee_id)).len(),
            2
        );
        assert_eq!(f.data.revisions[&second.id].status, RevisionStatus::Draft);
    }

    #[test]
    fn test_workflow_transitions() {
        let mut f = create_test_fixture();
        let draft = create_revision(
            &mut f.data,
            increment(f.employee_id, dec!(650000), date(2026, 1, 1)),
            &CompensationDefaults::default(),
        )
        .unwrap();

        submit_revision(&mut f.data, draft.id).unwrap();
        assert!(matches!(
            submit_revision(&mut f.data, draft.id),
            Err(EngineError::StatusTransition { .. })
        ));
        assert!(matches!(
            delete_revision(&mut f.data, draft.id),
            Err(EngineError::StatusTransition { .. })
        ));
        assert!(reject_revision(&mut f.data, draft.id, "cfo", "  ").is_err());

        let rejected = reject_revision(&mut f.data, draft.id, "cfo", "Budget freeze").unwrap();
        assert_eq!(rejected.status, RevisionStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Budget freeze"));

        match approve_revision(&mut f.data, draft.id, "cfo") {
            Err(EngineError::StatusTransition { from, action, .. }) => {
                assert_eq!(from, "REJECTED");
                assert_eq!(action, "approve");
            }
            other => panic!("Expected StatusTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_draft() {
        let mut f = create_test_fixture();
        let draft = create_revision(
            &mut f.data,
            increment(f.employee_id, dec!(650000), date(2026, 1, 1)),
            &CompensationDefaults::default(),
        )
        .unwrap();
        delete_revision(&mut f.data, draft.id).unwrap();
        assert!(f.data.revisions.is_empty());
    }

    #[test]
    fn test_change_summary_percentage_is_rounded() {
        let change = change_summary(dec!(600000), dec!(625000));
        assert_eq!(change.absolute_change, dec!(25000));
        assert_eq!(change.percentage_change, dec!(4.17));
    }
}
