//! Read-only history views derived from snapshots and revisions.

use std::cmp::Reverse;

use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{Assignee, TimelineEntry, TimelineEventKind};
use crate::store::TenantData;

/// An employee's compensation history, most recent effective date first.
///
/// The joining entry comes from the first snapshot; every revision appears
/// regardless of status.
pub fn get_timeline(data: &TenantData, employee_id: Uuid) -> EngineResult<Vec<TimelineEntry>> {
    data.employee(employee_id)?;

    let mut entries = Vec::new();
    if let Some(first) = data.snapshots_for(Assignee::Employee(employee_id)).first() {
        entries.push(TimelineEntry {
            kind: TimelineEventKind::Joining,
            reference_id: first.id,
            effective_from: first.effective_from,
            annual_ctc: first.annual_ctc,
            previous_ctc: None,
            percentage_change: None,
            reason: None,
        });
    }

    let mut revisions: Vec<_> = data
        .revisions
        .values()
        .filter(|r| r.employee_id == employee_id)
        .collect();
    revisions.sort_by_key(|r| r.created_at);
    entries.extend(revisions.into_iter().map(|r| TimelineEntry {
        kind: TimelineEventKind::Revision {
            revision_type: r.revision_type,
            status: r.status,
        },
        reference_id: r.id,
        effective_from: r.effective_from,
        annual_ctc: r.change.new_ctc,
        previous_ctc: Some(r.change.previous_ctc),
        percentage_change: Some(r.change.percentage_change),
        reason: r.reason.clone(),
    }));

    entries.sort_by_key(|e| Reverse(e.effective_from));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompensationDefaults;
    use crate::ledger::{approve_revision, assign_compensation, create_revision, create_template};
    use crate::models::{
        Employee, NewRevision, NewTemplate, RevisionStatus, RevisionType, StructureOverrides,
    };
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_timeline_orders_by_effective_date_descending() {
        let mut data = TenantData::default();
        let defaults = CompensationDefaults::default();
        let employee = Employee::new("EMP-1", "Asha Rao", date(2024, 4, 1));
        let employee_id = employee.id;
        data.employees.insert(employee_id, employee);
        let template = create_template(
            &mut data,
            NewTemplate {
                name: "Analyst".to_string(),
                description: None,
                annual_ctc: dec!(500000),
                overrides: StructureOverrides::default(),
            },
            &defaults,
        )
        .unwrap();
        assign_compensation(
            &mut data,
            Assignee::Employee(employee_id),
            template.id,
            date(2024, 4, 1),
        )
        .unwrap();

        let revise = |ctc, effective_from| NewRevision {
            employee_id,
            revision_type: RevisionType::Increment,
            template_id: None,
            annual_ctc: Some(ctc),
            effective_from,
            reason: None,
            promotion: None,
            created_by: "hr".to_string(),
        };
        let first = create_revision(&mut data, revise(dec!(550000), date(2025, 4, 1)), &defaults)
            .unwrap();
        approve_revision(&mut data, first.id, "cfo").unwrap();
        create_revision(&mut data, revise(dec!(600000), date(2026, 4, 1)), &defaults).unwrap();

        let timeline = get_timeline(&data, employee_id).unwrap();

        let dates: Vec<NaiveDate> = timeline.iter().map(|e| e.effective_from).collect();
        assert_eq!(dates, vec![date(2026, 4, 1), date(2025, 4, 1), date(2024, 4, 1)]);
        assert_eq!(timeline[2].kind, TimelineEventKind::Joining);
        assert_eq!(
            timeline[0].kind,
            TimelineEventKind::Revision {
                revision_type: RevisionType::Increment,
                status: RevisionStatus::Draft,
            }
        );
        assert_eq!(timeline[1].previous_ctc, Some(dec!(500000)));
        assert_eq!(timeline[1].percentage_change, Some(dec!(10)));
    }

    #[test]
    fn test_timeline_for_unknown_employee_fails() {
        let data = TenantData::default();
        assert!(get_timeline(&data, Uuid::new_v4()).is_err());
    }
}
