//! Raw attendance intake and per-period freezing.
//!
//! Raw records may be corrected freely until a payroll run consumes the
//! period. Freezing summarizes every relevant employee into an
//! [`AttendanceSnapshot`], the only attendance input a run reads.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::calculation::summarize;
use crate::config::AttendanceSettings;
use crate::error::EngineResult;
use crate::models::{AttendanceRecord, AttendanceSnapshot, Period};
use crate::store::TenantData;

/// Stores raw attendance, replacing any earlier record for the same
/// employee and date. Returns the number of records stored.
///
/// Records may reference employees the directory does not know yet; such
/// employees are skipped by payroll rather than rejected here.
///
/// # Errors
///
/// Returns `AttendanceLocked` if any record falls in a period already
/// consumed by a calculated, approved or paid run. Nothing is stored in
/// that case.
pub fn record_attendance(
    data: &mut TenantData,
    records: Vec<AttendanceRecord>,
) -> EngineResult<usize> {
    let periods: BTreeSet<Period> = records.iter().map(|r| Period::containing(r.date)).collect();
    for period in &periods {
        data.ensure_attendance_unlocked(*period)?;
    }

    let count = records.len();
    for record in records {
        data.attendance_records
            .entry(record.employee_id)
            .or_default()
            .insert(record.date, record);
    }
    Ok(count)
}

/// Summarizes and freezes attendance for a period.
///
/// Every active employee is frozen, plus any employee id holding raw
/// records in the period. Freezing again before a run consumes the period
/// replaces the earlier snapshots.
///
/// # Errors
///
/// Returns `AttendanceLocked` if a run has already consumed the period.
pub fn freeze_attendance(
    data: &mut TenantData,
    period: Period,
    settings: &AttendanceSettings,
) -> EngineResult<Vec<AttendanceSnapshot>> {
    data.ensure_attendance_unlocked(period)?;

    let start = period.start_date();
    let end = period.end_date();

    let mut employee_ids: BTreeSet<Uuid> = data
        .employees
        .values()
        .filter(|e| e.is_active())
        .map(|e| e.id)
        .collect();
    employee_ids.extend(
        data.attendance_records
            .iter()
            .filter(|(_, by_date)| by_date.range(start..=end).next().is_some())
            .map(|(id, _)| *id),
    );

    let frozen_at = Utc::now();
    let mut snapshots = Vec::with_capacity(employee_ids.len());
    for employee_id in employee_ids {
        let joining_date = data.employees.get(&employee_id).map(|e| e.joining_date);
        let records = data
            .attendance_records
            .get(&employee_id)
            .into_iter()
            .flat_map(|by_date| by_date.range(start..=end).map(|(_, r)| r));
        let summary = summarize(records, start, end, joining_date, settings)?;
        snapshots.push(AttendanceSnapshot {
            id: Uuid::new_v4(),
            employee_id,
            period,
            summary,
            frozen_at,
        });
    }

    for snapshot in &snapshots {
        data.attendance_snapshots
            .insert((snapshot.employee_id, period), snapshot.clone());
    }

    info!(
        period = %period,
        employees = snapshots.len(),
        "Attendance frozen"
    );
    Ok(snapshots)
}
