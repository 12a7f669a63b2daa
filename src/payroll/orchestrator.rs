//! Payroll run lifecycle and batch calculation.
//!
//! A run moves `INITIATED → CALCULATED → APPROVED → PAID`, and may be
//! cancelled from any non-terminal status. Calculation computes each
//! employee's outcome independently and folds the outcomes into the run
//! aggregate; one employee's failure never affects another's payslip.

use std::collections::BTreeSet;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calculation::prorate;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Assignee, AttendanceSnapshot, CompensationSnapshot, ComponentLine, PayrollRun, PayslipItem,
    PayslipLine, PayslipStatus, Period, RunError, RunStatus, RunTotals, SkipReason,
    SkippedEmployee,
};
use crate::store::TenantData;

const ENTITY: &str = "payroll run";

fn transition_error(run: &PayrollRun, action: &'static str) -> EngineError {
    EngineError::StatusTransition {
        entity: ENTITY,
        id: run.id,
        from: run.status.to_string(),
        action,
    }
}

/// Starts the run for a period, or restarts the existing one in place.
///
/// An existing run in `INITIATED`, `CALCULATED` or `CANCELLED` keeps its
/// id, has its counters reset and its payslips discarded, and returns to
/// `INITIATED`.
///
/// # Errors
///
/// Returns `StatusTransition` if the period's run is `APPROVED` or `PAID`.
pub fn initiate_run(
    data: &mut TenantData,
    tenant_id: Uuid,
    period: Period,
    initiated_by: &str,
) -> EngineResult<PayrollRun> {
    if let Some(existing) = data.run_for_period(period) {
        if matches!(existing.status, RunStatus::Approved | RunStatus::Paid) {
            return Err(transition_error(existing, "initiate"));
        }
        let run_id = existing.id;
        data.payslips.remove(&run_id);
        let run = data
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| EngineError::not_found("Payroll run", run_id))?;
        run.restart(initiated_by);
        info!(run_id = %run_id, period = %period, "Payroll run restarted");
        return Ok(run.clone());
    }

    let run = PayrollRun::new(tenant_id, period, initiated_by);
    data.runs.insert(run.id, run.clone());
    info!(run_id = %run.id, period = %period, "Payroll run initiated");
    Ok(run)
}

/// What happened to one employee during calculation.
#[derive(Debug, Clone, PartialEq)]
pub enum EmployeeOutcome {
    /// A payslip with amounts.
    Processed {
        /// The payslip.
        payslip: PayslipItem,
        /// Its gross, deductions and net pay.
        amounts: RunTotals,
    },
    /// A payslip with no amounts.
    Failed {
        /// The payslip.
        payslip: PayslipItem,
        /// Why calculation failed.
        error: RunError,
    },
    /// Left out of the run.
    Skipped(SkippedEmployee),
}

/// Run counters and totals accumulated from outcomes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunAggregate {
    /// Monetary totals over processed payslips.
    pub totals: RunTotals,
    /// Employees considered.
    pub employee_count: u32,
    /// Processed payslips.
    pub processed_count: u32,
    /// Failed payslips.
    pub failed_count: u32,
    /// Skipped employees.
    pub skipped_count: u32,
    /// Failure details.
    pub errors: Vec<RunError>,
    /// Skip details.
    pub skipped: Vec<SkippedEmployee>,
    /// Every payslip, processed or failed.
    pub payslips: Vec<PayslipItem>,
}

impl RunAggregate {
    /// Adds one outcome.
    pub fn fold(mut self, outcome: EmployeeOutcome) -> Self {
        self.employee_count += 1;
        match outcome {
            EmployeeOutcome::Processed { payslip, amounts } => {
                self.processed_count += 1;
                self.totals.gross += amounts.gross;
                self.totals.deductions += amounts.deductions;
                self.totals.net += amounts.net;
                self.payslips.push(payslip);
            }
            EmployeeOutcome::Failed { payslip, error } => {
                self.failed_count += 1;
                self.errors.push(error);
                self.payslips.push(payslip);
            }
            EmployeeOutcome::Skipped(skip) => {
                self.skipped_count += 1;
                self.skipped.push(skip);
            }
        }
        self
    }
}

/// Generates payslips for every employee in scope.
///
/// In scope are all active employees plus any employee id holding a
/// frozen attendance snapshot for the period. Recalculating a
/// `CALCULATED` run discards its previous payslips.
///
/// # Errors
///
/// Returns `StatusTransition` unless the run is `INITIATED` or
/// `CALCULATED`. Per-employee problems never fail the run.
pub fn calculate_run(data: &mut TenantData, run_id: Uuid) -> EngineResult<PayrollRun> {
    let run = data.run(run_id)?;
    if !matches!(run.status, RunStatus::Initiated | RunStatus::Calculated) {
        return Err(transition_error(run, "calculate"));
    }
    let period = run.period;

    let mut employee_ids: BTreeSet<Uuid> = data
        .employees
        .values()
        .filter(|e| e.is_active())
        .map(|e| e.id)
        .collect();
    employee_ids.extend(
        data.attendance_snapshots
            .keys()
            .filter(|(_, p)| *p == period)
            .map(|(id, _)| *id),
    );

    let aggregate = employee_ids
        .into_iter()
        .map(|employee_id| employee_outcome(data, run_id, period, employee_id))
        .fold(RunAggregate::default(), RunAggregate::fold);

    let run = data
        .runs
        .get_mut(&run_id)
        .ok_or_else(|| EngineError::not_found("Payroll run", run_id))?;
    run.status = RunStatus::Calculated;
    run.calculated_at = Some(Utc::now());
    run.totals = aggregate.totals;
    run.employee_count = aggregate.employee_count;
    run.processed_count = aggregate.processed_count;
    run.failed_count = aggregate.failed_count;
    run.skipped_count = aggregate.skipped_count;
    run.errors = aggregate.errors;
    run.skipped = aggregate.skipped;
    let run = run.clone();
    data.payslips.insert(run_id, aggregate.payslips);

    info!(
        run_id = %run_id,
        period = %period,
        processed = run.processed_count,
        failed = run.failed_count,
        skipped = run.skipped_count,
        net = %run.totals.net,
        "Payroll run calculated"
    );
    Ok(run)
}

/// Computes one employee's outcome without touching the store.
pub fn employee_outcome(
    data: &TenantData,
    run_id: Uuid,
    period: Period,
    employee_id: Uuid,
) -> EmployeeOutcome {
    let skip = |reason| {
        debug!(run_id = %run_id, employee_id = %employee_id, reason = ?reason, "Employee skipped");
        EmployeeOutcome::Skipped(SkippedEmployee {
            employee_id,
            reason,
        })
    };

    if !data.employees.contains_key(&employee_id) {
        return skip(SkipReason::EmployeeNotFound);
    }
    let Some(snapshot) =
        data.effective_snapshot(Assignee::Employee(employee_id), period.end_date())
    else {
        return skip(SkipReason::SalaryTemplateMissing);
    };
    let Some(attendance) = data.attendance_snapshots.get(&(employee_id, period)) else {
        return skip(SkipReason::AttendanceNotFrozen);
    };
    if !attendance.summary.has_payable_attendance() {
        return skip(SkipReason::NoPayableAttendance);
    }

    match build_payslip(run_id, employee_id, snapshot, attendance) {
        Ok((payslip, amounts)) => EmployeeOutcome::Processed { payslip, amounts },
        Err(err) => {
            warn!(
                run_id = %run_id,
                employee_id = %employee_id,
                error = %err,
                "Payslip calculation failed"
            );
            let message = err.to_string();
            let payslip = PayslipItem {
                id: Uuid::new_v4(),
                run_id,
                employee_id,
                status: PayslipStatus::Failed,
                attendance: Some(attendance.summary.clone()),
                earnings: Vec::new(),
                deductions: Vec::new(),
                gross_earnings: None,
                total_deductions: None,
                net_pay: None,
                failure_reason: Some(message.clone()),
                compensation_snapshot_id: Some(snapshot.id),
                attendance_snapshot_id: Some(attendance.id),
            };
            EmployeeOutcome::Failed {
                payslip,
                error: RunError {
                    employee_id,
                    message,
                },
            }
        }
    }
}

fn payslip_lines(
    lines: &[ComponentLine],
    payable_days: Decimal,
    total_days: u32,
) -> EngineResult<Vec<PayslipLine>> {
    lines
        .iter()
        .map(|line| {
            let full_amount = line.amount.monthly;
            let amount = if line.prorated {
                prorate(full_amount, payable_days, total_days)?
            } else {
                full_amount
            };
            Ok(PayslipLine {
                code: line.code.clone(),
                name: line.name.clone(),
                full_amount,
                amount,
                prorated: line.prorated,
            })
        })
        .collect()
}

fn build_payslip(
    run_id: Uuid,
    employee_id: Uuid,
    snapshot: &CompensationSnapshot,
    attendance: &AttendanceSnapshot,
) -> EngineResult<(PayslipItem, RunTotals)> {
    let summary = &attendance.summary;
    let breakdown = &snapshot.breakdown;

    let earnings = payslip_lines(&breakdown.earnings, summary.payable_days, summary.total_days)?;
    let deductions = payslip_lines(
        &breakdown.employee_deductions,
        summary.payable_days,
        summary.total_days,
    )?;

    let gross: Decimal = earnings.iter().map(|l| l.amount).sum();
    let total_deductions: Decimal = deductions.iter().map(|l| l.amount).sum();
    let net = gross - total_deductions;
    if net < Decimal::ZERO {
        return Err(EngineError::InvalidResult {
            code: "NET_PAY".to_string(),
            reason: format!(
                "deductions {} exceed gross earnings {}",
                total_deductions, gross
            ),
        });
    }

    let payslip = PayslipItem {
        id: Uuid::new_v4(),
        run_id,
        employee_id,
        status: PayslipStatus::Processed,
        attendance: Some(summary.clone()),
        earnings,
        deductions,
        gross_earnings: Some(gross),
        total_deductions: Some(total_deductions),
        net_pay: Some(net),
        failure_reason: None,
        compensation_snapshot_id: Some(snapshot.id),
        attendance_snapshot_id: Some(attendance.id),
    };
    let amounts = RunTotals {
        gross,
        deductions: total_deductions,
        net,
    };
    Ok((payslip, amounts))
}

/// Approves a calculated run.
pub fn approve_run(
    data: &mut TenantData,
    run_id: Uuid,
    approved_by: &str,
) -> EngineResult<PayrollRun> {
    let run = data.run(run_id)?;
    if run.status != RunStatus::Calculated {
        return Err(transition_error(run, "approve"));
    }
    let run = data
        .runs
        .get_mut(&run_id)
        .ok_or_else(|| EngineError::not_found("Payroll run", run_id))?;
    run.status = RunStatus::Approved;
    run.approved_by = Some(approved_by.to_string());
    run.approved_at = Some(Utc::now());
    info!(run_id = %run_id, approved_by = %approved_by, "Payroll run approved");
    Ok(run.clone())
}

/// Marks an approved run as paid.
pub fn mark_run_paid(data: &mut TenantData, run_id: Uuid, paid_by: &str) -> EngineResult<PayrollRun> {
    let run = data.run(run_id)?;
    if run.status != RunStatus::Approved {
        return Err(transition_error(run, "pay"));
    }
    let run = data
        .runs
        .get_mut(&run_id)
        .ok_or_else(|| EngineError::not_found("Payroll run", run_id))?;
    run.status = RunStatus::Paid;
    run.paid_by = Some(paid_by.to_string());
    run.paid_at = Some(Utc::now());
    info!(run_id = %run_id, paid_by = %paid_by, "Payroll run paid");
    Ok(run.clone())
}

/// Cancels a run that is not yet paid and deletes its payslips.
pub fn cancel_run(data: &mut TenantData, run_id: Uuid) -> EngineResult<PayrollRun> {
    let run = data.run(run_id)?;
    if run.status.is_terminal() {
        return Err(transition_error(run, "cancel"));
    }
    data.payslips.remove(&run_id);
    let run = data
        .runs
        .get_mut(&run_id)
        .ok_or_else(|| EngineError::not_found("Payroll run", run_id))?;
    run.status = RunStatus::Cancelled;
    run.cancelled_at = Some(Utc::now());
    info!(run_id = %run_id, "Payroll run cancelled");
    Ok(run.clone())
}

/// The payslips of a run, processed and failed.
pub fn payslips(data: &TenantData, run_id: Uuid) -> EngineResult<Vec<PayslipItem>> {
    data.run(run_id)?;
    Ok(data.payslips.get(&run_id).cloned().unwrap_or_default())
}
