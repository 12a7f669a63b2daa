//! Payroll runs and the payslip items they produce.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AttendanceSummary, Period};

/// Payroll run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Created or restarted; no payslips yet.
    Initiated,
    /// Payslips generated.
    Calculated,
    /// Payslips approved for payment.
    Approved,
    /// Paid out. Terminal.
    Paid,
    /// Abandoned. Terminal.
    Cancelled,
}

impl RunStatus {
    /// Whether no further transition is possible (besides restart from
    /// `CANCELLED`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Paid | RunStatus::Cancelled)
    }

    /// Whether a run in this status has consumed its period's attendance.
    pub fn locks_attendance(&self) -> bool {
        matches!(
            self,
            RunStatus::Calculated | RunStatus::Approved | RunStatus::Paid
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Initiated => "INITIATED",
            RunStatus::Calculated => "CALCULATED",
            RunStatus::Approved => "APPROVED",
            RunStatus::Paid => "PAID",
            RunStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Why an employee was left out of a run without counting as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// No compensation snapshot is effective for the period.
    SalaryTemplateMissing,
    /// No present, holiday or paid-leave days.
    NoPayableAttendance,
    /// Attendance references an employee the directory doesn't know.
    EmployeeNotFound,
    /// Attendance for the period was never frozen.
    AttendanceNotFrozen,
}

/// A per-employee failure recorded on the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    /// The employee that failed.
    pub employee_id: Uuid,
    /// What went wrong.
    pub message: String,
}

/// A per-employee skip recorded on the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEmployee {
    /// The employee that was skipped.
    pub employee_id: Uuid,
    /// Why.
    pub reason: SkipReason,
}

/// Monetary totals of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunTotals {
    /// Sum of processed gross earnings.
    pub gross: Decimal,
    /// Sum of processed deductions.
    pub deductions: Decimal,
    /// Sum of processed net pay.
    pub net: Decimal,
}

/// A per-tenant, per-month payroll batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRun {
    /// Unique identifier; stable across restarts.
    pub id: Uuid,
    /// The owning tenant.
    pub tenant_id: Uuid,
    /// The month being paid.
    pub period: Period,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Who initiated (or last restarted) the run.
    pub initiated_by: String,
    /// When the run was initiated or last restarted.
    pub initiated_at: DateTime<Utc>,
    /// When payslips were last generated.
    pub calculated_at: Option<DateTime<Utc>>,
    /// Who approved the run.
    pub approved_by: Option<String>,
    /// When the run was approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Who marked the run paid.
    pub paid_by: Option<String>,
    /// When the run was marked paid.
    pub paid_at: Option<DateTime<Utc>>,
    /// When the run was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Monetary totals over processed employees.
    pub totals: RunTotals,
    /// Employees considered.
    pub employee_count: u32,
    /// Employees with a processed payslip.
    pub processed_count: u32,
    /// Employees whose processing failed.
    pub failed_count: u32,
    /// Employees skipped.
    pub skipped_count: u32,
    /// Failure details.
    pub errors: Vec<RunError>,
    /// Skip details.
    pub skipped: Vec<SkippedEmployee>,
}

impl PayrollRun {
    /// Creates a run in `INITIATED`.
    pub fn new(tenant_id: Uuid, period: Period, initiated_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            period,
            status: RunStatus::Initiated,
            initiated_by: initiated_by.into(),
            initiated_at: Utc::now(),
            calculated_at: None,
            approved_by: None,
            approved_at: None,
            paid_by: None,
            paid_at: None,
            cancelled_at: None,
            totals: RunTotals::default(),
            employee_count: 0,
            processed_count: 0,
            failed_count: 0,
            skipped_count: 0,
            errors: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Returns the run to `INITIATED` with every counter cleared, keeping
    /// its identity.
    pub fn restart(&mut self, initiated_by: impl Into<String>) {
        let id = self.id;
        *self = PayrollRun {
            id,
            ..PayrollRun::new(self.tenant_id, self.period, initiated_by)
        };
    }
}

/// Payslip item outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayslipStatus {
    /// Amounts computed.
    Processed,
    /// Processing raised an error; no amounts.
    Failed,
}

/// One prorated line on a payslip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipLine {
    /// Component code.
    pub code: String,
    /// Component name.
    pub name: String,
    /// Monthly amount from the snapshot.
    pub full_amount: Decimal,
    /// Amount payable for the period.
    pub amount: Decimal,
    /// Whether the amount was scaled by payable days.
    pub prorated: bool,
}

/// One employee's result within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipItem {
    /// Unique identifier.
    pub id: Uuid,
    /// The run.
    pub run_id: Uuid,
    /// The employee.
    pub employee_id: Uuid,
    /// Outcome.
    pub status: PayslipStatus,
    /// Attendance used, if it was found.
    pub attendance: Option<AttendanceSummary>,
    /// Earnings lines; empty for failures.
    pub earnings: Vec<PayslipLine>,
    /// Deduction lines; empty for failures.
    pub deductions: Vec<PayslipLine>,
    /// Gross earnings; `None` for failures.
    pub gross_earnings: Option<Decimal>,
    /// Total deductions; `None` for failures.
    pub total_deductions: Option<Decimal>,
    /// Net pay; `None` for failures.
    pub net_pay: Option<Decimal>,
    /// Why processing failed.
    pub failure_reason: Option<String>,
    /// The compensation snapshot used.
    pub compensation_snapshot_id: Option<Uuid>,
    /// The attendance snapshot used.
    pub attendance_snapshot_id: Option<Uuid>,
}
