//! Attendance records and frozen per-period summaries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Period;

/// The classification of a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Worked the full day.
    Present,
    /// Worked half the day; the other half is loss of pay.
    HalfDay,
    /// Did not work and no leave was approved.
    Absent,
    /// Approved paid leave.
    PaidLeave,
    /// Approved unpaid leave.
    UnpaidLeave,
    /// Public or company holiday.
    Holiday,
    /// Scheduled weekly off.
    WeeklyOff,
}

/// One raw daily attendance mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// The employee.
    pub employee_id: Uuid,
    /// The day.
    pub date: NaiveDate,
    /// How the day is classified.
    pub status: AttendanceStatus,
    /// Whether the employee checked in late.
    #[serde(default)]
    pub late: bool,
}

/// Day counts for one employee over one period.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttendanceSummary {
    /// Days in the period from the employee's joining date onward.
    pub total_days: u32,
    /// Present days, half-days counted fractionally.
    pub present_days: Decimal,
    /// Absent days, including days with no record.
    pub absent_days: u32,
    /// Paid leave days.
    pub paid_leave_days: u32,
    /// Loss-of-pay days: absences, unpaid leave and unworked half-days.
    pub lop_days: Decimal,
    /// Holidays.
    pub holidays: u32,
    /// Weekly offs.
    pub weekly_offs: u32,
    /// Half-day marks.
    pub half_days: u32,
    /// Late check-ins.
    pub late_count: u32,
    /// Days paid for.
    pub payable_days: Decimal,
}

impl AttendanceSummary {
    /// Present days plus holidays plus paid leave.
    ///
    /// An employee with none of these is skipped by payroll.
    pub fn attended_or_paid_days(&self) -> Decimal {
        self.present_days + Decimal::from(self.holidays) + Decimal::from(self.paid_leave_days)
    }

    /// Whether the period has anything to pay.
    pub fn has_payable_attendance(&self) -> bool {
        self.attended_or_paid_days() > Decimal::ZERO && self.total_days > 0
    }
}

/// The frozen summary for one employee and one period.
///
/// This is the only attendance input a payroll run consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSnapshot {
    /// Unique identifier.
    pub id: Uuid,
    /// The employee.
    pub employee_id: Uuid,
    /// The period.
    pub period: Period,
    /// The day counts.
    pub summary: AttendanceSummary,
    /// When the summary was frozen.
    pub frozen_at: DateTime<Utc>,
}
