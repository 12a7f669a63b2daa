//! Attendance summaries and payable-day proration.
//!
//! This module classifies raw daily attendance into an
//! [`AttendanceSummary`] and scales component amounts by the ratio of
//! payable days to total days.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::AttendanceSettings;
use crate::error::{EngineError, EngineResult};
use crate::models::{AttendanceRecord, AttendanceStatus, AttendanceSummary};

use super::round_currency;

/// Summarizes one employee's attendance over a period.
///
/// Only days from `max(period_start, joining_date)` through `period_end`
/// count. Records outside that window are ignored; when two records share
/// a date, the later one in `records` wins. Days without a record are
/// absent.
///
/// # Arguments
///
/// * `records` - The employee's raw attendance marks
/// * `period_start` - First day of the period
/// * `period_end` - Last day of the period
/// * `joining_date` - The employee's joining date, if known
/// * `settings` - Half-day weight and weekly-off treatment
///
/// # Errors
///
/// Returns `Validation` if `period_end` is before `period_start`.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::summarize;
/// use payroll_engine::config::AttendanceSettings;
/// use chrono::NaiveDate;
///
/// let start = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2026, 4, 30).unwrap();
/// let summary = summarize(std::iter::empty(), start, end, None, &AttendanceSettings::default()).unwrap();
///
/// assert_eq!(summary.total_days, 30);
/// assert_eq!(summary.absent_days, 30);
/// ```
pub fn summarize<'a>(
    records: impl IntoIterator<Item = &'a AttendanceRecord>,
    period_start: NaiveDate,
    period_end: NaiveDate,
    joining_date: Option<NaiveDate>,
    settings: &AttendanceSettings,
) -> EngineResult<AttendanceSummary> {
    if period_end < period_start {
        return Err(EngineError::validation(
            "period",
            format!("period end {} is before start {}", period_end, period_start),
        ));
    }

    let window_start = match joining_date {
        Some(joined) if joined > period_start => joined,
        _ => period_start,
    };

    let mut summary = AttendanceSummary::default();
    if window_start > period_end {
        return Ok(summary);
    }

    let mut by_date: BTreeMap<NaiveDate, &AttendanceRecord> = BTreeMap::new();
    for record in records {
        if record.date >= window_start && record.date <= period_end {
            by_date.insert(record.date, record);
        }
    }

    let half_day_lop = Decimal::ONE - settings.half_day_weight;
    for day in window_start.iter_days().take_while(|d| *d <= period_end) {
        summary.total_days += 1;

        let Some(record) = by_date.get(&day) else {
            summary.absent_days += 1;
            summary.lop_days += Decimal::ONE;
            continue;
        };

        if record.late {
            summary.late_count += 1;
        }
        match record.status {
            AttendanceStatus::Present => summary.present_days += Decimal::ONE,
            AttendanceStatus::HalfDay => {
                summary.half_days += 1;
                summary.present_days += settings.half_day_weight;
                summary.lop_days += half_day_lop;
            }
            AttendanceStatus::Absent => {
                summary.absent_days += 1;
                summary.lop_days += Decimal::ONE;
            }
            AttendanceStatus::PaidLeave => summary.paid_leave_days += 1,
            AttendanceStatus::UnpaidLeave => summary.lop_days += Decimal::ONE,
            AttendanceStatus::Holiday => summary.holidays += 1,
            AttendanceStatus::WeeklyOff => summary.weekly_offs += 1,
        }
    }

    let weekly_offs = if settings.weekly_offs_payable {
        Decimal::from(summary.weekly_offs)
    } else {
        Decimal::ZERO
    };
    summary.payable_days = summary.present_days
        + Decimal::from(summary.paid_leave_days)
        + Decimal::from(summary.holidays)
        + weekly_offs;

    Ok(summary)
}

/// Scales a monthly amount by `payable_days / total_days`, rounded.
///
/// # Errors
///
/// Returns `Validation` if `total_days` is zero or `payable_days` is
/// negative or exceeds `total_days`.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::prorate;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(prorate(dec!(20000), dec!(26), 30).unwrap(), dec!(17333.33));
/// ```
pub fn prorate(amount: Decimal, payable_days: Decimal, total_days: u32) -> EngineResult<Decimal> {
    if total_days == 0 {
        return Err(EngineError::validation(
            "total_days",
            "cannot prorate over a period with no days",
        ));
    }
    let total = Decimal::from(total_days);
    if payable_days < Decimal::ZERO || payable_days > total {
        return Err(EngineError::validation(
            "payable_days",
            format!("{} payable days outside 0..={}", payable_days, total_days),
        ));
    }
    if payable_days == total {
        return Ok(round_currency(amount));
    }
    Ok(round_currency(amount * payable_days / total))
}
