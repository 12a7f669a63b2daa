//! Core data models for the Payroll Engine.
//!
//! This module contains all the domain models used throughout the engine.

mod attendance;
mod breakdown;
mod employee;
mod payroll_run;
mod period;
mod revision;
mod snapshot;
mod template;

pub use attendance::{AttendanceRecord, AttendanceSnapshot, AttendanceStatus, AttendanceSummary};
pub use breakdown::{
    Amount, AuditStep, AuditTrace, AuditWarning, Breakdown, BreakdownTotals, CalculationKind,
    ComponentLine, codes,
};
pub use employee::{Assignee, Employee, EmployeeStatus};
pub use payroll_run::{
    PayrollRun, PayslipItem, PayslipLine, PayslipStatus, RunError, RunStatus, RunTotals,
    SkipReason, SkippedEmployee,
};
pub use period::Period;
pub use revision::{
    ChangeSummary, NewRevision, PromotionDetails, Revision, RevisionStatus, RevisionType,
    TimelineEntry, TimelineEventKind,
};
pub use snapshot::{CompensationSnapshot, SnapshotSource};
pub use template::{
    CompensationTemplate, EarningRule, NewTemplate, RuleKind, StructureOverrides, TemplateChanges,
};
