//! Monthly payroll: attendance freezing and run orchestration.

mod attendance;
mod orchestrator;

pub use attendance::{freeze_attendance, record_attendance};
pub use orchestrator::{
    EmployeeOutcome, RunAggregate, approve_run, calculate_run, cancel_run, employee_outcome,
    initiate_run, mark_run_paid, payslips,
};
