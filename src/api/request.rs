//! Request types for the Payroll Engine API.
//!
//! Bodies that map one-to-one onto engine inputs (`NewTemplate`,
//! `NewRevision`, `PreviewInput`) are accepted as-is; the types here cover
//! the remaining endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Assignee, AttendanceRecord, Employee, EmployeeStatus, StructureOverrides, TemplateChanges,
};

/// Request body for `POST /employees`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterEmployeeRequest {
    /// The HR platform's id; generated when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// The tenant's employee code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// First day of employment.
    pub joining_date: NaiveDate,
    /// Employment status; active when absent.
    #[serde(default)]
    pub status: Option<EmployeeStatus>,
    /// Current designation.
    #[serde(default)]
    pub designation: Option<String>,
    /// Current department.
    #[serde(default)]
    pub department: Option<String>,
    /// Current grade.
    #[serde(default)]
    pub grade: Option<String>,
}

impl From<RegisterEmployeeRequest> for Employee {
    fn from(req: RegisterEmployeeRequest) -> Self {
        let mut employee = Employee::new(req.code, req.name, req.joining_date);
        if let Some(id) = req.id {
            employee.id = id;
        }
        if let Some(status) = req.status {
            employee.status = status;
        }
        employee.designation = req.designation;
        employee.department = req.department;
        employee.grade = req.grade;
        employee
    }
}

/// Request body for `PATCH /templates/:id`.
///
/// The description may change on a locked template; anything else is a
/// structural change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateTemplateRequest {
    /// New description.
    pub description: Option<String>,
    /// New name.
    pub name: Option<String>,
    /// New annual CTC.
    pub annual_ctc: Option<Decimal>,
    /// New structure overrides.
    pub overrides: Option<StructureOverrides>,
}

impl UpdateTemplateRequest {
    /// The structural part of the update.
    pub fn changes(&self) -> TemplateChanges {
        TemplateChanges {
            name: self.name.clone(),
            annual_ctc: self.annual_ctc,
            overrides: self.overrides.clone(),
        }
    }
}

/// Request body for `POST /assignments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRequest {
    /// The employee or applicant.
    pub assignee: Assignee,
    /// The template to freeze.
    pub template_id: Uuid,
    /// First day the compensation applies.
    pub effective_from: NaiveDate,
}

/// Request body for approval and payment endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRequest {
    /// Who is performing the action.
    pub actor: String,
}

/// Request body for `POST /revisions/:id/reject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRevisionRequest {
    /// Who is rejecting.
    pub rejected_by: String,
    /// Why.
    pub reason: String,
}

/// Request body for `POST /attendance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRequest {
    /// Daily marks to store.
    pub records: Vec<AttendanceRecord>,
}

/// Request body for `POST /payroll-runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateRunRequest {
    /// Month, 1-12.
    pub month: u32,
    /// Year.
    pub year: i32,
    /// Who is starting the run.
    pub initiated_by: String,
}
