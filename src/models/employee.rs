//! Employee model and related types.
//!
//! Employees are owned by the HR platform; the engine reads them to decide
//! who is paid and writes only the current-snapshot pointer and, on an
//! approved promotion, the designation/department/grade.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Employment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    /// Currently employed; included in payroll runs.
    Active,
    /// Temporarily excluded from payroll.
    Inactive,
    /// Employment has ended.
    Terminated,
}

/// An employee of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: Uuid,
    /// The tenant's own employee code (e.g., "EMP-0042").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Employment status.
    pub status: EmployeeStatus,
    /// First day of employment.
    pub joining_date: NaiveDate,
    /// Current designation.
    #[serde(default)]
    pub designation: Option<String>,
    /// Current department.
    #[serde(default)]
    pub department: Option<String>,
    /// Current grade.
    #[serde(default)]
    pub grade: Option<String>,
    /// The snapshot currently in force, if compensation was assigned.
    #[serde(default)]
    pub current_snapshot_id: Option<Uuid>,
}

impl Employee {
    /// Creates an active employee with no compensation assigned yet.
    pub fn new(code: impl Into<String>, name: impl Into<String>, joining_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            status: EmployeeStatus::Active,
            joining_date,
            designation: None,
            department: None,
            grade: None,
            current_snapshot_id: None,
        }
    }

    /// Returns true if the employee is included in payroll runs.
    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }
}

/// Who a compensation snapshot belongs to.
///
/// Offers to applicants are frozen the same way as employee compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Assignee {
    /// An employee on the tenant's payroll.
    Employee(Uuid),
    /// A candidate who has not joined yet.
    Applicant(Uuid),
}

impl Assignee {
    /// The underlying identifier.
    pub fn id(&self) -> Uuid {
        match self {
            Assignee::Employee(id) | Assignee::Applicant(id) => *id,
        }
    }
}

impl fmt::Display for Assignee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignee::Employee(id) => write!(f, "employee {}", id),
            Assignee::Applicant(id) => write!(f, "applicant {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joining() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    #[test]
    fn test_new_employee_is_active_without_snapshot() {
        let employee = Employee::new("EMP-001", "Asha Rao", joining());
        assert!(employee.is_active());
        assert!(employee.current_snapshot_id.is_none());
    }

    #[test]
    fn test_terminated_employee_is_not_active() {
        let mut employee = Employee::new("EMP-001", "Asha Rao", joining());
        employee.status = EmployeeStatus::Terminated;
        assert!(!employee.is_active());
    }

    #[test]
    fn test_deserialize_employee_with_optional_fields_missing() {
        let json = r#"{
            "id": "6f1c1f4e-2b1a-4a53-9d0e-0a9b8f1c2d3e",
            "code": "EMP-007",
            "name": "Vikram Shah",
            "status": "active",
            "joining_date": "2025-01-15"
        }"#;

        let employee: Employee = serde_json::from_str(json).unwrap();
        assert_eq!(employee.code, "EMP-007");
        assert_eq!(employee.status, EmployeeStatus::Active);
        assert!(employee.designation.is_none());
    }

    #[test]
    fn test_assignee_serialization() {
        let id = Uuid::nil();
        let json = serde_json::to_string(&Assignee::Applicant(id)).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"applicant","id":"00000000-0000-0000-0000-000000000000"}"#
        );
        assert_eq!(Assignee::Employee(id).id(), id);
    }
}
