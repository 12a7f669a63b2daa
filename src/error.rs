//! Error types for the Payroll Engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for every failure the engine can surface: input validation, formula
//! resolution, CTC balancing, state-machine misuse and ledger races.
//!
//! Skipped employees in a payroll run are not errors; see
//! [`SkipReason`](crate::models::SkipReason).

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for the Payroll Engine.
///
/// # Example
///
/// ```
/// use payroll_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/compensation.yaml".to_string(),
/// };
/// assert_eq!(
///     error.to_string(),
///     "Configuration file not found: /missing/compensation.yaml"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// Input had the wrong shape or was out of range.
    #[error("Invalid value for '{field}': {message}")]
    Validation {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// The balancing earning would have to be negative.
    #[error(
        "Annual CTC {annual_ctc} is insufficient: fixed earnings and employer benefits exceed it by {shortfall}"
    )]
    InsufficientCtc {
        /// The CTC that was being resolved.
        annual_ctc: Decimal,
        /// How much more annual CTC would be needed.
        shortfall: Decimal,
    },

    /// A formula depends on itself, directly or transitively.
    #[error("Circular reference between components: {}", path.join(" -> "))]
    CircularReference {
        /// The resolution path, ending with the revisited code.
        path: Vec<String>,
    },

    /// An identifier is neither a context value nor another formula.
    #[error("Unknown component '{name}' referenced by '{referenced_by}'")]
    UnknownComponent {
        /// The unresolved identifier.
        name: String,
        /// The component whose formula referenced it.
        referenced_by: String,
    },

    /// A formula evaluated to something that cannot be an amount.
    #[error("Formula for '{code}' produced an invalid result: {reason}")]
    InvalidResult {
        /// The component code.
        code: String,
        /// Why the result was rejected.
        reason: String,
    },

    /// A formula string could not be parsed.
    #[error("Formula for '{code}' is malformed: {message}")]
    FormulaSyntax {
        /// The component code.
        code: String,
        /// A description of the parse error.
        message: String,
    },

    /// A state-machine operation was attempted from the wrong status.
    #[error("Cannot {action} {entity} {id} while it is {from}")]
    StatusTransition {
        /// The kind of record ("payroll run", "revision").
        entity: &'static str,
        /// The record identifier.
        id: Uuid,
        /// The status the record is currently in.
        from: String,
        /// The attempted operation.
        action: &'static str,
    },

    /// A revision was requested for someone with no compensation yet.
    #[error("Employee {employee_id} has no current compensation snapshot to revise")]
    NoBaseline {
        /// The employee without a snapshot.
        employee_id: Uuid,
    },

    /// A newer snapshot was locked after the revision was drafted.
    #[error(
        "Revision {revision_id} was drafted against version {baseline_version} but the current version is {current_version}"
    )]
    StaleRevision {
        /// The revision being approved.
        revision_id: Uuid,
        /// The snapshot version the revision was computed against.
        baseline_version: u32,
        /// The employee's current snapshot version.
        current_version: u32,
    },

    /// A locked template was modified beyond its description.
    #[error("Template {template_id} is locked by an active assignment; only its description may change")]
    TemplateLocked {
        /// The locked template.
        template_id: Uuid,
    },

    /// Attendance for a period already consumed by a calculated run.
    #[error("Attendance for {period} is locked by payroll run {run_id}")]
    AttendanceLocked {
        /// The period in `YYYY-MM` form.
        period: String,
        /// The run that consumed the period.
        run_id: Uuid,
    },

    /// A referenced record does not exist for the tenant.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The data store could not complete the unit of work.
    #[error("Storage error: {message}")]
    Storage {
        /// A description of the storage failure.
        message: String,
    },
}

impl EngineError {
    /// Shorthand for a [`EngineError::Validation`] error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`EngineError::NotFound`] error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                "CONFIG_ERROR"
            }
            EngineError::Validation { .. } => "VALIDATION_ERROR",
            EngineError::InsufficientCtc { .. } => "INSUFFICIENT_CTC",
            EngineError::CircularReference { .. } => "CIRCULAR_REFERENCE",
            EngineError::UnknownComponent { .. } => "UNKNOWN_COMPONENT",
            EngineError::InvalidResult { .. } => "INVALID_RESULT",
            EngineError::FormulaSyntax { .. } => "FORMULA_SYNTAX",
            EngineError::StatusTransition { .. } => "STATUS_TRANSITION",
            EngineError::NoBaseline { .. } => "NO_BASELINE",
            EngineError::StaleRevision { .. } => "STALE_REVISION",
            EngineError::TemplateLocked { .. } => "TEMPLATE_LOCKED",
            EngineError::AttendanceLocked { .. } => "ATTENDANCE_LOCKED",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::Storage { .. } => "STORAGE_ERROR",
        }
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
