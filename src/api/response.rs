//! Response types for the Payroll Engine API.
//!
//! This module defines the error body every endpoint renders on failure and
//! the mapping from [`EngineError`] to HTTP status codes.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::calculation::LegacyRow;
use crate::error::EngineError;
use crate::models::{Breakdown, CompensationSnapshot, Revision};

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    /// Creates an invalid path parameter error response.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::with_details(
            "INVALID_PATH",
            message,
            "Path identifiers must be UUIDs and periods must be YYYY-MM",
        )
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A 400 response.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            Json(self.error),
        )
            .into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let status = match &error {
            EngineError::Validation { .. } => StatusCode::BAD_REQUEST,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::StatusTransition { .. }
            | EngineError::StaleRevision { .. }
            | EngineError::TemplateLocked { .. }
            | EngineError::AttendanceLocked { .. } => StatusCode::CONFLICT,
            EngineError::InsufficientCtc { .. }
            | EngineError::CircularReference { .. }
            | EngineError::UnknownComponent { .. }
            | EngineError::InvalidResult { .. }
            | EngineError::FormulaSyntax { .. }
            | EngineError::NoBaseline { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::ConfigNotFound { .. }
            | EngineError::ConfigParseError { .. }
            | EngineError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let details = match &error {
            EngineError::Validation { field, .. } => Some(format!("field: {}", field)),
            EngineError::InsufficientCtc { shortfall, .. } => {
                Some(format!("annual shortfall: {}", shortfall))
            }
            EngineError::CircularReference { path } => Some(path.join(" -> ")),
            EngineError::StaleRevision { .. } => {
                Some("Recreate the revision against the current snapshot".to_string())
            }
            EngineError::TemplateLocked { .. } => {
                Some("Only the description of a locked template may change".to_string())
            }
            _ => None,
        };

        let code = error.code();
        let message = error.to_string();
        ApiErrorResponse {
            status,
            error: ApiError {
                code: code.to_string(),
                message,
                details,
            },
        }
    }
}

/// Response body for `POST /compensation/preview`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// The resolved structure.
    pub breakdown: Breakdown,
    /// The same structure as legacy name/monthly/yearly rows.
    pub rows: Vec<LegacyRow>,
}

/// Response body for `POST /revisions/:id/approve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionApprovalResponse {
    /// The approved revision.
    pub revision: Revision,
    /// The snapshot the approval appended.
    pub snapshot: CompensationSnapshot,
}

/// Response body for `POST /attendance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecordedResponse {
    /// Number of records stored.
    pub recorded: usize,
}
