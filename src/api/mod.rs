//! HTTP API module for the Payroll Engine.
//!
//! This module exposes the engine's operations as tenant-scoped REST
//! endpoints under `/tenants/:tenant_id`.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{
    ActorRequest, AssignmentRequest, AttendanceRequest, InitiateRunRequest,
    RegisterEmployeeRequest, RejectRevisionRequest, UpdateTemplateRequest,
};
pub use response::{
    ApiError, ApiErrorResponse, AttendanceRecordedResponse, PreviewResponse,
    RevisionApprovalResponse,
};
pub use state::AppState;
