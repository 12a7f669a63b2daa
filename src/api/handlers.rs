//! HTTP request handlers for the Payroll Engine API.
//!
//! Every route is scoped to a tenant. Each request gets a correlation id
//! that is attached to the tracing span the engine call runs in.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::calculation::to_legacy_rows;
use crate::engine::PreviewInput;
use crate::error::EngineResult;
use crate::models::{Assignee, Employee, NewRevision, NewTemplate, Period};

use super::request::{
    ActorRequest, AssignmentRequest, AttendanceRequest, InitiateRunRequest, RegisterEmployeeRequest,
    RejectRevisionRequest, UpdateTemplateRequest,
};
use super::response::{
    ApiError, ApiErrorResponse, AttendanceRecordedResponse, PreviewResponse,
    RevisionApprovalResponse,
};
use super::state::AppState;

type HandlerResult = Result<Response, ApiErrorResponse>;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/tenants/:tenant_id/compensation/preview",
            post(preview_handler),
        )
        .route("/tenants/:tenant_id/templates", post(create_template_handler))
        .route(
            "/tenants/:tenant_id/templates/:template_id",
            get(get_template_handler).patch(update_template_handler),
        )
        .route("/tenants/:tenant_id/employees", post(register_employee_handler))
        .route(
            "/tenants/:tenant_id/employees/:employee_id/timeline",
            get(timeline_handler),
        )
        .route(
            "/tenants/:tenant_id/employees/:employee_id/snapshots",
            get(snapshot_history_handler),
        )
        .route("/tenants/:tenant_id/assignments", post(assignment_handler))
        .route("/tenants/:tenant_id/revisions", post(create_revision_handler))
        .route(
            "/tenants/:tenant_id/revisions/:revision_id",
            get(get_revision_handler).delete(delete_revision_handler),
        )
        .route(
            "/tenants/:tenant_id/revisions/:revision_id/submit",
            post(submit_revision_handler),
        )
        .route(
            "/tenants/:tenant_id/revisions/:revision_id/approve",
            post(approve_revision_handler),
        )
        .route(
            "/tenants/:tenant_id/revisions/:revision_id/reject",
            post(reject_revision_handler),
        )
        .route("/tenants/:tenant_id/attendance", post(record_attendance_handler))
        .route(
            "/tenants/:tenant_id/attendance/:period/freeze",
            post(freeze_attendance_handler),
        )
        .route("/tenants/:tenant_id/payroll-runs", post(initiate_run_handler))
        .route(
            "/tenants/:tenant_id/payroll-runs/:run_id",
            get(get_run_handler),
        )
        .route(
            "/tenants/:tenant_id/payroll-runs/:run_id/calculate",
            post(calculate_run_handler),
        )
        .route(
            "/tenants/:tenant_id/payroll-runs/:run_id/approve",
            post(approve_run_handler),
        )
        .route(
            "/tenants/:tenant_id/payroll-runs/:run_id/pay",
            post(pay_run_handler),
        )
        .route(
            "/tenants/:tenant_id/payroll-runs/:run_id/cancel",
            post(cancel_run_handler),
        )
        .route(
            "/tenants/:tenant_id/payroll-runs/:run_id/payslips",
            get(payslips_handler),
        )
        .with_state(state)
}

/// Unwraps a JSON body, rendering serde's message on rejection.
fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: Uuid,
) -> Result<T, ApiErrorResponse> {
    let rejection = match payload {
        Ok(Json(body)) => return Ok(body),
        Err(rejection) => rejection,
    };
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(
                correlation_id = %correlation_id,
                error = %body_text,
                "JSON data error"
            );
            if body_text.contains("missing field") {
                ApiError::new("VALIDATION_ERROR", body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(
                correlation_id = %correlation_id,
                error = %err,
                "JSON syntax error"
            );
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    Err(ApiErrorResponse::bad_request(error))
}

/// Unwraps path parameters.
fn path_params<T>(
    params: Result<Path<T>, PathRejection>,
    correlation_id: Uuid,
) -> Result<T, ApiErrorResponse> {
    params.map(|Path(p)| p).map_err(|rejection| {
        let message = rejection.body_text();
        warn!(
            correlation_id = %correlation_id,
            error = %message,
            "Invalid path parameters"
        );
        ApiErrorResponse::bad_request(ApiError::invalid_path(message))
    })
}

/// Runs one engine call inside the request's span.
fn traced<T>(
    correlation_id: Uuid,
    tenant_id: Uuid,
    operation: &'static str,
    call: impl FnOnce() -> EngineResult<T>,
) -> Result<T, ApiErrorResponse> {
    let span = info_span!(
        "request",
        correlation_id = %correlation_id,
        tenant_id = %tenant_id,
        operation
    );
    info!(parent: &span, "Processing request");

    let start_time = Instant::now();
    match span.in_scope(call) {
        Ok(value) => {
            info!(
                parent: &span,
                duration_us = start_time.elapsed().as_micros(),
                "Request completed"
            );
            Ok(value)
        }
        Err(err) => {
            warn!(parent: &span, code = err.code(), error = %err, "Request failed");
            Err(err.into())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(body),
    )
        .into_response()
}

/// Handler for `POST /compensation/preview`.
///
/// Resolves a structure without persisting it and returns it both as the
/// canonical breakdown and as legacy rows.
async fn preview_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PreviewInput>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let tenant_id = path_params(path, correlation_id)?;
    let input = json_body(payload, correlation_id)?;

    let breakdown = traced(correlation_id, tenant_id, "preview_compensation", || {
        state.engine().preview_compensation(tenant_id, input)
    })?;
    let rows = to_legacy_rows(&breakdown);
    Ok(json_response(StatusCode::OK, PreviewResponse { breakdown, rows }))
}

async fn create_template_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewTemplate>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let tenant_id = path_params(path, correlation_id)?;
    let new = json_body(payload, correlation_id)?;

    let template = traced(correlation_id, tenant_id, "create_template", || {
        state.engine().create_template(tenant_id, new)
    })?;
    Ok(json_response(StatusCode::CREATED, template))
}

async fn get_template_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, template_id) = path_params(path, correlation_id)?;

    let template = traced(correlation_id, tenant_id, "get_template", || {
        state.engine().get_template(tenant_id, template_id)
    })?;
    Ok(json_response(StatusCode::OK, template))
}

/// Handler for `PATCH /templates/:template_id`.
///
/// Structural changes are applied first; a description change is applied
/// only if they succeed.
async fn update_template_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<UpdateTemplateRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, template_id) = path_params(path, correlation_id)?;
    let update = json_body(payload, correlation_id)?;

    let template = traced(correlation_id, tenant_id, "update_template", || {
        let engine = state.engine();
        let changes = update.changes();
        let template = engine.update_template(tenant_id, template_id, changes)?;
        match update.description {
            Some(description) => {
                engine.update_template_description(tenant_id, template_id, Some(description))
            }
            None => Ok(template),
        }
    })?;
    Ok(json_response(StatusCode::OK, template))
}

async fn register_employee_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RegisterEmployeeRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let tenant_id = path_params(path, correlation_id)?;
    let employee: Employee = json_body(payload, correlation_id)?.into();

    let employee = traced(correlation_id, tenant_id, "register_employee", || {
        state.engine().register_employee(tenant_id, employee)
    })?;
    Ok(json_response(StatusCode::CREATED, employee))
}

async fn timeline_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, employee_id) = path_params(path, correlation_id)?;

    let timeline = traced(correlation_id, tenant_id, "get_timeline", || {
        state.engine().get_timeline(tenant_id, employee_id)
    })?;
    Ok(json_response(StatusCode::OK, timeline))
}

async fn snapshot_history_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, employee_id) = path_params(path, correlation_id)?;

    let snapshots = traced(correlation_id, tenant_id, "snapshot_history", || {
        state
            .engine()
            .snapshot_history(tenant_id, Assignee::Employee(employee_id))
    })?;
    Ok(json_response(StatusCode::OK, snapshots))
}

async fn assignment_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AssignmentRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let tenant_id = path_params(path, correlation_id)?;
    let req = json_body(payload, correlation_id)?;

    let snapshot = traced(correlation_id, tenant_id, "assign_compensation", || {
        state.engine().assign_compensation(
            tenant_id,
            req.assignee,
            req.template_id,
            req.effective_from,
        )
    })?;
    Ok(json_response(StatusCode::CREATED, snapshot))
}

async fn create_revision_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewRevision>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let tenant_id = path_params(path, correlation_id)?;
    let new = json_body(payload, correlation_id)?;

    let revision = traced(correlation_id, tenant_id, "create_revision", || {
        state.engine().create_revision(tenant_id, new)
    })?;
    Ok(json_response(StatusCode::CREATED, revision))
}

async fn get_revision_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, revision_id) = path_params(path, correlation_id)?;

    let revision = traced(correlation_id, tenant_id, "get_revision", || {
        state.engine().get_revision(tenant_id, revision_id)
    })?;
    Ok(json_response(StatusCode::OK, revision))
}

async fn submit_revision_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, revision_id) = path_params(path, correlation_id)?;

    let revision = traced(correlation_id, tenant_id, "submit_revision", || {
        state.engine().submit_revision(tenant_id, revision_id)
    })?;
    Ok(json_response(StatusCode::OK, revision))
}

async fn approve_revision_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<ActorRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, revision_id) = path_params(path, correlation_id)?;
    let req = json_body(payload, correlation_id)?;

    let (revision, snapshot) = traced(correlation_id, tenant_id, "approve_revision", || {
        state
            .engine()
            .approve_revision(tenant_id, revision_id, &req.actor)
    })?;
    Ok(json_response(
        StatusCode::OK,
        RevisionApprovalResponse { revision, snapshot },
    ))
}

async fn reject_revision_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<RejectRevisionRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, revision_id) = path_params(path, correlation_id)?;
    let req = json_body(payload, correlation_id)?;

    let revision = traced(correlation_id, tenant_id, "reject_revision", || {
        state
            .engine()
            .reject_revision(tenant_id, revision_id, &req.rejected_by, &req.reason)
    })?;
    Ok(json_response(StatusCode::OK, revision))
}

async fn delete_revision_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, revision_id) = path_params(path, correlation_id)?;

    traced(correlation_id, tenant_id, "delete_revision", || {
        state.engine().delete_revision(tenant_id, revision_id)
    })?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn record_attendance_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AttendanceRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let tenant_id = path_params(path, correlation_id)?;
    let req = json_body(payload, correlation_id)?;

    let recorded = traced(correlation_id, tenant_id, "record_attendance", || {
        state.engine().record_attendance(tenant_id, req.records)
    })?;
    Ok(json_response(
        StatusCode::OK,
        AttendanceRecordedResponse { recorded },
    ))
}

async fn freeze_attendance_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Period)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, period) = path_params(path, correlation_id)?;

    let snapshots = traced(correlation_id, tenant_id, "freeze_attendance", || {
        state.engine().freeze_attendance(tenant_id, period)
    })?;
    Ok(json_response(StatusCode::OK, snapshots))
}

/// Handler for `POST /payroll-runs`.
///
/// Returns the existing run when one is already open for the month.
async fn initiate_run_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<InitiateRunRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let tenant_id = path_params(path, correlation_id)?;
    let req = json_body(payload, correlation_id)?;

    let run = traced(correlation_id, tenant_id, "initiate_run", || {
        state
            .engine()
            .initiate_run(tenant_id, req.month, req.year, &req.initiated_by)
    })?;
    Ok(json_response(StatusCode::OK, run))
}

async fn get_run_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, run_id) = path_params(path, correlation_id)?;

    let run = traced(correlation_id, tenant_id, "get_run", || {
        state.engine().get_run(tenant_id, run_id)
    })?;
    Ok(json_response(StatusCode::OK, run))
}

async fn calculate_run_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, run_id) = path_params(path, correlation_id)?;

    let run = traced(correlation_id, tenant_id, "calculate_run", || {
        state.engine().calculate_run(tenant_id, run_id)
    })?;
    Ok(json_response(StatusCode::OK, run))
}

async fn approve_run_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<ActorRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, run_id) = path_params(path, correlation_id)?;
    let req = json_body(payload, correlation_id)?;

    let run = traced(correlation_id, tenant_id, "approve_run", || {
        state.engine().approve_run(tenant_id, run_id, &req.actor)
    })?;
    Ok(json_response(StatusCode::OK, run))
}

async fn pay_run_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<ActorRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, run_id) = path_params(path, correlation_id)?;
    let req = json_body(payload, correlation_id)?;

    let run = traced(correlation_id, tenant_id, "mark_run_paid", || {
        state.engine().mark_run_paid(tenant_id, run_id, &req.actor)
    })?;
    Ok(json_response(StatusCode::OK, run))
}

async fn cancel_run_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, run_id) = path_params(path, correlation_id)?;

    let run = traced(correlation_id, tenant_id, "cancel_run", || {
        state.engine().cancel_run(tenant_id, run_id)
    })?;
    Ok(json_response(StatusCode::OK, run))
}

async fn payslips_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let (tenant_id, run_id) = path_params(path, correlation_id)?;

    let payslips = traced(correlation_id, tenant_id, "payslips", || {
        state.engine().payslips(tenant_id, run_id)
    })?;
    Ok(json_response(StatusCode::OK, payslips))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PayrollEngine;
    use crate::models::Breakdown;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        AppState::new(PayrollEngine::with_defaults())
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<&str>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        router.oneshot(request).await.unwrap()
    }

    async fn error_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_preview_returns_breakdown_and_rows() {
        let router = create_router(create_test_state());
        let uri = format!("/tenants/{}/compensation/preview", Uuid::new_v4());

        let response = send(
            router,
            "POST",
            &uri,
            Some(r#"{"source": "ctc", "annual_ctc": "600000"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert_eq!(content_type, "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let preview: PreviewResponse = serde_json::from_slice(&body).unwrap();
        let breakdown: &Breakdown = &preview.breakdown;
        assert_eq!(breakdown.totals.net_pay.monthly, dec!(44238));
        assert!(preview.rows.iter().any(|r| r.name == "Net Take Home"));
    }

    #[tokio::test]
    async fn test_insufficient_ctc_returns_422() {
        let router = create_router(create_test_state());
        let uri = format!("/tenants/{}/compensation/preview", Uuid::new_v4());

        let response = send(
            router,
            "POST",
            &uri,
            Some(r#"{"source": "ctc", "annual_ctc": "100000"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_of(response).await.code, "INSUFFICIENT_CTC");
    }

    #[tokio::test]
    async fn test_malformed_json_returns_400() {
        let router = create_router(create_test_state());
        let uri = format!("/tenants/{}/templates", Uuid::new_v4());

        let response = send(router, "POST", &uri, Some("{invalid json")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(response).await.code, "MALFORMED_JSON");
    }

    #[tokio::test]
    async fn test_missing_field_returns_validation_error() {
        let router = create_router(create_test_state());
        let uri = format!("/tenants/{}/payroll-runs", Uuid::new_v4());

        let response = send(router, "POST", &uri, Some(r#"{"month": 4, "year": 2026}"#)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = error_of(response).await;
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert!(error.message.contains("initiated_by"));
    }

    #[tokio::test]
    async fn test_invalid_uuid_in_path_returns_400() {
        let router = create_router(create_test_state());

        let response = send(router, "GET", "/tenants/not-a-uuid/payroll-runs/also-not", None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(response).await.code, "INVALID_PATH");
    }

    #[tokio::test]
    async fn test_invalid_period_in_path_returns_400() {
        let router = create_router(create_test_state());
        let uri = format!("/tenants/{}/attendance/2026-13/freeze", Uuid::new_v4());

        let response = send(router, "POST", &uri, None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_run_returns_404() {
        let router = create_router(create_test_state());
        let uri = format!("/tenants/{}/payroll-runs/{}", Uuid::new_v4(), Uuid::new_v4());

        let response = send(router, "GET", &uri, None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_of(response).await.code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_approving_initiated_run_returns_409() {
        let state = create_test_state();
        let tenant = Uuid::new_v4();
        let run = state.engine().initiate_run(tenant, 4, 2026, "hr").unwrap();
        let router = create_router(state);
        let uri = format!("/tenants/{}/payroll-runs/{}/approve", tenant, run.id);

        let response = send(router, "POST", &uri, Some(r#"{"actor": "cfo"}"#)).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(error_of(response).await.code, "STATUS_TRANSITION");
    }
}
