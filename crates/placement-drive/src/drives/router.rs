use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    CompanyId, DriveDraft, DriveId, DrivePatch, RoundDraft, RoundId, RoundPatch, UserId,
};
use super::error::PlacementError;
use super::repository::{CampusDirectory, NotificationDispatcher, PlacementRepository};
use super::selection::{SelectionRequest, StudentDecision};
use super::service::PlacementService;

type SharedService<R, D, N> = Arc<PlacementService<R, D, N>>;

/// Student list accepted by the shortlist and reject endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentIdsRequest {
    #[serde(alias = "studentIds")]
    pub student_ids: Vec<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    pub decisions: Vec<StudentDecision>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentRequest {
    pub student_id: UserId,
    pub company_id: CompanyId,
}

#[derive(Debug, Clone, Serialize)]
struct EnrollmentResponse {
    student_id: UserId,
    enrolled_drives: Vec<DriveId>,
}

/// Router builder exposing drive, round and selection endpoints.
pub fn placement_router<R, D, N>(service: SharedService<R, D, N>) -> Router
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route("/api/v1/drives", post(create_drive_handler::<R, D, N>))
        .route(
            "/api/v1/drives/:drive_id",
            get(drive_overview_handler::<R, D, N>)
                .patch(update_drive_handler::<R, D, N>)
                .delete(delete_drive_handler::<R, D, N>),
        )
        .route(
            "/api/v1/drives/:drive_id/rounds",
            post(create_round_handler::<R, D, N>),
        )
        .route(
            "/api/v1/drives/:drive_id/rounds/:round_number/shortlist",
            post(shortlist_handler::<R, D, N>),
        )
        .route(
            "/api/v1/drives/:drive_id/rounds/:round_number/reject",
            post(reject_handler::<R, D, N>),
        )
        .route(
            "/api/v1/drives/:drive_id/rounds/:round_number/evaluate",
            post(evaluate_handler::<R, D, N>),
        )
        .route(
            "/api/v1/drives/:drive_id/students/:student_id",
            get(progress_handler::<R, D, N>),
        )
        .route(
            "/api/v1/rounds/:round_id",
            patch(update_round_handler::<R, D, N>).delete(delete_round_handler::<R, D, N>),
        )
        .route(
            "/api/v1/rounds/:round_id/start",
            post(start_round_handler::<R, D, N>),
        )
        .route(
            "/api/v1/rounds/:round_id/complete",
            post(complete_round_handler::<R, D, N>),
        )
        .route(
            "/api/v1/applications/approved",
            post(enrollment_handler::<R, D, N>),
        )
        .with_state(service)
}

fn respond<T: Serialize>(result: Result<T, PlacementError>, success: StatusCode) -> Response {
    match result {
        Ok(body) => (success, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: PlacementError) -> Response {
    let status = error.status_code();
    if status.is_server_error() {
        tracing::error!(%error, "placement request failed");
    }
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn body<T>(payload: Result<axum::Json<T>, JsonRejection>) -> Result<T, PlacementError> {
    payload
        .map(|axum::Json(value)| value)
        .map_err(|rejection| PlacementError::Validation(rejection.body_text()))
}

pub(crate) async fn create_drive_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    payload: Result<axum::Json<DriveDraft>, JsonRejection>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(
        body(payload).and_then(|draft| service.create_drive(draft)),
        StatusCode::CREATED,
    )
}

pub(crate) async fn drive_overview_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    Path(drive_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(service.drive_overview(&DriveId(drive_id)), StatusCode::OK)
}

pub(crate) async fn update_drive_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    Path(drive_id): Path<String>,
    payload: Result<axum::Json<DrivePatch>, JsonRejection>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let id = DriveId(drive_id);
    respond(
        body(payload).and_then(|patch| service.update_drive(&id, patch)),
        StatusCode::OK,
    )
}

pub(crate) async fn delete_drive_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    Path(drive_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(service.delete_drive(&DriveId(drive_id)), StatusCode::OK)
}

pub(crate) async fn create_round_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    Path(drive_id): Path<String>,
    payload: Result<axum::Json<RoundDraft>, JsonRejection>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let id = DriveId(drive_id);
    respond(
        body(payload).and_then(|draft| service.create_round(&id, draft)),
        StatusCode::CREATED,
    )
}

pub(crate) async fn update_round_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    Path(round_id): Path<String>,
    payload: Result<axum::Json<RoundPatch>, JsonRejection>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let id = RoundId(round_id);
    respond(
        body(payload).and_then(|patch| service.update_round(&id, patch)),
        StatusCode::OK,
    )
}

pub(crate) async fn delete_round_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    Path(round_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = service
        .delete_round(&RoundId(round_id))
        .map(|touched| json!({ "progress_updated": touched }));
    respond(result, StatusCode::OK)
}

pub(crate) async fn start_round_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    Path(round_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(service.start_round(&RoundId(round_id)), StatusCode::OK)
}

pub(crate) async fn complete_round_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    Path(round_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(service.complete_round(&RoundId(round_id)), StatusCode::OK)
}

fn student_ids(
    payload: Result<axum::Json<StudentIdsRequest>, JsonRejection>,
) -> Result<Vec<UserId>, PlacementError> {
    payload
        .map(|axum::Json(request)| request.student_ids)
        .map_err(|_| PlacementError::validation("student_ids must be an array of student ids"))
}

fn round_path(
    path: Result<Path<(String, u32)>, PathRejection>,
) -> Result<(DriveId, u32), PlacementError> {
    path.map(|Path((drive_id, round_number))| (DriveId(drive_id), round_number))
        .map_err(|_| PlacementError::validation("round number must be a positive integer"))
}

pub(crate) async fn shortlist_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    path: Result<Path<(String, u32)>, PathRejection>,
    payload: Result<axum::Json<StudentIdsRequest>, JsonRejection>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = round_path(path).and_then(|(id, round_number)| {
        student_ids(payload).and_then(|ids| service.shortlist(&id, round_number, ids))
    });
    respond(result, StatusCode::OK)
}

pub(crate) async fn reject_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    path: Result<Path<(String, u32)>, PathRejection>,
    payload: Result<axum::Json<StudentIdsRequest>, JsonRejection>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = round_path(path).and_then(|(id, round_number)| {
        student_ids(payload).and_then(|ids| service.reject(&id, round_number, ids))
    });
    respond(result, StatusCode::OK)
}

pub(crate) async fn evaluate_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    path: Result<Path<(String, u32)>, PathRejection>,
    payload: Result<axum::Json<EvaluateRequest>, JsonRejection>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = round_path(path).and_then(|(drive_id, round_number)| {
        body(payload).and_then(|request| {
            service.evaluate(SelectionRequest {
                drive_id,
                round_number,
                decisions: request.decisions,
            })
        })
    });
    respond(result, StatusCode::OK)
}

pub(crate) async fn progress_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    Path((drive_id, student_id)): Path<(String, String)>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    respond(
        service.progress(&DriveId(drive_id), &UserId(student_id)),
        StatusCode::OK,
    )
}

pub(crate) async fn enrollment_handler<R, D, N>(
    State(service): State<SharedService<R, D, N>>,
    payload: Result<axum::Json<EnrollmentRequest>, JsonRejection>,
) -> Response
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = body(payload).and_then(|request| {
        service
            .enroll_applicant(&request.student_id, &request.company_id)
            .map(|enrolled_drives| EnrollmentResponse {
                student_id: request.student_id,
                enrolled_drives,
            })
    });
    respond(result, StatusCode::OK)
}
