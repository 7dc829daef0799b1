use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::clock::Clock;
use super::domain::{
    Actor, ConfirmationKind, ContractorId, IssueId, IssueStatus, NewReport, Role, UserId,
};
use super::intake::IntakeAction;
use super::repository::{IssueRepository, RepositoryError};
use super::service::{IssueService, IssueServiceError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Router builder exposing report intake, authority actions, and read models.
pub fn issue_router<R, C>(service: Arc<IssueService<R, C>>) -> Router
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route("/api/v1/issues", post(submit_handler::<R, C>))
        .route("/api/v1/issues/:issue_id", get(issue_handler::<R, C>))
        .route("/api/v1/issues/:issue_id/verify", post(verify_handler::<R, C>))
        .route("/api/v1/issues/:issue_id/assign", post(assign_handler::<R, C>))
        .route("/api/v1/issues/:issue_id/start", post(start_handler::<R, C>))
        .route(
            "/api/v1/issues/:issue_id/complete",
            post(complete_handler::<R, C>),
        )
        .route("/api/v1/issues/:issue_id/status", post(status_handler::<R, C>))
        .route(
            "/api/v1/issues/:issue_id/confirmations",
            post(confirmation_handler::<R, C>),
        )
        .route(
            "/api/v1/contractors/rankings",
            get(rankings_handler::<R, C>),
        )
        .route("/api/v1/sla/queue", get(sla_queue_handler::<R, C>))
        .route("/api/v1/dashboard", get(dashboard_handler::<R, C>))
        .route(
            "/api/v1/reporters/:user_id/summary",
            get(reporter_summary_handler::<R, C>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub contractor_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: IssueStatus,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmationRequest {
    pub kind: ConfirmationKind,
}

pub(crate) async fn submit_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
    headers: HeaderMap,
    axum::Json(report): axum::Json<NewReport>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match service.submit_report(&actor, report) {
        Ok(outcome) => {
            let status = match outcome.action {
                IntakeAction::Create => StatusCode::CREATED,
                IntakeAction::Merge => StatusCode::OK,
            };
            (status, axum::Json(outcome)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn issue_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
    Path(issue_id): Path<String>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    match service.get(&IssueId(issue_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn verify_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
    headers: HeaderMap,
    Path(issue_id): Path<String>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    with_actor(&headers, |actor| service.verify(actor, &IssueId(issue_id)))
}

pub(crate) async fn assign_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
    headers: HeaderMap,
    Path(issue_id): Path<String>,
    axum::Json(request): axum::Json<AssignRequest>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    with_actor(&headers, |actor| {
        service.assign(
            actor,
            &IssueId(issue_id),
            ContractorId(request.contractor_id),
        )
    })
}

pub(crate) async fn start_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
    headers: HeaderMap,
    Path(issue_id): Path<String>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    with_actor(&headers, |actor| service.start_work(actor, &IssueId(issue_id)))
}

pub(crate) async fn complete_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
    headers: HeaderMap,
    Path(issue_id): Path<String>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    with_actor(&headers, |actor| service.complete(actor, &IssueId(issue_id)))
}

pub(crate) async fn status_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
    headers: HeaderMap,
    Path(issue_id): Path<String>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    with_actor(&headers, |actor| {
        service.set_status(actor, &IssueId(issue_id), request.status)
    })
}

pub(crate) async fn confirmation_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
    headers: HeaderMap,
    Path(issue_id): Path<String>,
    axum::Json(request): axum::Json<ConfirmationRequest>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    with_actor(&headers, |actor| {
        service.confirm(actor, &IssueId(issue_id), request.kind)
    })
}

pub(crate) async fn rankings_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    json_or_error(service.contractor_rankings())
}

pub(crate) async fn sla_queue_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    json_or_error(service.sla_queue())
}

pub(crate) async fn dashboard_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    json_or_error(service.dashboard())
}

pub(crate) async fn reporter_summary_handler<R, C>(
    State(service): State<Arc<IssueService<R, C>>>,
    Path(user_id): Path<String>,
) -> Response
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    json_or_error(service.reporter_summary(&UserId(user_id)))
}

/// Caller identity as forwarded by the fronting identity provider.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let role = headers
        .get(USER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Role>().ok());

    match (user_id, role) {
        (Some(user_id), Some(role)) => Ok(Actor {
            user_id: UserId(user_id.to_string()),
            role,
        }),
        _ => {
            let payload = json!({
                "error": format!("requests must carry {USER_ID_HEADER} and a valid {USER_ROLE_HEADER}"),
            });
            Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response())
        }
    }
}

fn with_actor<T, F>(headers: &HeaderMap, action: F) -> Response
where
    T: serde::Serialize,
    F: FnOnce(&Actor) -> Result<T, IssueServiceError>,
{
    match actor_from_headers(headers) {
        Ok(actor) => json_or_error(action(&actor)),
        Err(response) => response,
    }
}

fn json_or_error<T: serde::Serialize>(result: Result<T, IssueServiceError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, axum::Json(value)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub fn status_for(error: &IssueServiceError) -> StatusCode {
    match error {
        IssueServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        IssueServiceError::NotFound(_)
        | IssueServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        IssueServiceError::Transition(_)
        | IssueServiceError::Confirmation(_)
        | IssueServiceError::Contention
        | IssueServiceError::Repository(RepositoryError::Conflict | RepositoryError::Duplicate) => {
            StatusCode::CONFLICT
        }
        IssueServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        IssueServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn service_error_response(error: IssueServiceError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!(%error, "issue request failed");
    }
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
