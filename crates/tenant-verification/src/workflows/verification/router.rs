use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::controller::{
    Navigation, SubmitOutcome, SubmitRejection, WizardController, WizardError,
};
use super::domain::{DraftUpdate, TenancyProof, WizardSessionId, MAX_PROOF_BYTES};
use super::gateway::SubmissionGateway;
use super::persistence::DraftPersistence;
use super::sessions::WizardSessions;

pub const FILE_NAME_HEADER: &str = "x-file-name";

type SharedSessions<P, G> = Arc<WizardSessions<P, G>>;

/// HTTP surface over the wizard sessions.
pub fn verification_router<P, G>(sessions: SharedSessions<P, G>) -> Router
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/verification/sessions",
            post(open_handler::<P, G>),
        )
        .route(
            "/api/v1/verification/sessions/:session_id",
            axum::routing::get(snapshot_handler::<P, G>).delete(abandon_handler::<P, G>),
        )
        .route(
            "/api/v1/verification/sessions/:session_id/draft",
            patch(update_handler::<P, G>),
        )
        .route(
            "/api/v1/verification/sessions/:session_id/proof",
            put(proof_handler::<P, G>).layer(DefaultBodyLimit::max(MAX_PROOF_BYTES + 1024)),
        )
        .route(
            "/api/v1/verification/sessions/:session_id/next",
            post(next_handler::<P, G>),
        )
        .route(
            "/api/v1/verification/sessions/:session_id/back",
            post(back_handler::<P, G>),
        )
        .route(
            "/api/v1/verification/sessions/:session_id/submit",
            post(submit_handler::<P, G>),
        )
        .route(
            "/api/v1/verification/sessions/:session_id/notice",
            delete(dismiss_notice_handler::<P, G>),
        )
        .with_state(sessions)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenSessionRequest {
    #[serde(default)]
    session_id: Option<String>,
}

pub(crate) async fn open_handler<P, G>(
    State(sessions): State<SharedSessions<P, G>>,
    body: Bytes,
) -> Response
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    let request = if body.is_empty() {
        OpenSessionRequest::default()
    } else {
        match serde_json::from_slice::<OpenSessionRequest>(&body) {
            Ok(request) => request,
            Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
        }
    };

    let resume = match request.session_id {
        Some(raw) => match WizardSessionId::parse(&raw) {
            Some(id) => Some(id),
            None => return invalid_session_response(&raw),
        },
        None => None,
    };

    let controller = sessions.open(resume);
    (StatusCode::CREATED, Json(controller.snapshot())).into_response()
}

pub(crate) async fn snapshot_handler<P, G>(
    State(sessions): State<SharedSessions<P, G>>,
    Path(session_id): Path<String>,
) -> Response
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    match lookup(&sessions, &session_id) {
        Ok(controller) => (StatusCode::OK, Json(controller.snapshot())).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn update_handler<P, G>(
    State(sessions): State<SharedSessions<P, G>>,
    Path(session_id): Path<String>,
    Json(update): Json<DraftUpdate>,
) -> Response
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    let controller = match lookup(&sessions, &session_id) {
        Ok(controller) => controller,
        Err(response) => return response,
    };

    match controller.update_form_data(update) {
        Ok(()) => (StatusCode::OK, Json(controller.snapshot())).into_response(),
        Err(error) => wizard_error_response(error),
    }
}

pub(crate) async fn proof_handler<P, G>(
    State(sessions): State<SharedSessions<P, G>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    let controller = match lookup(&sessions, &session_id) {
        Ok(controller) => controller,
        Err(response) => return response,
    };

    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let update = if body.is_empty() && file_name.is_empty() {
        DraftUpdate::default().clear_tenancy_proof()
    } else {
        match TenancyProof::new(file_name, body.to_vec()) {
            Ok(proof) => DraftUpdate::default().tenancy_proof(proof),
            Err(err) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        }
    };

    match controller.update_form_data(update) {
        Ok(()) => (StatusCode::OK, Json(controller.snapshot())).into_response(),
        Err(error) => wizard_error_response(error),
    }
}

pub(crate) async fn next_handler<P, G>(
    State(sessions): State<SharedSessions<P, G>>,
    Path(session_id): Path<String>,
) -> Response
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    match lookup(&sessions, &session_id) {
        Ok(controller) => {
            let navigation = controller.next();
            navigation_response(navigation, &controller)
        }
        Err(response) => response,
    }
}

pub(crate) async fn back_handler<P, G>(
    State(sessions): State<SharedSessions<P, G>>,
    Path(session_id): Path<String>,
) -> Response
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    match lookup(&sessions, &session_id) {
        Ok(controller) => {
            let navigation = controller.back();
            navigation_response(navigation, &controller)
        }
        Err(response) => response,
    }
}

pub(crate) async fn submit_handler<P, G>(
    State(sessions): State<SharedSessions<P, G>>,
    Path(session_id): Path<String>,
) -> Response
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    let controller = match lookup(&sessions, &session_id) {
        Ok(controller) => controller,
        Err(response) => return response,
    };

    match sessions.submit(&controller).await {
        SubmitOutcome::Completed => {
            let payload = json!({
                "status": "complete",
                "session": controller.snapshot(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        SubmitOutcome::Failed { error } => {
            let payload = json!({
                "error": error,
                "session": controller.snapshot(),
            });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
        SubmitOutcome::Rejected(rejection) => {
            let status = match rejection {
                SubmitRejection::InFlight => StatusCode::CONFLICT,
                SubmitRejection::NotAtTerminalStep | SubmitRejection::Incomplete(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SubmitRejection::Closed => StatusCode::GONE,
            };
            error_response(status, rejection.to_string())
        }
        SubmitOutcome::Detached => {
            error_response(StatusCode::GONE, "the wizard was closed during submission")
        }
    }
}

pub(crate) async fn dismiss_notice_handler<P, G>(
    State(sessions): State<SharedSessions<P, G>>,
    Path(session_id): Path<String>,
) -> Response
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    match lookup(&sessions, &session_id) {
        Ok(controller) => {
            controller.dismiss_notice();
            (StatusCode::OK, Json(controller.snapshot())).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn abandon_handler<P, G>(
    State(sessions): State<SharedSessions<P, G>>,
    Path(session_id): Path<String>,
) -> Response
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    let Some(id) = WizardSessionId::parse(&session_id) else {
        return invalid_session_response(&session_id);
    };
    sessions.abandon(&id);
    StatusCode::NO_CONTENT.into_response()
}

fn lookup<P, G>(
    sessions: &WizardSessions<P, G>,
    raw: &str,
) -> Result<Arc<WizardController<P, G>>, Response>
where
    P: DraftPersistence,
    G: SubmissionGateway,
{
    let id = WizardSessionId::parse(raw).ok_or_else(|| invalid_session_response(raw))?;
    sessions.get(&id).ok_or_else(|| {
        let payload = json!({
            "error": "verification session not found",
            "session_id": id.as_str(),
        });
        (StatusCode::NOT_FOUND, Json(payload)).into_response()
    })
}

fn navigation_response<P, G>(navigation: Navigation, controller: &WizardController<P, G>) -> Response
where
    P: DraftPersistence,
    G: SubmissionGateway,
{
    let label = match navigation {
        Navigation::Moved { .. } => "moved",
        Navigation::Stayed(_) => "stayed",
        Navigation::Abandon => "abandon",
    };
    let payload = json!({
        "navigation": label,
        "abandon": navigation == Navigation::Abandon,
        "session": controller.snapshot(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

fn wizard_error_response(error: WizardError) -> Response {
    let status = match error {
        WizardError::SubmissionInFlight => StatusCode::CONFLICT,
        WizardError::Closed => StatusCode::GONE,
    };
    error_response(status, error.to_string())
}

fn invalid_session_response(raw: &str) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        format!("'{raw}' is not a valid verification session id"),
    )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}
