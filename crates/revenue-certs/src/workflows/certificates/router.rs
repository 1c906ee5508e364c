use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{ApplicationId, ApplicationSubmission, DocumentDescriptor, Role, UserId};
use super::engine::{TransitionRequest, WorkflowEngine, WorkflowError};
use super::repository::{
    CertificateRegistry, NotificationDispatcher, RepositoryError, RoleAuthority, WorkflowStore,
};
use super::verifier::{CertificateVerifier, VerificationError};

/// Upload metadata posted by the applicant.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachDocumentRequest {
    pub uploader: UserId,
    #[serde(flatten)]
    pub document: DocumentDescriptor,
}

/// Router builder exposing intake, review, and verification endpoints.
pub fn certificate_router<S, R, N>(engine: Arc<WorkflowEngine<S, R, N>>) -> Router
where
    S: WorkflowStore + 'static,
    R: RoleAuthority + 'static,
    N: NotificationDispatcher + 'static,
{
    let verifier = Arc::new(engine.verifier());
    Router::new()
        .route("/api/v1/applications", post(submit_handler::<S, R, N>))
        .route(
            "/api/v1/applications/:application_id",
            get(status_handler::<S, R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/documents",
            get(documents_handler::<S, R, N>).post(attach_handler::<S, R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/transitions",
            post(transition_handler::<S, R, N>),
        )
        .route("/api/v1/queues/:role", get(queue_handler::<S, R, N>))
        .with_state(engine)
        .merge(verification_router(verifier))
}

/// Public, read-only certificate lookup.
pub fn verification_router<C>(verifier: Arc<CertificateVerifier<C>>) -> Router
where
    C: CertificateRegistry + 'static,
{
    Router::new()
        .route(
            "/api/v1/certificates/verify/:certificate_number",
            get(verify_handler::<C>),
        )
        .with_state(verifier)
}

pub(crate) async fn submit_handler<S, R, N>(
    State(engine): State<Arc<WorkflowEngine<S, R, N>>>,
    axum::Json(submission): axum::Json<ApplicationSubmission>,
) -> Response
where
    S: WorkflowStore + 'static,
    R: RoleAuthority + 'static,
    N: NotificationDispatcher + 'static,
{
    match engine.submit(submission) {
        Ok(application) => {
            let view = application.status_view(None);
            (StatusCode::CREATED, axum::Json(view)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<S, R, N>(
    State(engine): State<Arc<WorkflowEngine<S, R, N>>>,
    Path(application_id): Path<Uuid>,
) -> Response
where
    S: WorkflowStore + 'static,
    R: RoleAuthority + 'static,
    N: NotificationDispatcher + 'static,
{
    match engine.status_view(&ApplicationId(application_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn documents_handler<S, R, N>(
    State(engine): State<Arc<WorkflowEngine<S, R, N>>>,
    Path(application_id): Path<Uuid>,
) -> Response
where
    S: WorkflowStore + 'static,
    R: RoleAuthority + 'static,
    N: NotificationDispatcher + 'static,
{
    match engine.documents(&ApplicationId(application_id)) {
        Ok(documents) => (StatusCode::OK, axum::Json(documents)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn attach_handler<S, R, N>(
    State(engine): State<Arc<WorkflowEngine<S, R, N>>>,
    Path(application_id): Path<Uuid>,
    axum::Json(request): axum::Json<AttachDocumentRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    R: RoleAuthority + 'static,
    N: NotificationDispatcher + 'static,
{
    let id = ApplicationId(application_id);
    match engine.attach_document(&id, &request.uploader, request.document) {
        Ok(document) => (StatusCode::CREATED, axum::Json(document)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn transition_handler<S, R, N>(
    State(engine): State<Arc<WorkflowEngine<S, R, N>>>,
    Path(application_id): Path<Uuid>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    R: RoleAuthority + 'static,
    N: NotificationDispatcher + 'static,
{
    let id = ApplicationId(application_id);
    match engine.transition(&id, request).await {
        Ok(outcome) => {
            let payload = json!({
                "application": outcome.application.status_view(outcome.certificate.as_ref()),
                "certificate": outcome.certificate,
                "notified": outcome.notified,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn queue_handler<S, R, N>(
    State(engine): State<Arc<WorkflowEngine<S, R, N>>>,
    Path(role): Path<String>,
) -> Response
where
    S: WorkflowStore + 'static,
    R: RoleAuthority + 'static,
    N: NotificationDispatcher + 'static,
{
    let role = match Role::from_str(&role) {
        Ok(role) => role,
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };

    match engine.queue_for_role(role) {
        Ok(applications) => {
            let views: Vec<_> = applications
                .iter()
                .map(|application| application.status_view(None))
                .collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn verify_handler<C>(
    State(verifier): State<Arc<CertificateVerifier<C>>>,
    Path(certificate_number): Path<String>,
) -> Response
where
    C: CertificateRegistry + 'static,
{
    match verifier.verify(&certificate_number) {
        Ok(verified) => (StatusCode::OK, axum::Json(verified)).into_response(),
        Err(VerificationError::NotFound(number)) => {
            let payload = json!({
                "certificate_number": number,
                "error": "certificate not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(VerificationError::Repository(err)) => repository_response(err),
    }
}

/// HTTP status a workflow failure is reported with.
pub(crate) fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Unauthorized { .. } | WorkflowError::NotOwner => StatusCode::FORBIDDEN,
        WorkflowError::MissingReason => StatusCode::BAD_REQUEST,
        WorkflowError::Conflict { .. } | WorkflowError::Closed(_) => StatusCode::CONFLICT,
        WorkflowError::InvalidTransition { .. }
        | WorkflowError::MissingDocuments
        | WorkflowError::Intake(_)
        | WorkflowError::Document(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        WorkflowError::IssuanceFailure(_) | WorkflowError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: WorkflowError) -> Response {
    let mut payload = json!({ "error": err.to_string() });
    if let WorkflowError::Conflict { found, .. } = &err {
        payload["current_status"] = json!(found);
    }
    (workflow_status(&err), axum::Json(payload)).into_response()
}

fn repository_response(err: RepositoryError) -> Response {
    let status = match err {
        RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}
