use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{IssuanceConfig, NotificationConfig};

use super::domain::{
    Actor, Application, ApplicationId, ApplicationStatus, ApplicationSubmission, Certificate,
    DocumentDescriptor, DocumentRecord, Role, UserId,
};
use super::gate::DocumentAttachmentGate;
use super::intake::{
    ApplicationCodeSource, DocumentViolation, IntakeGuard, IntakeViolation, SequentialCodes,
};
use super::issuer::{CertificateIssuer, Issuance, IssuanceError};
use super::repository::{
    ApplicationStatusView, NotificationDispatcher, RepositoryError, RoleAuthority, StatusNotice,
    WorkflowStore,
};
use super::transitions;
use super::verifier::CertificateVerifier;

/// A caller's request to move an application along one edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub actor: Actor,
    /// The status the caller last observed; acts as the optimistic-concurrency token.
    pub expected_status: ApplicationStatus,
    pub requested_status: ApplicationStatus,
    /// Rejection reason, or the information being requested or supplied.
    #[serde(default)]
    pub note: Option<String>,
}

/// Committed result of a transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub application: Application,
    pub certificate: Option<Certificate>,
    pub notified: bool,
}

/// Error raised by the workflow engine.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("{from} -> {to} is not a transition of the review workflow")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("role {role} may not move an application from {from} to {to}")]
    Unauthorized {
        role: Role,
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("a non-empty reason is required to reject an application")]
    MissingReason,
    #[error("application is {found}, not {expected}; re-read and retry")]
    Conflict {
        expected: ApplicationStatus,
        found: ApplicationStatus,
    },
    #[error("at least one supporting document must be attached before review")]
    MissingDocuments,
    #[error("certificate issuance failed: {0}")]
    IssuanceFailure(#[from] IssuanceError),
    #[error("only the applicant may change this application")]
    NotOwner,
    #[error("application is {0} and accepts no further changes")]
    Closed(ApplicationStatus),
    #[error(transparent)]
    Intake(#[from] IntakeViolation),
    #[error(transparent)]
    Document(#[from] DocumentViolation),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// State machine driving applications from intake to certificate or rejection.
pub struct WorkflowEngine<S, R, N> {
    store: Arc<S>,
    roles: Arc<R>,
    notifier: Arc<N>,
    codes: Arc<dyn ApplicationCodeSource>,
    intake: IntakeGuard,
    gate: DocumentAttachmentGate<S>,
    issuer: CertificateIssuer<S>,
    notify_timeout: Duration,
}

impl<S, R, N> WorkflowEngine<S, R, N>
where
    S: WorkflowStore + 'static,
    R: RoleAuthority + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        store: Arc<S>,
        roles: Arc<R>,
        notifier: Arc<N>,
        issuance: &IssuanceConfig,
        notifications: &NotificationConfig,
    ) -> Result<Self, IssuanceError> {
        Ok(Self {
            gate: DocumentAttachmentGate::new(store.clone()),
            issuer: CertificateIssuer::new(store.clone(), issuance)?,
            store,
            roles,
            notifier,
            codes: Arc::new(SequentialCodes::default()),
            intake: IntakeGuard,
            notify_timeout: notifications.timeout,
        })
    }

    /// Replace the default sequential application codes.
    pub fn with_code_source(mut self, codes: Arc<dyn ApplicationCodeSource>) -> Self {
        self.codes = codes;
        self
    }

    pub fn issuer(&self) -> &CertificateIssuer<S> {
        &self.issuer
    }

    /// Public lookup sharing this engine's registry and signing key.
    pub fn verifier(&self) -> CertificateVerifier<S> {
        CertificateVerifier::new(self.store.clone(), self.issuer.signer().clone())
    }

    /// Accept a validated intake payload as a new `pending` application.
    pub fn submit(&self, submission: ApplicationSubmission) -> Result<Application, WorkflowError> {
        let now = Utc::now();
        let code = self.codes.next_code(now);
        let application = self
            .intake
            .application_from_submission(submission, code, now)?;
        let stored = self.store.insert(application)?;
        info!(
            application = %stored.code,
            certificate_type = %stored.certificate_type,
            "application received"
        );
        Ok(stored)
    }

    /// Record a supporting document uploaded by the applicant.
    pub fn attach_document(
        &self,
        id: &ApplicationId,
        uploader: &UserId,
        descriptor: DocumentDescriptor,
    ) -> Result<DocumentRecord, WorkflowError> {
        let application = self.get(id)?;
        if &application.owner != uploader {
            return Err(WorkflowError::NotOwner);
        }
        if application.status.is_terminal() {
            return Err(WorkflowError::Closed(application.status));
        }

        let document = self
            .intake
            .document_from_descriptor(application.id, descriptor, Utc::now())?;
        let stored = self.store.attach(document)?;
        debug!(
            application = %application.code,
            document = %stored.document_name,
            "document attached"
        );
        Ok(stored)
    }

    pub fn documents(&self, id: &ApplicationId) -> Result<Vec<DocumentRecord>, WorkflowError> {
        self.get(id)?;
        Ok(self.store.documents_for(id)?)
    }

    /// Apply one transition as a single unit, then notify the applicant.
    pub async fn transition(
        &self,
        id: &ApplicationId,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let TransitionRequest {
            actor,
            expected_status: from,
            requested_status: to,
            note,
        } = request;

        let current = self.get(id)?;
        let result = self.validate(&current, &actor, from, to, note.as_deref());
        if let Err(err) = &result {
            debug!(
                application = %current.code,
                %from,
                %to,
                role = %actor.role,
                error = %err,
                "transition refused"
            );
        }
        let note = result?;

        let now = Utc::now();
        let next = advance(&current, &actor, to, note, now);

        let (to_write, certificate) = if to == ApplicationStatus::Approved {
            match self.issuer.prepare(&next, now)? {
                Issuance::Existing(existing) => (None, Some(existing)),
                Issuance::Prepared(prepared) => (Some(prepared.clone()), Some(prepared)),
            }
        } else {
            (None, None)
        };

        self.store
            .commit_transition(from, next.clone(), to_write)
            .map_err(|err| match err {
                RepositoryError::StaleStatus { expected, found } => {
                    WorkflowError::Conflict { expected, found }
                }
                err @ RepositoryError::Duplicate(_) if to == ApplicationStatus::Approved => {
                    WorkflowError::IssuanceFailure(IssuanceError::Registry(err))
                }
                other => WorkflowError::Repository(other),
            })?;

        info!(
            application = %next.code,
            %from,
            %to,
            actor = %actor.user_id,
            role = %actor.role,
            "transition committed"
        );

        let notified = self.dispatch(StatusNotice::for_application(&next)).await;

        Ok(TransitionOutcome {
            application: next,
            certificate,
            notified,
        })
    }

    /// Checks that need no writes; returns the trimmed note on success.
    fn validate(
        &self,
        current: &Application,
        actor: &Actor,
        from: ApplicationStatus,
        to: ApplicationStatus,
        note: Option<&str>,
    ) -> Result<Option<String>, WorkflowError> {
        if !transitions::is_legal(from, to) {
            return Err(WorkflowError::InvalidTransition { from, to });
        }

        let unauthorized = WorkflowError::Unauthorized {
            role: actor.role,
            from,
            to,
        };
        if !transitions::is_permitted(from, to, actor.role)
            || !self.roles.is_in_role(&actor.user_id, actor.role)
        {
            return Err(unauthorized);
        }
        if actor.role == Role::Citizen && actor.user_id != current.owner {
            return Err(unauthorized);
        }

        let note = note
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(str::to_string);
        if to == ApplicationStatus::Rejected && note.is_none() {
            return Err(WorkflowError::MissingReason);
        }

        if current.status != from {
            return Err(WorkflowError::Conflict {
                expected: from,
                found: current.status,
            });
        }

        if from == ApplicationStatus::AdditionalInfoNeeded
            && current.info_requested_from != Some(to)
        {
            return Err(WorkflowError::InvalidTransition { from, to });
        }

        if DocumentAttachmentGate::<S>::applies_to(from, to)
            && !self.gate.has_required_documents(&current.id)?
        {
            return Err(WorkflowError::MissingDocuments);
        }

        Ok(note)
    }

    async fn dispatch(&self, notice: StatusNotice) -> bool {
        let application = notice.application_id.clone();
        let status = notice.status;
        match tokio::time::timeout(self.notify_timeout, self.notifier.notify(notice)).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(
                    application = %application,
                    %status,
                    error = %err,
                    "status notification failed"
                );
                false
            }
            Err(_) => {
                warn!(
                    application = %application,
                    %status,
                    timeout_ms = self.notify_timeout.as_millis() as u64,
                    "status notification timed out"
                );
                false
            }
        }
    }

    pub fn get(&self, id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.store.fetch(id)?.ok_or(WorkflowError::NotFound(*id))
    }

    /// Fetch an application with its certificate number, if issued, for API responses.
    pub fn status_view(&self, id: &ApplicationId) -> Result<ApplicationStatusView, WorkflowError> {
        let application = self.get(id)?;
        let certificate = self.store.by_application(id)?;
        Ok(application.status_view(certificate.as_ref()))
    }

    pub fn certificate_for(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Certificate>, WorkflowError> {
        self.get(id)?;
        Ok(self.store.by_application(id)?)
    }

    /// Applications currently waiting on an edge `role` may drive.
    pub fn queue_for_role(&self, role: Role) -> Result<Vec<Application>, WorkflowError> {
        let statuses = transitions::actionable_statuses(role);
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.list_by_status(&statuses)?)
    }

    pub fn applications_for_owner(
        &self,
        owner: &UserId,
    ) -> Result<Vec<Application>, WorkflowError> {
        Ok(self.store.list_for_owner(owner)?)
    }

    pub fn certificates_for_owner(
        &self,
        owner: &UserId,
    ) -> Result<Vec<Certificate>, WorkflowError> {
        let mut certificates = Vec::new();
        for application in self.store.list_for_owner(owner)? {
            if let Some(certificate) = self.store.by_application(&application.id)? {
                certificates.push(certificate);
            }
        }
        Ok(certificates)
    }

    /// Count of applications per status, every status present.
    pub fn status_counts(&self) -> Result<BTreeMap<ApplicationStatus, usize>, WorkflowError> {
        let mut counts: BTreeMap<_, _> = ApplicationStatus::ALL
            .into_iter()
            .map(|status| (status, 0))
            .collect();
        for application in self.store.list_by_status(&ApplicationStatus::ALL)? {
            *counts.entry(application.status).or_default() += 1;
        }
        Ok(counts)
    }
}

/// The application as it will look after moving to `to`.
fn advance(
    current: &Application,
    actor: &Actor,
    to: ApplicationStatus,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Application {
    let mut next = current.clone();
    let from = current.status;

    next.status = to;
    next.updated_at = now;
    next.stages.stamp(to, &actor.user_id, now);

    if from == ApplicationStatus::AdditionalInfoNeeded {
        next.info_requested_from = None;
    }

    match to {
        ApplicationStatus::AdditionalInfoNeeded => {
            next.info_requested_from = Some(from);
            next.info_requested_at = Some(now);
            if note.is_some() {
                next.additional_info = note;
            }
        }
        ApplicationStatus::Rejected => next.rejection_reason = note,
        _ if from == ApplicationStatus::AdditionalInfoNeeded && note.is_some() => {
            next.additional_info = note;
        }
        _ => {}
    }

    next
}
