use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationCode, ApplicationId, ApplicationStatus, Certificate,
    CertificateNumber, CertificateType, DocumentRecord, InvariantViolation, Role,
    StageTimestamps, UserId,
};

/// Durable record of applications and their status.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;

    /// Persist a transition as one unit.
    ///
    /// The write succeeds only while the stored status still equals `expected` and is not
    /// terminal. When `certificate` is present it is written in the same unit, subject to the
    /// registry's write-once rules; on any failure nothing is persisted.
    fn commit_transition(
        &self,
        expected: ApplicationStatus,
        application: Application,
        certificate: Option<Certificate>,
    ) -> Result<(), RepositoryError>;

    fn list_by_status(
        &self,
        statuses: &[ApplicationStatus],
    ) -> Result<Vec<Application>, RepositoryError>;
    fn list_for_owner(&self, owner: &UserId) -> Result<Vec<Application>, RepositoryError>;
}

/// Supporting-file metadata per application. File contents live elsewhere.
pub trait DocumentRepository: Send + Sync {
    fn attach(&self, document: DocumentRecord) -> Result<DocumentRecord, RepositoryError>;
    fn documents_for(&self, id: &ApplicationId) -> Result<Vec<DocumentRecord>, RepositoryError>;
    fn count_for(&self, id: &ApplicationId) -> Result<usize, RepositoryError>;
}

/// Write-once store of issued certificates; the only source of truth for them.
pub trait CertificateRegistry: Send + Sync {
    /// Allocate the next serial for `year`. Serials never repeat within a year.
    fn next_serial(&self, year: i32) -> Result<u64, RepositoryError>;
    fn insert_certificate(&self, certificate: Certificate) -> Result<Certificate, RepositoryError>;
    fn by_application(&self, id: &ApplicationId) -> Result<Option<Certificate>, RepositoryError>;
    fn by_number(&self, number: &str) -> Result<Option<Certificate>, RepositoryError>;
}

/// Everything the workflow engine needs from storage.
pub trait WorkflowStore: ApplicationRepository + DocumentRepository + CertificateRegistry {}

impl<T> WorkflowStore for T where
    T: ApplicationRepository + DocumentRepository + CertificateRegistry
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} already exists")]
    Duplicate(&'static str),
    #[error("record not found")]
    NotFound,
    #[error("stored status is {found}, expected {expected}")]
    StaleStatus {
        expected: ApplicationStatus,
        found: ApplicationStatus,
    },
    #[error("application is {0} and can no longer change")]
    Terminal(ApplicationStatus),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Answers role-membership questions for the identity provider.
pub trait RoleAuthority: Send + Sync {
    fn is_in_role(&self, user: &UserId, role: Role) -> bool;
}

/// Outbound hook informing applicants about status changes.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, notice: StatusNotice) -> Result<(), NotificationError>;
}

/// Payload handed to the notification dispatcher after a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotice {
    pub application_id: ApplicationCode,
    pub status: ApplicationStatus,
    pub user_email: String,
    pub user_name: String,
    pub certificate_type: CertificateType,
}

impl StatusNotice {
    pub fn for_application(application: &Application) -> Self {
        Self {
            application_id: application.code.clone(),
            status: application.status,
            user_email: application.applicant.email.clone(),
            user_name: application.applicant.full_name.clone(),
            certificate_type: application.certificate_type,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification endpoint answered {0}")]
    Rejected(u16),
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub application_code: ApplicationCode,
    pub certificate_type: CertificateType,
    pub status: &'static str,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stages: StageTimestamps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_requested_from: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_number: Option<CertificateNumber>,
}

impl Application {
    pub fn status_view(&self, certificate: Option<&Certificate>) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id,
            application_code: self.code.clone(),
            certificate_type: self.certificate_type,
            status: self.status.label(),
            submitted_at: self.submitted_at,
            updated_at: self.updated_at,
            stages: self.stages.clone(),
            rejection_reason: self.rejection_reason.clone(),
            additional_info: self.additional_info.clone(),
            info_requested_from: self.info_requested_from.map(ApplicationStatus::label),
            certificate_number: certificate.map(|issued| issued.certificate_number.clone()),
        }
    }
}
