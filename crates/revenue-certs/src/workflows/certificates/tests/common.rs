use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::{IssuanceConfig, NotificationConfig};
use crate::workflows::certificates::domain::{
    Actor, ApplicantDetails, Application, ApplicationId, ApplicationStatus,
    ApplicationSubmission, Certificate, CertificateType, DocumentDescriptor, DocumentRecord,
    DocumentType, Role, UserId,
};
use crate::workflows::certificates::engine::{TransitionRequest, WorkflowEngine};
use crate::workflows::certificates::memory::{
    InMemoryNotificationOutbox, InMemoryStore, StaticRoleDirectory,
};
use crate::workflows::certificates::repository::{
    ApplicationRepository, CertificateRegistry, DocumentRepository, NotificationDispatcher,
    NotificationError, RepositoryError, StatusNotice,
};

pub(super) const CITIZEN: &str = "citizen-asha";
pub(super) const OTHER_CITIZEN: &str = "citizen-vikram";
pub(super) const CLERK: &str = "clerk-ramesh";
pub(super) const OFFICER_1: &str = "vo1-sunita";
pub(super) const OFFICER_2: &str = "vo2-arjun";
pub(super) const OFFICER_3: &str = "vo3-kavya";
pub(super) const STAFF: &str = "staff-imran";
pub(super) const SDO: &str = "sdo-lakshmi";
pub(super) const ADMIN: &str = "admin-root";

/// The test user holding each role.
pub(super) fn desk(role: Role) -> &'static str {
    match role {
        Role::Citizen => CITIZEN,
        Role::Clerk => CLERK,
        Role::VerificationOfficer1 => OFFICER_1,
        Role::VerificationOfficer2 => OFFICER_2,
        Role::VerificationOfficer3 => OFFICER_3,
        Role::StaffOfficer => STAFF,
        Role::Sdo => SDO,
        Role::Admin => ADMIN,
    }
}

pub(super) type TestEngine<N = InMemoryNotificationOutbox> =
    WorkflowEngine<InMemoryStore, StaticRoleDirectory, N>;

pub(super) fn issuance_config() -> IssuanceConfig {
    let mut validity_days = BTreeMap::new();
    validity_days.insert(CertificateType::Income, 365);
    IssuanceConfig {
        signing_key: "test-district-signing-key".to_string(),
        number_prefix: "CERT".to_string(),
        validity_days,
    }
}

pub(super) fn notification_config() -> NotificationConfig {
    NotificationConfig {
        webhook_url: None,
        timeout: Duration::from_millis(50),
    }
}

pub(super) fn roles() -> StaticRoleDirectory {
    StaticRoleDirectory::default()
        .with_grant(CITIZEN, Role::Citizen)
        .with_grant(OTHER_CITIZEN, Role::Citizen)
        .with_grant(CLERK, Role::Clerk)
        .with_grant(OFFICER_1, Role::VerificationOfficer1)
        .with_grant(OFFICER_2, Role::VerificationOfficer2)
        .with_grant(OFFICER_3, Role::VerificationOfficer3)
        .with_grant(STAFF, Role::StaffOfficer)
        .with_grant(SDO, Role::Sdo)
        .with_grant(ADMIN, Role::Admin)
}

pub(super) fn build_engine() -> (TestEngine, Arc<InMemoryStore>, Arc<InMemoryNotificationOutbox>) {
    let store = Arc::new(InMemoryStore::default());
    let outbox = Arc::new(InMemoryNotificationOutbox::default());
    let engine = build_engine_with(store.clone(), outbox.clone());
    (engine, store, outbox)
}

pub(super) fn build_engine_with<N>(store: Arc<InMemoryStore>, notifier: Arc<N>) -> TestEngine<N>
where
    N: NotificationDispatcher + 'static,
{
    WorkflowEngine::new(
        store,
        Arc::new(roles()),
        notifier,
        &issuance_config(),
        &notification_config(),
    )
    .expect("engine builds")
}

pub(super) fn submission(certificate_type: CertificateType) -> ApplicationSubmission {
    ApplicationSubmission {
        owner: UserId(CITIZEN.to_string()),
        certificate_type,
        applicant: ApplicantDetails {
            full_name: "Asha Verma".to_string(),
            guardian_name: "Prakash Verma".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1991, 4, 17).expect("valid date"),
            address: "Ward 7, Station Road, Sitapur".to_string(),
            phone_number: "9876543210".to_string(),
            email: "asha.verma@example.in".to_string(),
        },
        purpose: "Scholarship application".to_string(),
        additional_info: None,
    }
}

pub(super) fn descriptor() -> DocumentDescriptor {
    DocumentDescriptor {
        document_name: "Salary slip".to_string(),
        document_type: DocumentType::IncomeProof,
        file_path: "applications/asha/salary-slip.pdf".to_string(),
        file_size: 120_000,
        content_type: "application/pdf".to_string(),
    }
}

/// Submit an application and attach one document so it can leave `pending`.
pub(super) fn submitted<N>(engine: &TestEngine<N>, certificate_type: CertificateType) -> Application
where
    N: NotificationDispatcher + 'static,
{
    let application = engine
        .submit(submission(certificate_type))
        .expect("valid submission");
    engine
        .attach_document(&application.id, &UserId(CITIZEN.to_string()), descriptor())
        .expect("document attaches");
    application
}

pub(super) fn request(
    user: &str,
    role: Role,
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> TransitionRequest {
    TransitionRequest {
        actor: Actor::new(user, role),
        expected_status: from,
        requested_status: to,
        note: None,
    }
}

pub(super) fn with_note(mut request: TransitionRequest, note: &str) -> TransitionRequest {
    request.note = Some(note.to_string());
    request
}

/// Drive an application along clerk, staff officer and sdo edges up to `awaiting_sdo`.
pub(super) async fn to_awaiting_sdo<N>(engine: &TestEngine<N>, id: &ApplicationId)
where
    N: NotificationDispatcher + 'static,
{
    use ApplicationStatus::*;
    for (user, role, from, to) in [
        (CLERK, Role::Clerk, Pending, DocumentVerification),
        (CLERK, Role::Clerk, DocumentVerification, StaffReview),
        (STAFF, Role::StaffOfficer, StaffReview, AwaitingSdo),
    ] {
        engine
            .transition(id, request(user, role, from, to))
            .await
            .unwrap_or_else(|err| panic!("{from} -> {to} should succeed: {err}"));
    }
}

pub(super) async fn approved<N>(
    engine: &TestEngine<N>,
    certificate_type: CertificateType,
) -> (Application, Certificate)
where
    N: NotificationDispatcher + 'static,
{
    let application = submitted(engine, certificate_type);
    to_awaiting_sdo(engine, &application.id).await;
    let outcome = engine
        .transition(
            &application.id,
            request(
                SDO,
                Role::Sdo,
                ApplicationStatus::AwaitingSdo,
                ApplicationStatus::Approved,
            ),
        )
        .await
        .expect("sdo approves");
    let certificate = outcome.certificate.expect("approval issues a certificate");
    (outcome.application, certificate)
}

/// Dispatcher whose transport always fails.
#[derive(Default)]
pub(super) struct FailingNotifier;

#[async_trait]
impl NotificationDispatcher for FailingNotifier {
    async fn notify(&self, _notice: StatusNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Rejected(502))
    }
}

/// Dispatcher that never answers within the configured timeout.
#[derive(Default)]
pub(super) struct StallingNotifier;

#[async_trait]
impl NotificationDispatcher for StallingNotifier {
    async fn notify(&self, _notice: StatusNotice) -> Result<(), NotificationError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }
}

pub(super) struct UnavailableStore;

impl ApplicationRepository for UnavailableStore {
    fn insert(&self, _application: Application) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit_transition(
        &self,
        _expected: ApplicationStatus,
        _application: Application,
        _certificate: Option<Certificate>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_by_status(
        &self,
        _statuses: &[ApplicationStatus],
    ) -> Result<Vec<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_for_owner(&self, _owner: &UserId) -> Result<Vec<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl DocumentRepository for UnavailableStore {
    fn attach(&self, _document: DocumentRecord) -> Result<DocumentRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn documents_for(&self, _id: &ApplicationId) -> Result<Vec<DocumentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count_for(&self, _id: &ApplicationId) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl CertificateRegistry for UnavailableStore {
    fn next_serial(&self, _year: i32) -> Result<u64, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_certificate(
        &self,
        _certificate: Certificate,
    ) -> Result<Certificate, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn by_application(&self, _id: &ApplicationId) -> Result<Option<Certificate>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn by_number(&self, _number: &str) -> Result<Option<Certificate>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
