//! Certificate application workflow: intake, staged review, issuance, and public verification.
//!
//! Storage, role membership, and notification delivery are traits so the engine can run
//! against the in-memory implementations in [`memory`] or a real backend.

pub mod domain;
pub mod engine;
pub(crate) mod gate;
pub mod intake;
pub mod issuer;
pub mod memory;
pub mod notify;
pub mod repository;
pub mod router;
pub mod transitions;
pub mod verifier;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, ApplicantDetails, Application, ApplicationCode, ApplicationId, ApplicationStatus,
    ApplicationSubmission, CanonicalFields, Certificate, CertificateNumber, CertificateType,
    DocumentDescriptor, DocumentRecord, DocumentType, InvariantViolation, Role, StageMark,
    StageTimestamps, UnknownLabel, UserId,
};
pub use engine::{TransitionOutcome, TransitionRequest, WorkflowEngine, WorkflowError};
pub use gate::DocumentAttachmentGate;
pub use intake::{
    ApplicationCodeSource, DocumentViolation, IntakeGuard, IntakeViolation, SequentialCodes,
    MAX_DOCUMENT_BYTES,
};
pub use issuer::{
    format_certificate_number, CertificateIssuer, CertificateSigner, Issuance, IssuanceError,
};
pub use memory::{InMemoryNotificationOutbox, InMemoryStore, StaticRoleDirectory};
pub use notify::{ConfiguredNotifier, TracingNotificationDispatcher, WebhookNotificationDispatcher};
pub use repository::{
    ApplicationRepository, ApplicationStatusView, CertificateRegistry, DocumentRepository,
    NotificationDispatcher, NotificationError, RepositoryError, RoleAuthority, StatusNotice,
    WorkflowStore,
};
pub use router::{certificate_router, verification_router};
pub use verifier::{CertificateVerifier, VerificationError, VerifiedCertificate};
