use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal identifier for a stored application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Human-readable application code handed out at intake. Opaque to the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationCode(pub String);

impl fmt::Display for ApplicationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a portal user as handed to us by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    Caste,
    Income,
    Domicile,
    Residence,
}

impl CertificateType {
    pub const ALL: [CertificateType; 4] = [
        CertificateType::Caste,
        CertificateType::Income,
        CertificateType::Domicile,
        CertificateType::Residence,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CertificateType::Caste => "caste",
            CertificateType::Income => "income",
            CertificateType::Domicile => "domicile",
            CertificateType::Residence => "residence",
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Roles observed across the department portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Clerk,
    #[serde(rename = "verification_officer_1")]
    VerificationOfficer1,
    #[serde(rename = "verification_officer_2")]
    VerificationOfficer2,
    #[serde(rename = "verification_officer_3")]
    VerificationOfficer3,
    StaffOfficer,
    Sdo,
    Admin,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Citizen,
        Role::Clerk,
        Role::VerificationOfficer1,
        Role::VerificationOfficer2,
        Role::VerificationOfficer3,
        Role::StaffOfficer,
        Role::Sdo,
        Role::Admin,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Clerk => "clerk",
            Role::VerificationOfficer1 => "verification_officer_1",
            Role::VerificationOfficer2 => "verification_officer_2",
            Role::VerificationOfficer3 => "verification_officer_3",
            Role::StaffOfficer => "staff_officer",
            Role::Sdo => "sdo",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.label() == value.trim())
            .ok_or_else(|| UnknownLabel(value.to_string()))
    }
}

/// Status tracked throughout the review workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    DocumentVerification,
    #[serde(rename = "verification_level_1")]
    VerificationLevel1,
    #[serde(rename = "verification_level_2")]
    VerificationLevel2,
    #[serde(rename = "verification_level_3")]
    VerificationLevel3,
    StaffReview,
    AwaitingSdo,
    Approved,
    Rejected,
    AdditionalInfoNeeded,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 10] = [
        ApplicationStatus::Pending,
        ApplicationStatus::DocumentVerification,
        ApplicationStatus::VerificationLevel1,
        ApplicationStatus::VerificationLevel2,
        ApplicationStatus::VerificationLevel3,
        ApplicationStatus::StaffReview,
        ApplicationStatus::AwaitingSdo,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::AdditionalInfoNeeded,
    ];

    /// Stages an information request can be raised from and returned to.
    pub const ACTIVE: [ApplicationStatus; 7] = [
        ApplicationStatus::Pending,
        ApplicationStatus::DocumentVerification,
        ApplicationStatus::VerificationLevel1,
        ApplicationStatus::VerificationLevel2,
        ApplicationStatus::VerificationLevel3,
        ApplicationStatus::StaffReview,
        ApplicationStatus::AwaitingSdo,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::DocumentVerification => "document_verification",
            ApplicationStatus::VerificationLevel1 => "verification_level_1",
            ApplicationStatus::VerificationLevel2 => "verification_level_2",
            ApplicationStatus::VerificationLevel3 => "verification_level_3",
            ApplicationStatus::StaffReview => "staff_review",
            ApplicationStatus::AwaitingSdo => "awaiting_sdo",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::AdditionalInfoNeeded => "additional_info_needed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved | ApplicationStatus::Rejected
        )
    }

    pub const fn is_active(self) -> bool {
        !self.is_terminal() && !matches!(self, ApplicationStatus::AdditionalInfoNeeded)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.label() == value.trim())
            .ok_or_else(|| UnknownLabel(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised label '{0}'")]
pub struct UnknownLabel(pub String);

/// The acting user together with the role they are exercising for this call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role,
        }
    }
}

/// Identity and contact details captured on the intake form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub full_name: String,
    pub guardian_name: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub phone_number: String,
    pub email: String,
}

/// Validated intake payload as produced by the application form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub owner: UserId,
    pub certificate_type: CertificateType,
    pub applicant: ApplicantDetails,
    pub purpose: String,
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// Time and actor recorded when a stage is first reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMark {
    pub at: DateTime<Utc>,
    pub by: UserId,
}

/// Per-stage completion marks. Each slot is written at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimestamps {
    pub clerk_verified: Option<StageMark>,
    pub verification_1: Option<StageMark>,
    pub verification_2: Option<StageMark>,
    pub verification_3: Option<StageMark>,
    pub staff_reviewed: Option<StageMark>,
    pub forwarded_to_sdo: Option<StageMark>,
    pub approved: Option<StageMark>,
    pub rejected: Option<StageMark>,
}

impl StageTimestamps {
    fn slot_mut(&mut self, status: ApplicationStatus) -> Option<&mut Option<StageMark>> {
        match status {
            ApplicationStatus::DocumentVerification => Some(&mut self.clerk_verified),
            ApplicationStatus::VerificationLevel1 => Some(&mut self.verification_1),
            ApplicationStatus::VerificationLevel2 => Some(&mut self.verification_2),
            ApplicationStatus::VerificationLevel3 => Some(&mut self.verification_3),
            ApplicationStatus::StaffReview => Some(&mut self.staff_reviewed),
            ApplicationStatus::AwaitingSdo => Some(&mut self.forwarded_to_sdo),
            ApplicationStatus::Approved => Some(&mut self.approved),
            ApplicationStatus::Rejected => Some(&mut self.rejected),
            ApplicationStatus::Pending | ApplicationStatus::AdditionalInfoNeeded => None,
        }
    }

    pub fn get(&self, status: ApplicationStatus) -> Option<&StageMark> {
        match status {
            ApplicationStatus::DocumentVerification => self.clerk_verified.as_ref(),
            ApplicationStatus::VerificationLevel1 => self.verification_1.as_ref(),
            ApplicationStatus::VerificationLevel2 => self.verification_2.as_ref(),
            ApplicationStatus::VerificationLevel3 => self.verification_3.as_ref(),
            ApplicationStatus::StaffReview => self.staff_reviewed.as_ref(),
            ApplicationStatus::AwaitingSdo => self.forwarded_to_sdo.as_ref(),
            ApplicationStatus::Approved => self.approved.as_ref(),
            ApplicationStatus::Rejected => self.rejected.as_ref(),
            ApplicationStatus::Pending | ApplicationStatus::AdditionalInfoNeeded => None,
        }
    }

    /// Record the first arrival at `status`; returns false when the slot was already set.
    pub fn stamp(&mut self, status: ApplicationStatus, by: &UserId, at: DateTime<Utc>) -> bool {
        match self.slot_mut(status) {
            Some(slot) if slot.is_none() => {
                *slot = Some(StageMark { at, by: by.clone() });
                true
            }
            _ => false,
        }
    }

    /// True when every mark present in `earlier` is unchanged here.
    pub fn preserves(&self, earlier: &StageTimestamps) -> bool {
        ApplicationStatus::ALL.into_iter().all(|status| {
            match (earlier.get(status), self.get(status)) {
                (Some(before), Some(after)) => before == after,
                (Some(_), None) => false,
                (None, _) => true,
            }
        })
    }
}

/// A single certificate request tracked through the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub code: ApplicationCode,
    pub owner: UserId,
    pub certificate_type: CertificateType,
    pub applicant: ApplicantDetails,
    pub purpose: String,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stages: StageTimestamps,
    pub rejection_reason: Option<String>,
    pub additional_info: Option<String>,
    pub info_requested_from: Option<ApplicationStatus>,
    pub info_requested_at: Option<DateTime<Utc>>,
}

impl Application {
    /// Check the record-level invariants that must hold before any write.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        match (self.status, self.rejection_reason.as_deref()) {
            (ApplicationStatus::Rejected, None) => {
                return Err(InvariantViolation::RejectionReasonMissing)
            }
            (ApplicationStatus::Rejected, Some(reason)) if reason.trim().is_empty() => {
                return Err(InvariantViolation::RejectionReasonMissing)
            }
            (ApplicationStatus::Rejected, Some(_)) => {}
            (_, Some(_)) => return Err(InvariantViolation::UnexpectedRejectionReason),
            (_, None) => {}
        }

        let waiting = self.status == ApplicationStatus::AdditionalInfoNeeded;
        if waiting != self.info_requested_from.is_some() {
            return Err(InvariantViolation::InfoRequestOrigin);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("rejected applications must carry a non-empty rejection reason")]
    RejectionReasonMissing,
    #[error("only rejected applications may carry a rejection reason")]
    UnexpectedRejectionReason,
    #[error("information request origin must be recorded exactly while awaiting information")]
    InfoRequestOrigin,
}

/// Kind of supporting file accepted at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    IdentityProof,
    AddressProof,
    IncomeProof,
    CasteProof,
    Other,
}

/// Upload metadata supplied by the document store once a file is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub document_name: String,
    pub document_type: DocumentType,
    pub file_path: String,
    pub file_size: u64,
    pub content_type: String,
}

/// Supporting document attached to an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub document_name: String,
    pub document_type: DocumentType,
    pub file_path: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Fields fed to the signature, frozen into the certificate at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFields {
    pub application_code: ApplicationCode,
    pub full_name: String,
    pub guardian_name: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub purpose: String,
    pub certificate_type: CertificateType,
}

impl From<&Application> for CanonicalFields {
    fn from(application: &Application) -> Self {
        Self {
            application_code: application.code.clone(),
            full_name: application.applicant.full_name.clone(),
            guardian_name: application.applicant.guardian_name.clone(),
            date_of_birth: application.applicant.date_of_birth,
            address: application.applicant.address.clone(),
            purpose: application.purpose.clone(),
            certificate_type: application.certificate_type,
        }
    }
}

/// Human-facing certificate number, e.g. `CERT2024001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateNumber(pub String);

impl fmt::Display for CertificateNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable signed record produced on final approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub application_id: ApplicationId,
    pub certificate_number: CertificateNumber,
    pub certificate_type: CertificateType,
    pub issued_to: String,
    pub issued_at: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub snapshot: CanonicalFields,
    pub digital_signature: String,
}

impl Certificate {
    /// Perpetual without an expiry, otherwise valid strictly before it.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.valid_until {
            None => true,
            Some(expiry) => now < expiry,
        }
    }
}
