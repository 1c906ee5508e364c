use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

use super::domain::{
    Application, ApplicationCode, ApplicationId, ApplicationStatus, ApplicationSubmission,
    DocumentDescriptor, DocumentRecord, StageTimestamps,
};

/// Validation errors raised while turning an intake payload into an application.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntakeViolation {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("email address '{0}' is not valid")]
    InvalidEmail(String),
    #[error("phone number must contain 10 to 15 digits")]
    InvalidPhone,
    #[error("date of birth cannot be in the future")]
    FutureDateOfBirth,
}

/// Validation errors for document metadata.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocumentViolation {
    #[error("document name must not be empty")]
    MissingName,
    #[error("file path must not be empty")]
    MissingPath,
    #[error("file is {found} bytes, limit is {limit}")]
    TooLarge { limit: u64, found: u64 },
    #[error("content type '{0}' is not accepted")]
    UnsupportedContentType(String),
}

/// Upper bound for a single supporting file.
pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

const DOC_SUBTYPE: &str = "msword";
const DOCX_SUBTYPE: &str = "vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Source of human-readable application codes.
pub trait ApplicationCodeSource: Send + Sync {
    fn next_code(&self, submitted_at: DateTime<Utc>) -> ApplicationCode;
}

/// Process-local sequence producing `APP<year><6-digit sequence>`.
#[derive(Debug)]
pub struct SequentialCodes {
    next: AtomicU64,
}

impl SequentialCodes {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialCodes {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl ApplicationCodeSource for SequentialCodes {
    fn next_code(&self, submitted_at: DateTime<Utc>) -> ApplicationCode {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        ApplicationCode(format!("APP{}{sequence:06}", submitted_at.year()))
    }
}

/// Guard responsible for producing fresh `pending` applications.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard;

impl IntakeGuard {
    /// Convert an inbound submission into a stored-ready application.
    pub fn application_from_submission(
        &self,
        submission: ApplicationSubmission,
        code: ApplicationCode,
        now: DateTime<Utc>,
    ) -> Result<Application, IntakeViolation> {
        let ApplicationSubmission {
            owner,
            certificate_type,
            mut applicant,
            purpose,
            additional_info,
        } = submission;

        if owner.0.trim().is_empty() {
            return Err(IntakeViolation::MissingField("owner"));
        }

        applicant.full_name = required(applicant.full_name, "full_name")?;
        applicant.guardian_name = required(applicant.guardian_name, "guardian_name")?;
        applicant.address = required(applicant.address, "address")?;
        let purpose = required(purpose, "purpose")?;

        applicant.email = applicant.email.trim().to_string();
        if !is_plausible_email(&applicant.email) {
            return Err(IntakeViolation::InvalidEmail(applicant.email));
        }

        applicant.phone_number = applicant.phone_number.trim().to_string();
        if !is_plausible_phone(&applicant.phone_number) {
            return Err(IntakeViolation::InvalidPhone);
        }

        if applicant.date_of_birth > now.date_naive() {
            return Err(IntakeViolation::FutureDateOfBirth);
        }

        let additional_info = additional_info
            .map(|info| info.trim().to_string())
            .filter(|info| !info.is_empty());

        Ok(Application {
            id: ApplicationId::new(),
            code,
            owner,
            certificate_type,
            applicant,
            purpose,
            status: ApplicationStatus::Pending,
            submitted_at: now,
            updated_at: now,
            stages: StageTimestamps::default(),
            rejection_reason: None,
            additional_info,
            info_requested_from: None,
            info_requested_at: None,
        })
    }

    /// Validate upload metadata and bind it to an application.
    pub fn document_from_descriptor(
        &self,
        application_id: ApplicationId,
        descriptor: DocumentDescriptor,
        now: DateTime<Utc>,
    ) -> Result<DocumentRecord, DocumentViolation> {
        let document_name = descriptor.document_name.trim().to_string();
        if document_name.is_empty() {
            return Err(DocumentViolation::MissingName);
        }
        if descriptor.file_path.trim().is_empty() {
            return Err(DocumentViolation::MissingPath);
        }
        if descriptor.file_size > MAX_DOCUMENT_BYTES {
            return Err(DocumentViolation::TooLarge {
                limit: MAX_DOCUMENT_BYTES,
                found: descriptor.file_size,
            });
        }
        if !is_accepted_content_type(&descriptor.content_type) {
            return Err(DocumentViolation::UnsupportedContentType(
                descriptor.content_type,
            ));
        }

        Ok(DocumentRecord {
            id: Uuid::new_v4(),
            application_id,
            document_name,
            document_type: descriptor.document_type,
            file_path: descriptor.file_path,
            file_size: descriptor.file_size,
            uploaded_at: now,
        })
    }
}

fn required(value: String, field: &'static str) -> Result<String, IntakeViolation> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(IntakeViolation::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        _ => false,
    }
}

fn is_plausible_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let digits: String = digits.chars().filter(|ch| *ch != ' ' && *ch != '-').collect();
    (10..=15).contains(&digits.len()) && digits.chars().all(|ch| ch.is_ascii_digit())
}

fn is_accepted_content_type(raw: &str) -> bool {
    let Ok(parsed) = raw.trim().parse::<mime::Mime>() else {
        return false;
    };

    let subtype = parsed.subtype();
    if parsed.type_() == mime::IMAGE {
        // Unregistered `image/jpg` is still sent by some clients.
        return matches!(subtype.as_str(), "jpeg" | "jpg" | "png");
    }

    parsed.type_() == mime::APPLICATION
        && matches!(subtype.as_str(), "pdf" | DOC_SUBTYPE | DOCX_SUBTYPE)
}
