use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Certificate, CertificateNumber, CertificateType};
use super::issuer::CertificateSigner;
use super::repository::{CertificateRegistry, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("no certificate with number '{0}'")]
    NotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of a public certificate lookup.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedCertificate {
    pub certificate_number: CertificateNumber,
    pub certificate_type: CertificateType,
    pub issued_to: String,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    pub digital_signature: String,
    /// Derived from the expiry alone.
    pub valid: bool,
    /// Whether the stored signature still matches the frozen canonical fields.
    pub signature_intact: bool,
    #[serde(skip)]
    pub certificate: Certificate,
}

/// Read-only lookup over issued certificates.
pub struct CertificateVerifier<C> {
    registry: Arc<C>,
    signer: CertificateSigner,
}

impl<C> CertificateVerifier<C>
where
    C: CertificateRegistry,
{
    pub fn new(registry: Arc<C>, signer: CertificateSigner) -> Self {
        Self { registry, signer }
    }

    pub fn verify(
        &self,
        certificate_number: &str,
    ) -> Result<VerifiedCertificate, VerificationError> {
        self.verify_at(certificate_number, Utc::now())
    }

    /// Exact-match lookup evaluated as of `now`.
    pub fn verify_at(
        &self,
        certificate_number: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedCertificate, VerificationError> {
        let number = certificate_number.trim();
        let certificate = self
            .registry
            .by_number(number)?
            .ok_or_else(|| VerificationError::NotFound(number.to_string()))?;

        Ok(VerifiedCertificate {
            certificate_number: certificate.certificate_number.clone(),
            certificate_type: certificate.certificate_type,
            issued_to: certificate.issued_to.clone(),
            issued_at: certificate.issued_at,
            valid_until: certificate.valid_until,
            digital_signature: certificate.digital_signature.clone(),
            valid: certificate.is_valid_at(now),
            signature_intact: self
                .signer
                .verify(&certificate.snapshot, &certificate.digital_signature),
            certificate,
        })
    }
}
