use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, info};

use crate::config::IssuanceConfig;

use super::domain::{
    Application, ApplicationStatus, CanonicalFields, Certificate, CertificateNumber,
    CertificateType,
};
use super::repository::{CertificateRegistry, RepositoryError};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "SIG";
const MIN_SERIAL_WIDTH: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("signing key must not be empty")]
    EmptySigningKey,
    #[error("application is {0}; certificates are issued only on approval")]
    NotApproved(ApplicationStatus),
    #[error("certificate registry failed: {0}")]
    Registry(#[from] RepositoryError),
}

/// HMAC-SHA256 signer keyed by the department key.
#[derive(Clone)]
pub struct CertificateSigner {
    key: Arc<[u8]>,
}

impl CertificateSigner {
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, IssuanceError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(IssuanceError::EmptySigningKey);
        }
        Ok(Self { key: key.into() })
    }

    fn mac(&self, fields: &CanonicalFields) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");

        let date_of_birth = fields.date_of_birth.format("%Y-%m-%d").to_string();
        let parts: [&str; 7] = [
            &fields.application_code.0,
            &fields.full_name,
            &fields.guardian_name,
            &date_of_birth,
            &fields.address,
            &fields.purpose,
            fields.certificate_type.label(),
        ];
        for part in parts {
            mac.update(&(part.len() as u32).to_be_bytes());
            mac.update(part.as_bytes());
        }
        mac
    }

    /// Deterministic signature string over the canonical fields.
    pub fn sign(&self, fields: &CanonicalFields) -> String {
        let digest = self.mac(fields).finalize().into_bytes();
        format!("{SIGNATURE_PREFIX}{}", hex::encode_upper(digest))
    }

    /// Recompute the signature and compare in constant time.
    pub fn verify(&self, fields: &CanonicalFields, signature: &str) -> bool {
        let Some(encoded) = signature.strip_prefix(SIGNATURE_PREFIX) else {
            return false;
        };
        let Ok(bytes) = hex::decode(encoded) else {
            return false;
        };
        self.mac(fields).verify_slice(&bytes).is_ok()
    }
}

impl std::fmt::Debug for CertificateSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateSigner").finish_non_exhaustive()
    }
}

/// Format `<prefix><YYYY><serial>` with the serial zero-padded to three digits.
pub fn format_certificate_number(prefix: &str, year: i32, serial: u64) -> CertificateNumber {
    CertificateNumber(format!(
        "{prefix}{year:04}{serial:0width$}",
        width = MIN_SERIAL_WIDTH
    ))
}

/// Result of preparing a certificate for an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issuance {
    /// A certificate already exists; nothing new may be written.
    Existing(Certificate),
    /// A freshly synthesized certificate that still has to be persisted.
    Prepared(Certificate),
}

/// Synthesizes signed certificates for approved applications.
pub struct CertificateIssuer<C> {
    registry: Arc<C>,
    signer: CertificateSigner,
    number_prefix: String,
    validity_days: BTreeMap<CertificateType, u32>,
}

impl<C> CertificateIssuer<C>
where
    C: CertificateRegistry,
{
    pub fn new(registry: Arc<C>, config: &IssuanceConfig) -> Result<Self, IssuanceError> {
        Ok(Self {
            registry,
            signer: CertificateSigner::new(config.signing_key.as_bytes())?,
            number_prefix: config.number_prefix.clone(),
            validity_days: config.validity_days.clone(),
        })
    }

    pub fn signer(&self) -> &CertificateSigner {
        &self.signer
    }

    /// Build the certificate an approval of `application` would produce at `issued_at`.
    ///
    /// Short-circuits to the stored certificate when one already exists, so a caller never
    /// persists a second row for the same application.
    pub fn prepare(
        &self,
        application: &Application,
        issued_at: DateTime<Utc>,
    ) -> Result<Issuance, IssuanceError> {
        if let Some(existing) = self.registry.by_application(&application.id)? {
            debug!(
                application = %application.code,
                number = %existing.certificate_number,
                "certificate already issued"
            );
            return Ok(Issuance::Existing(existing));
        }

        let year = issued_at.year();
        let serial = self.registry.next_serial(year)?;
        let snapshot = CanonicalFields::from(application);
        let digital_signature = self.signer.sign(&snapshot);
        let valid_until = self
            .validity_days
            .get(&application.certificate_type)
            .map(|days| issued_at + Duration::days(i64::from(*days)));

        Ok(Issuance::Prepared(Certificate {
            application_id: application.id,
            certificate_number: format_certificate_number(&self.number_prefix, year, serial),
            certificate_type: application.certificate_type,
            issued_to: application.applicant.full_name.clone(),
            issued_at,
            valid_until,
            snapshot,
            digital_signature,
        }))
    }

    /// Issue and persist the certificate for an approved application.
    ///
    /// Idempotent: a second call returns the certificate written by the first.
    pub fn issue(&self, application: &Application) -> Result<Certificate, IssuanceError> {
        self.issue_at(application, Utc::now())
    }

    pub fn issue_at(
        &self,
        application: &Application,
        issued_at: DateTime<Utc>,
    ) -> Result<Certificate, IssuanceError> {
        if application.status != ApplicationStatus::Approved {
            return Err(IssuanceError::NotApproved(application.status));
        }

        match self.prepare(application, issued_at)? {
            Issuance::Existing(certificate) => Ok(certificate),
            Issuance::Prepared(certificate) => {
                let stored = self.registry.insert_certificate(certificate)?;
                info!(
                    application = %application.code,
                    number = %stored.certificate_number,
                    "certificate issued"
                );
                Ok(stored)
            }
        }
    }
}
