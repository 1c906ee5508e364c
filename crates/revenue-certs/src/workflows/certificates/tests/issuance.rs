use super::common::*;
use crate::workflows::certificates::domain::{
    ApplicationStatus, CanonicalFields, CertificateType, Role,
};
use crate::workflows::certificates::engine::WorkflowError;
use crate::workflows::certificates::issuer::{CertificateIssuer, CertificateSigner, IssuanceError};
use crate::workflows::certificates::memory::InMemoryStore;
use crate::workflows::certificates::repository::CertificateRegistry;
use crate::workflows::certificates::verifier::VerificationError;
use chrono::{Datelike, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

#[tokio::test]
async fn sdo_approval_issues_a_reproducible_certificate() {
    let (engine, store, _) = build_engine();
    let (application, certificate) = approved(&engine, CertificateType::Income).await;

    assert_eq!(application.status, ApplicationStatus::Approved);
    assert!(application.stages.approved.is_some());
    assert_eq!(certificate.application_id, application.id);
    assert_eq!(certificate.certificate_type, CertificateType::Income);
    assert_eq!(certificate.issued_to, "Asha Verma");
    assert!(!certificate.digital_signature.is_empty());

    let stored = store
        .by_application(&application.id)
        .expect("registry read")
        .expect("certificate exists right after approval");
    assert_eq!(stored, certificate);

    let recomputed = CertificateSigner::new(issuance_config().signing_key)
        .expect("signer")
        .sign(&CanonicalFields::from(&application));
    assert_eq!(recomputed, certificate.digital_signature);
    assert_eq!(certificate.snapshot, CanonicalFields::from(&application));
}

#[tokio::test]
async fn certificate_numbers_follow_the_yearly_sequence() {
    let (engine, _, _) = build_engine();
    let year = Utc::now().year();

    let mut numbers = BTreeSet::new();
    for expected_serial in 1..=3 {
        let (_, certificate) = approved(&engine, CertificateType::Caste).await;
        assert_eq!(
            certificate.certificate_number.0,
            format!("CERT{year}{expected_serial:03}")
        );
        numbers.insert(certificate.certificate_number);
    }
    assert_eq!(numbers.len(), 3);
}

#[tokio::test]
async fn validity_window_comes_from_configuration() {
    let (engine, _, _) = build_engine();

    let (_, income) = approved(&engine, CertificateType::Income).await;
    assert_eq!(
        income.valid_until,
        Some(income.issued_at + Duration::days(365))
    );

    let (_, caste) = approved(&engine, CertificateType::Caste).await;
    assert!(caste.valid_until.is_none());
}

#[tokio::test]
async fn issue_is_idempotent_per_application() {
    let (engine, store, _) = build_engine();
    let (application, certificate) = approved(&engine, CertificateType::Residence).await;

    let again = engine.issuer().issue(&application).expect("second issue");
    assert_eq!(again, certificate);
    assert_eq!(store.certificate_count().expect("count"), 1);
}

#[tokio::test]
async fn issuing_requires_approval() {
    let (engine, _, _) = build_engine();
    let application = submitted(&engine, CertificateType::Income);

    match engine.issuer().issue(&application) {
        Err(IssuanceError::NotApproved(status)) => assert_eq!(status, ApplicationStatus::Pending),
        other => panic!("expected not approved, got {other:?}"),
    }
}

#[tokio::test]
async fn approval_fails_whole_when_the_certificate_cannot_be_written() {
    let (engine, store, _) = build_engine();
    let application = submitted(&engine, CertificateType::Domicile);
    to_awaiting_sdo(&engine, &application.id).await;

    // Another writer already claimed the number the next approval would use.
    let mut approved_copy = engine.get(&application.id).expect("present");
    approved_copy.status = ApplicationStatus::Approved;
    let year = Utc::now().year();
    let squatter_issuer =
        CertificateIssuer::new(Arc::new(InMemoryStore::default()), &issuance_config())
            .expect("issuer");
    let mut squatter = squatter_issuer
        .issue(&approved_copy)
        .expect("issue on a scratch registry");
    squatter.application_id = crate::workflows::certificates::domain::ApplicationId::new();
    assert_eq!(squatter.certificate_number.0, format!("CERT{year}001"));
    store
        .insert_certificate(squatter)
        .expect("claim the first number");

    let result = engine
        .transition(
            &application.id,
            request(
                SDO,
                Role::Sdo,
                ApplicationStatus::AwaitingSdo,
                ApplicationStatus::Approved,
            ),
        )
        .await;
    assert!(matches!(result, Err(WorkflowError::IssuanceFailure(_))));

    let stored = engine.get(&application.id).expect("present");
    assert_eq!(stored.status, ApplicationStatus::AwaitingSdo);
    assert!(stored.stages.approved.is_none());
    assert!(engine
        .certificate_for(&application.id)
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn verifier_finds_issued_certificates() {
    let (engine, _, _) = build_engine();
    let (_, certificate) = approved(&engine, CertificateType::Income).await;
    let verifier = engine.verifier();

    let padded = format!("  {}\n", certificate.certificate_number);
    let verified = verifier.verify(&padded).expect("certificate found");
    assert_eq!(verified.certificate_number, certificate.certificate_number);
    assert_eq!(verified.issued_to, certificate.issued_to);
    assert!(verified.valid);
    assert!(verified.signature_intact);

    let after_expiry = certificate.issued_at + Duration::days(400);
    let expired = verifier
        .verify_at(&certificate.certificate_number.0, after_expiry)
        .expect("still found after expiry");
    assert!(!expired.valid);
}

#[tokio::test]
async fn verifier_reports_unknown_numbers() {
    let (engine, _, _) = build_engine();
    approved(&engine, CertificateType::Income).await;

    match engine.verifier().verify("CERT2024999") {
        Err(VerificationError::NotFound(number)) => assert_eq!(number, "CERT2024999"),
        other => panic!("expected not found, got {other:?}"),
    }

    let year = Utc::now().year();
    assert!(matches!(
        engine.verifier().verify(&format!("cert{year}001")),
        Err(VerificationError::NotFound(_))
    ));
}

#[tokio::test]
async fn tampered_snapshot_breaks_the_signature() {
    let (engine, store, _) = build_engine();
    let (application, mut certificate) = approved(&engine, CertificateType::Income).await;

    let signer = engine.issuer().signer().clone();
    assert!(signer.verify(&certificate.snapshot, &certificate.digital_signature));

    certificate.snapshot.full_name = "Someone Else".to_string();
    assert!(!signer.verify(&certificate.snapshot, &certificate.digital_signature));

    // The registry copy is untouched.
    let stored = store
        .by_application(&application.id)
        .expect("read")
        .expect("present");
    assert!(signer.verify(&stored.snapshot, &stored.digital_signature));
}
