use crate::infra::{demo_engine, DemoEngine};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use revenue_certs::error::AppError;
use revenue_certs::workflows::certificates::{
    Actor, ApplicantDetails, ApplicationStatus, ApplicationSubmission, Certificate,
    CertificateType, DocumentDescriptor, DocumentType, InMemoryNotificationOutbox, Role,
    TransitionRequest, UserId, VerificationError, VerifiedCertificate,
};
use std::sync::Arc;

const DEMO_APPLICANT: &str = "citizen-demo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum DemoCertificate {
    Caste,
    #[default]
    Income,
    Domicile,
    Residence,
}

impl From<DemoCertificate> for CertificateType {
    fn from(value: DemoCertificate) -> Self {
        match value {
            DemoCertificate::Caste => CertificateType::Caste,
            DemoCertificate::Income => CertificateType::Income,
            DemoCertificate::Domicile => CertificateType::Domicile,
            DemoCertificate::Residence => CertificateType::Residence,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Certificate type requested by the demo applicant.
    #[arg(long, value_enum, default_value_t = DemoCertificate::Income)]
    pub(crate) certificate_type: DemoCertificate,
    /// Route the application through all three verification officers instead of the clerk desk.
    #[arg(long)]
    pub(crate) full_verification: bool,
    /// Pause for an information request at staff review before approval.
    #[arg(long)]
    pub(crate) request_info: bool,
}

#[derive(Args, Debug)]
pub(crate) struct VerifyArgs {
    /// Certificate number to look up, for example CERT2024001.
    #[arg(long)]
    pub(crate) number: String,
    /// Number of demo applications approved before the lookup.
    #[arg(long, default_value_t = 1)]
    pub(crate) issued: u32,
}

/// What a scripted run produced.
pub(crate) struct DemoRun {
    pub(crate) engine: DemoEngine,
    pub(crate) outbox: Arc<InMemoryNotificationOutbox>,
    pub(crate) certificates: Vec<Certificate>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Revenue certificate workflow demo");
    let run = script(&args, 1).await?;

    for certificate in &run.certificates {
        let verified = run.engine.verifier().verify(&certificate.certificate_number.0);
        render_verification(&certificate.certificate_number.0, verified);
    }

    println!("\nNotifications sent");
    for notice in run.outbox.events() {
        println!(
            "- {} -> {} ({})",
            notice.application_id, notice.status, notice.user_email
        );
    }

    let counts = run.engine.status_counts()?;
    println!("\nApplications by status");
    for (status, count) in counts.into_iter().filter(|(_, count)| *count > 0) {
        println!("- {status}: {count}");
    }
    Ok(())
}

pub(crate) async fn run_verify(args: VerifyArgs) -> Result<(), AppError> {
    let run = script(&DemoArgs::default(), args.issued.max(1)).await?;
    let result = run.engine.verifier().verify(&args.number);
    render_verification(&args.number, result);
    Ok(())
}

/// Submit and approve `count` applications, printing each step.
pub(crate) async fn script(args: &DemoArgs, count: u32) -> Result<DemoRun, AppError> {
    let outbox = Arc::new(InMemoryNotificationOutbox::default());
    let engine = demo_engine(outbox.clone())?;
    let mut certificates = Vec::new();

    for round in 1..=count {
        let application = engine.submit(submission(args.certificate_type.into(), round))?;
        println!(
            "\nSubmitted {} ({})",
            application.code, application.certificate_type
        );
        let document = engine.attach_document(
            &application.id,
            &UserId(DEMO_APPLICANT.to_string()),
            supporting_document(args.certificate_type.into()),
        )?;
        println!("  attached {}", document.document_name);

        for request in route(args) {
            let from = request.expected_status;
            let to = request.requested_status;
            let actor = request.actor.user_id.clone();
            engine.transition(&application.id, request).await?;
            println!("  {from} -> {to} by {actor}");
        }

        match engine.certificate_for(&application.id)? {
            Some(certificate) => {
                println!(
                    "  issued {} to {}",
                    certificate.certificate_number, certificate.issued_to
                );
                certificates.push(certificate);
            }
            None => println!("  no certificate recorded for {}", application.code),
        }
    }

    Ok(DemoRun {
        engine,
        outbox,
        certificates,
    })
}

fn route(args: &DemoArgs) -> Vec<TransitionRequest> {
    use ApplicationStatus::*;

    let mut steps = if args.full_verification {
        vec![
            step("vo1-demo", Role::VerificationOfficer1, Pending, VerificationLevel1),
            step("vo1-demo", Role::VerificationOfficer1, VerificationLevel1, VerificationLevel2),
            step("vo2-demo", Role::VerificationOfficer2, VerificationLevel2, VerificationLevel3),
            step("vo3-demo", Role::VerificationOfficer3, VerificationLevel3, StaffReview),
        ]
    } else {
        vec![
            step("clerk-demo", Role::Clerk, Pending, DocumentVerification),
            step("clerk-demo", Role::Clerk, DocumentVerification, StaffReview),
        ]
    };

    if args.request_info {
        let mut request = step("staff-demo", Role::StaffOfficer, StaffReview, AdditionalInfoNeeded);
        request.note = Some("Please upload a recent address proof".to_string());
        steps.push(request);
        steps.push(step(DEMO_APPLICANT, Role::Citizen, AdditionalInfoNeeded, StaffReview));
    }

    steps.push(step("staff-demo", Role::StaffOfficer, StaffReview, AwaitingSdo));
    steps.push(step("sdo-demo", Role::Sdo, AwaitingSdo, Approved));
    steps
}

fn step(
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

fn submission(certificate_type: CertificateType, round: u32) -> ApplicationSubmission {
    ApplicationSubmission {
        owner: UserId(DEMO_APPLICANT.to_string()),
        certificate_type,
        applicant: ApplicantDetails {
            full_name: format!("Demo Applicant {round}"),
            guardian_name: "Demo Guardian".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 15).unwrap_or_default(),
            address: "Tehsil Office Road, Sadar".to_string(),
            phone_number: "+91 90000 00000".to_string(),
            email: "applicant@example.in".to_string(),
        },
        purpose: "Demonstration".to_string(),
        additional_info: None,
    }
}

fn supporting_document(certificate_type: CertificateType) -> DocumentDescriptor {
    let document_type = match certificate_type {
        CertificateType::Caste => DocumentType::CasteProof,
        CertificateType::Income => DocumentType::IncomeProof,
        CertificateType::Domicile | CertificateType::Residence => DocumentType::AddressProof,
    };
    DocumentDescriptor {
        document_name: format!("{certificate_type} proof"),
        document_type,
        file_path: format!("demo/{certificate_type}-proof.pdf"),
        file_size: 64 * 1024,
        content_type: "application/pdf".to_string(),
    }
}

fn render_verification(number: &str, result: Result<VerifiedCertificate, VerificationError>) {
    match result {
        Ok(verified) => {
            println!("\nCertificate {}", verified.certificate_number);
            println!("  type: {}", verified.certificate_type);
            println!("  issued to: {}", verified.issued_to);
            println!("  issued at: {}", verified.issued_at.format("%Y-%m-%d %H:%M UTC"));
            match verified.valid_until {
                Some(expiry) => println!("  valid until: {}", expiry.format("%Y-%m-%d")),
                None => println!("  valid until: no expiry"),
            }
            println!("  valid: {}", if verified.valid { "yes" } else { "no" });
            println!(
                "  signature: {}",
                if verified.signature_intact {
                    "intact"
                } else {
                    "MISMATCH"
                }
            );
        }
        Err(VerificationError::NotFound(_)) => {
            println!("\nCertificate {} not found", number.trim());
        }
        Err(err) => println!("\nVerification unavailable: {err}"),
    }
}
