use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::certificates::domain::{ApplicationStatus, CertificateType};
use crate::workflows::certificates::engine::WorkflowEngine;
use crate::workflows::certificates::router::certificate_router;

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(payload).expect("serialize")))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

fn transition_body(user: &str, role: &str, from: &str, to: &str) -> Value {
    json!({
        "actor": { "user_id": user, "role": role },
        "expected_status": from,
        "requested_status": to,
    })
}

#[tokio::test]
async fn submit_route_creates_pending_applications() {
    let (engine, _, _) = build_engine();
    let router = certificate_router(Arc::new(engine));

    let payload = serde_json::to_value(submission(CertificateType::Income)).expect("json");
    let response = router
        .oneshot(post_json("/api/v1/applications", &payload))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["certificate_type"], "income");
    assert!(body["application_code"]
        .as_str()
        .is_some_and(|code| code.starts_with("APP")));
}

#[tokio::test]
async fn submit_route_rejects_invalid_intake() {
    let (engine, _, _) = build_engine();
    let router = certificate_router(Arc::new(engine));

    let mut invalid = submission(CertificateType::Income);
    invalid.applicant.email = "not-an-email".to_string();
    let payload = serde_json::to_value(invalid).expect("json");
    let response = router
        .oneshot(post_json("/api/v1/applications", &payload))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn transition_route_maps_workflow_errors() {
    let (engine, _, _) = build_engine();
    let engine = Arc::new(engine);
    let application = submitted(&engine, CertificateType::Caste);
    let uri = format!("/api/v1/applications/{}/transitions", application.id);
    let router = certificate_router(engine.clone());

    let skipped = router
        .clone()
        .oneshot(post_json(
            &uri,
            &transition_body(STAFF, "staff_officer", "pending", "staff_review"),
        ))
        .await
        .expect("router responds");
    assert_eq!(skipped.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let forbidden = router
        .clone()
        .oneshot(post_json(
            &uri,
            &transition_body(CITIZEN, "citizen", "pending", "document_verification"),
        ))
        .await
        .expect("router responds");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let accepted = router
        .clone()
        .oneshot(post_json(
            &uri,
            &transition_body(CLERK, "clerk", "pending", "document_verification"),
        ))
        .await
        .expect("router responds");
    assert_eq!(accepted.status(), StatusCode::OK);
    let body = read_json_body(accepted).await;
    assert_eq!(body["application"]["status"], "document_verification");
    assert_eq!(body["notified"], true);

    let stale = router
        .clone()
        .oneshot(post_json(
            &uri,
            &transition_body(CLERK, "clerk", "pending", "document_verification"),
        ))
        .await
        .expect("router responds");
    assert_eq!(stale.status(), StatusCode::CONFLICT);
    let body = read_json_body(stale).await;
    assert_eq!(body["current_status"], "document_verification");

    let reasonless = router
        .oneshot(post_json(
            &uri,
            &transition_body(CLERK, "clerk", "document_verification", "rejected"),
        ))
        .await
        .expect("router responds");
    assert_eq!(reasonless.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approval_over_http_exposes_the_certificate() {
    let (engine, _, _) = build_engine();
    let engine = Arc::new(engine);
    let application = submitted(&engine, CertificateType::Income);
    to_awaiting_sdo(&engine, &application.id).await;
    let router = certificate_router(engine.clone());

    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/applications/{}/transitions", application.id),
            &transition_body(SDO, "sdo", "awaiting_sdo", "approved"),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let number = body["certificate"]["certificate_number"]
        .as_str()
        .expect("certificate number")
        .to_string();
    assert_eq!(body["application"]["certificate_number"], number.as_str());

    let status = router
        .clone()
        .oneshot(get(&format!("/api/v1/applications/{}", application.id)))
        .await
        .expect("router responds");
    assert_eq!(status.status(), StatusCode::OK);
    let body = read_json_body(status).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["certificate_number"], number.as_str());

    let verified = router
        .clone()
        .oneshot(get(&format!("/api/v1/certificates/verify/{number}")))
        .await
        .expect("router responds");
    assert_eq!(verified.status(), StatusCode::OK);
    let body = read_json_body(verified).await;
    assert_eq!(body["issued_to"], "Asha Verma");
    assert_eq!(body["valid"], true);
    assert_eq!(body["signature_intact"], true);

    let missing = router
        .oneshot(get("/api/v1/certificates/verify/CERT2024999"))
        .await
        .expect("router responds");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn document_routes_attach_and_list() {
    let (engine, _, _) = build_engine();
    let engine = Arc::new(engine);
    let application = engine
        .submit(submission(CertificateType::Residence))
        .expect("submits");
    let uri = format!("/api/v1/applications/{}/documents", application.id);
    let router = certificate_router(engine.clone());

    let mut payload = serde_json::to_value(descriptor()).expect("json");
    payload["uploader"] = json!(CITIZEN);
    let created = router
        .clone()
        .oneshot(post_json(&uri, &payload))
        .await
        .expect("router responds");
    assert_eq!(created.status(), StatusCode::CREATED);

    payload["uploader"] = json!(OTHER_CITIZEN);
    let foreign = router
        .clone()
        .oneshot(post_json(&uri, &payload))
        .await
        .expect("router responds");
    assert_eq!(foreign.status(), StatusCode::FORBIDDEN);

    let listed = router.oneshot(get(&uri)).await.expect("router responds");
    assert_eq!(listed.status(), StatusCode::OK);
    let body = read_json_body(listed).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["document_type"], "income_proof");
}

#[tokio::test]
async fn queue_route_lists_actionable_applications() {
    let (engine, _, _) = build_engine();
    let engine = Arc::new(engine);
    let application = submitted(&engine, CertificateType::Income);
    to_awaiting_sdo(&engine, &application.id).await;
    let router = certificate_router(engine.clone());

    let queue = router
        .clone()
        .oneshot(get("/api/v1/queues/sdo"))
        .await
        .expect("router responds");
    assert_eq!(queue.status(), StatusCode::OK);
    let body = read_json_body(queue).await;
    assert_eq!(body[0]["status"], ApplicationStatus::AwaitingSdo.label());

    let unknown = router
        .oneshot(get("/api/v1/queues/collector"))
        .await
        .expect("router responds");
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_applications_are_not_found() {
    let (engine, _, _) = build_engine();
    let router = certificate_router(Arc::new(engine));

    let response = router
        .oneshot(get(&format!(
            "/api/v1/applications/{}",
            crate::workflows::certificates::domain::ApplicationId::new()
        )))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repository_outage_is_service_unavailable() {
    let engine = WorkflowEngine::new(
        Arc::new(UnavailableStore),
        Arc::new(roles()),
        Arc::new(FailingNotifier),
        &issuance_config(),
        &notification_config(),
    )
    .expect("engine builds");
    let router = certificate_router(Arc::new(engine));

    let payload = serde_json::to_value(submission(CertificateType::Income)).expect("json");
    let response = router
        .clone()
        .oneshot(post_json("/api/v1/applications", &payload))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let verify = router
        .oneshot(get("/api/v1/certificates/verify/CERT2024001"))
        .await
        .expect("router responds");
    assert_eq!(verify.status(), StatusCode::SERVICE_UNAVAILABLE);
}
