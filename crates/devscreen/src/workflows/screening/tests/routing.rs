use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::screening::service::{ScreeningService, StartScreeningRequest};

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn start_route_creates_a_session() {
    let (service, _) = build_service();
    let router = screening_router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/screenings",
            json!({ "child_age_months": 20, "child_gender": "female" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["phase"], "initial");
    assert_eq!(body["age_group_label"], "16-30m");
    assert_eq!(body["estimated_total_questions"], 15);
    let questions = body["initial_questions"].as_array().expect("question list");
    assert_eq!(questions.len(), 5);
    assert!(questions[0].get("scoring_rule").is_none());
    assert_eq!(questions[0]["type"], "binary");
}

#[tokio::test]
async fn start_handler_returns_unprocessable_for_bad_age() {
    let (service, _) = build_service();

    let response = crate::workflows::screening::router::start_handler::<
        MemoryRepository,
        crate::workflows::screening::memory::InMemoryQuestionCatalog,
    >(
        State(Arc::new(service)),
        Ok(axum::Json(StartScreeningRequest {
            child_age_months: Some(-3),
            ..StartScreeningRequest::default()
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn answer_route_reports_next_question() {
    let (service, _) = build_service();
    let started = service
        .start_screening(start_request(20))
        .expect("session starts");
    let router = screening_router_with_service(service);

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/screenings/{}/answers", started.session_id),
            json!({ "question_id": "t-aut-1", "answer": false }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["completed"], false);
    assert_eq!(body["next_question"]["id"], "t-aut-2");
    assert_eq!(body["current_scores"]["autism"]["critical_count"], 1);
    assert!(body.get("phase_message").is_none());
}

#[tokio::test]
async fn malformed_answer_body_gets_a_json_error() {
    let (service, _) = build_service();
    let started = service
        .start_screening(start_request(20))
        .expect("session starts");
    let router = screening_router_with_service(service);

    let response = router
        .oneshot(
            Request::post(format!("/api/v1/screenings/{}/answers", started.session_id))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"question_id\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["retryable"], false);
    assert!(body["error"].as_str().is_some_and(|text| !text.is_empty()));
}

#[tokio::test]
async fn answer_route_returns_not_found_for_unknown_session() {
    let (service, _) = build_service();
    let router = screening_router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/screenings/scr-missing/answers",
            json!({ "question_id": "t-aut-1", "answer": "no" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn answer_handler_returns_conflict_on_concurrent_write() {
    let repository = Arc::new(ConflictRepository::default());
    let service = ScreeningService::new(repository, Arc::new(fixture_catalog()));
    let started = service
        .start_screening(start_request(20))
        .expect("session starts");

    let response = crate::workflows::screening::router::answer_handler(
        State(Arc::new(service)),
        Path(started.session_id.0.clone()),
        Ok(axum::Json(submission("t-aut-1", no()))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn status_route_returns_service_unavailable_when_store_is_down() {
    let service = ScreeningService::new(
        Arc::new(UnavailableRepository),
        Arc::new(fixture_catalog()),
    );
    let router = crate::workflows::screening::screening_router(Arc::new(service));

    let response = router.oneshot(get("/api/v1/screenings/scr-any")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn status_route_exposes_progress() {
    let (service, _) = build_service();
    let started = service
        .start_screening(start_request(40))
        .expect("session starts");
    service
        .submit_answer(&started.session_id, submission("p-aut-1", no()))
        .expect("answer accepted");
    let router = screening_router_with_service(service);

    let response = router
        .oneshot(get(&format!("/api/v1/screenings/{}", started.session_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["phase"], "initial");
    assert_eq!(body["answered_count"], 1);
    assert_eq!(body["completed"], false);
    assert_eq!(body["age_group_label"], "2.5-5y");
}

#[tokio::test]
async fn result_route_conflicts_until_completion() {
    let (service, _) = build_service();
    let started = service
        .start_screening(start_request(20))
        .expect("session starts");
    let router = screening_router_with_service(service);

    let response = router
        .oneshot(get(&format!("/api/v1/screenings/{}/result", started.session_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn result_route_returns_the_stored_result() {
    let (service, _) = build_service();
    let started = service
        .start_screening(start_request(20))
        .expect("session starts");
    answer_all(&service, &started.session_id, &toddler_elevated_initial());
    answer_all(
        &service,
        &started.session_id,
        &[("t-aut-4", no()), ("t-aut-5", yes()), ("t-aut-6", no())],
    );
    let router = screening_router_with_service(service);

    let response = router
        .oneshot(get(&format!("/api/v1/screenings/{}/result", started.session_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["primary_concern"], "autism");
    assert_eq!(body["risk_levels"]["autism"], "high");
    assert_eq!(body["urgency"], "urgent");
    assert_eq!(body["summary"]["primary_issue"], "Autism Spectrum Disorder");
}
