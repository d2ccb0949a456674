use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::publication::router::{publication_router, publish_handler};
use crate::workflows::publication::service::PublicationService;
use crate::workflows::publication::store::{InMemoryPostingRepository, InMemoryRunStore};
use crate::workflows::publication::{ChannelKind, FanOutExecutor};

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn publish_route_returns_grouped_channel_results() {
    let channels = four_channels_with_hanging_board();
    let (service, _, _) = build_service(vec![draft_posting("job-1")], &channels);
    let router = publication_router(service);

    let response = router
        .oneshot(post("/api/v1/job-postings/job-1/publish"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["job_id"], "job-1");
    assert_eq!(body["status"], "active");
    assert_eq!(body["trigger"], "initial");
    assert_eq!(body["summary"]["total"], 4);
    assert_eq!(body["summary"]["succeeded"], 3);
    assert_eq!(body["summary"]["failed"], 1);
    assert_eq!(body["channel_results"]["content_system"]["channel"], "careers-cms");
    assert_eq!(body["channel_results"]["job_boards"][0]["success"], false);
    assert_eq!(body["channel_results"]["job_boards"][0]["error_kind"], "timeout");
    assert_eq!(body["channel_results"]["notifications"][0]["channel"], "hr-inbox");
}

#[tokio::test]
async fn publish_route_lists_missing_fields() {
    let mut posting = draft_posting("job-1");
    posting.title = Some("   ".to_string());
    posting.required_skills.clear();
    let (service, _, _) = build_service(vec![posting], &[]);

    let response = publication_router(service)
        .oneshot(post("/api/v1/job-postings/job-1/publish"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(
        body["missing_fields"],
        serde_json::json!(["title", "required_skills"])
    );
}

#[tokio::test]
async fn publish_handler_reports_conflict_with_current_state() {
    let published_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
    let (service, _, _) = build_service(vec![published_posting("job-1", published_at)], &[]);

    let response = publish_handler::<InMemoryPostingRepository, InMemoryRunStore>(
        State(service),
        Path("job-1".to_string()),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "active");
    assert_eq!(body["published_at"], "2026-03-01T09:30:00Z");
}

#[tokio::test]
async fn unknown_posting_returns_not_found() {
    let (service, _, _) = build_service(Vec::new(), &[]);
    let router = publication_router(service);

    let response = router
        .clone()
        .oneshot(post("/api/v1/job-postings/ghost/publish"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(get("/api/v1/job-postings/ghost/publishing-runs"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn storage_outage_returns_service_unavailable() {
    let service = Arc::new(PublicationService::new(
        Arc::new(ReadOnlyRepository {
            inner: InMemoryPostingRepository::with_postings(vec![draft_posting("job-1")]),
        }),
        Arc::new(InMemoryRunStore::default()),
        Arc::new(registry_of(&[])),
        FanOutExecutor::new(TEST_TIMEOUT, 4),
    ));

    let response = publication_router(service)
        .oneshot(post("/api/v1/job-postings/job-1/publish"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn retry_and_runs_routes_expose_the_audit_trail() {
    let channels = vec![Arc::new(StubChannel::new(
        "indeed",
        ChannelKind::JobBoard,
        Behavior::FailOnce,
    ))];
    let (service, _, _) = build_service(vec![draft_posting("job-1")], &channels);
    let router = publication_router(service);

    let response = router
        .clone()
        .oneshot(post("/api/v1/job-postings/job-1/publish/retry"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(post("/api/v1/job-postings/job-1/publish"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(post("/api/v1/job-postings/job-1/publish/retry"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["trigger"], "retry");
    assert_eq!(body["summary"]["succeeded"], 1);

    let response = router
        .clone()
        .oneshot(post("/api/v1/job-postings/job-1/publish/retry"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .oneshot(get("/api/v1/job-postings/job-1/publishing-runs"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let runs = body.as_array().expect("array of runs");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0]["trigger"], "initial");
    assert_eq!(runs[0]["outcomes"][0]["error_kind"], "unavailable");
    assert_eq!(runs[1]["trigger"], "retry");
}
