//! Integration tests for tis-ingest API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

use helpers::{clean_csv, Harness};
use tis_ingest::AppState;

const BOUNDARY: &str = "tis-test-boundary";

fn create_test_app(harness: &Harness) -> Router {
    let state = AppState::new(
        harness.pool.clone(),
        harness.event_bus.clone(),
        Arc::clone(&harness.orchestrator),
        harness.config.clone(),
    );
    tis_ingest::build_router(state)
}

fn multipart_upload(files: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, contents) in files {
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{n}\"\r\nContent-Type: application/octet-stream\r\n\r\n{c}\r\n",
            b = BOUNDARY,
            n = name,
            c = contents
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = Harness::new().await;
    let app = create_test_app(&harness);

    let (status, json) = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "tis-ingest");
    assert_eq!(json["pending_reviews"], 0);
    assert!(json.get("last_error").is_none());
}

#[tokio::test]
async fn test_categories_include_grouping_sentinel() {
    let harness = Harness::new().await;
    let app = create_test_app(&harness);

    let (status, json) = send(&app, Request::builder().uri("/categories").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let labels: Vec<&str> = json["course_categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["label"].as_str().unwrap())
        .collect();
    assert!(labels.contains(&"Biology"));
    assert!(!labels.contains(&"Uncategorized"));
    assert!(json["grouping_labels"]
        .as_array()
        .unwrap()
        .contains(&json!("Uncategorized")));
}

#[tokio::test]
async fn test_upload_processes_each_file_independently() {
    let harness = Harness::new().await;
    let app = create_test_app(&harness);

    let csv = clean_csv(9.0);
    let (status, json) = send(
        &app,
        multipart_upload(&[("jane.csv", csv.as_str()), ("notes.docx", "hello")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "error");
    let files = json["processed_files"].as_array().unwrap();
    assert_eq!(files.len(), 2);

    assert_eq!(files[0]["status"], "success");
    assert_eq!(files[0]["file"], "jane.csv");
    assert_eq!(files[0]["data"]["inserted_count"], 3);

    assert_eq!(files[1]["status"], "error");
    assert!(files[1]["message"].as_str().unwrap().contains("not allowed"));

    assert_eq!(harness.count("courses").await, 3);
    let leftover = std::fs::read_dir(&harness.config.upload_dir).unwrap().count();
    assert_eq!(leftover, 0, "uploaded files are removed after processing");
}

#[tokio::test]
async fn test_upload_without_files_is_rejected() {
    let harness = Harness::new().await;
    let app = create_test_app(&harness);

    let (status, json) = send(&app, multipart_upload(&[])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "bad_request");
}

#[tokio::test]
async fn test_too_many_files_starts_nothing() {
    let harness = Harness::new().await;
    let mut config = harness.config.clone();
    config.max_files = 1;
    let app = tis_ingest::build_router(AppState::new(
        harness.pool.clone(),
        harness.event_bus.clone(),
        Arc::clone(&harness.orchestrator),
        config,
    ));

    let csv = clean_csv(9.0);
    let other = csv.replace("Jane,,Doe", "Ann,,Lee");
    let (status, json) = send(
        &app,
        multipart_upload(&[("jane.csv", csv.as_str()), ("ann.csv", other.as_str())]),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "payload_too_large");

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_eq!(harness.count("courses").await, 0);
    assert_eq!(harness.count("educators").await, 0);
    let leftover = std::fs::read_dir(&harness.config.upload_dir).unwrap().count();
    assert_eq!(leftover, 0, "staged files are removed when the request is rejected");
}

#[tokio::test]
async fn test_review_endpoints_without_session() {
    let harness = Harness::new().await;
    let app = create_test_app(&harness);

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/review/flagged/nobody.pdf")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], "error");

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/review/decisions",
            json!({
                "file_name": "nobody.pdf",
                "decisions": [{"degree": "BS", "major": "Biology", "course_name": "Genetics", "credits_earned": 3.0}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn test_review_round_trip_over_http() {
    let harness = Harness::new().await;
    let app = create_test_app(&harness);
    let registry = Arc::clone(harness.orchestrator.registry());
    let (mut notices, _) = registry.subscribe("jane.csv");

    let upload_app = app.clone();
    let csv = clean_csv(12.0);
    let upload = tokio::spawn(async move { send(&upload_app, multipart_upload(&[("jane.csv", csv.as_str())])).await });

    tokio::time::timeout(std::time::Duration::from_secs(10), notices.recv())
        .await
        .expect("ready notice")
        .expect("channel open");

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/review/flagged/jane.csv")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ready");
    assert_eq!(json["flagged_degrees"][0]["credit_mismatch"]["overall_credits_earned"], 12.0);

    let (_, health) = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(health["pending_reviews"], 1);
    assert_eq!(health["review_sessions"][0]["file_name"], "jane.csv");
    assert_eq!(health["review_sessions"][0]["state"], "PENDING_REVIEW");

    let (status, _) = send(
        &app,
        json_request("POST", "/review/decisions", json!({ "file_name": "jane.csv", "decisions": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/review/decisions",
            json!({
                "file_name": "jane.csv",
                "decisions": [{
                    "degree": "Bachelor of Science",
                    "major": "Biology",
                    "course_name": "General Biology",
                    "credits_earned": 6.0
                }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decisions_received"], 1);

    let (status, json) = upload.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["processed_files"][0]["status"], "success");
    assert_eq!(json["processed_files"][0]["data"]["reviewed"], true);
}

#[tokio::test]
async fn test_search_groups_by_category() {
    let harness = Harness::new().await;
    let app = create_test_app(&harness);
    let csv = clean_csv(9.0);
    send(&app, multipart_upload(&[("jane.csv", csv.as_str())])).await;

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/search",
            json!({
                "educator_first_name": "jane",
                "educator_last_name": "DOE",
                "education_level": ["Bachelor"]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["educator_name"], "jane DOE");
    let results = json["results"].as_array().unwrap();
    let biology = results.iter().find(|r| r["category"] == "Biology").unwrap();
    assert_eq!(
        biology["course_details"],
        json!(["General Biology (Bachelor of Science - 3 credits - Jane Doe)"])
    );
    let history = results.iter().find(|r| r["category"] == "History").unwrap();
    assert_eq!(history["course_details"], json!(["N/A"]));
    assert!(results.iter().any(|r| r["category"] == "Uncategorized"));
}

#[tokio::test]
async fn test_search_without_matches_is_not_found() {
    let harness = Harness::new().await;
    let app = create_test_app(&harness);

    let (status, json) = send(
        &app,
        json_request("POST", "/search", json!({ "educator_last_name": "Nobody" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}
