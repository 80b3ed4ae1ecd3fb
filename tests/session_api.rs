mod common;

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use common::{ok_variant, source, ScriptedService, HAND_LABEL};
use expression_forge::api::routes::{router, AppState};
use expression_forge::error::AppError;
use expression_forge::session::Phase;
use expression_forge::{ArchiveBuilder, Category, GeneratedVariant, RetryLoop, RetryPolicy, Session};

fn app(service: ScriptedService) -> Router {
    let policy = RetryPolicy { pacing: Duration::ZERO, ..RetryPolicy::default() };
    let runner = RetryLoop::new(Arc::new(service), policy);
    let state = Arc::new(AppState { session: Session::new(runner, ArchiveBuilder::new()) });
    router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Body, content_type: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(ct) = content_type {
        req = req.header(header::CONTENT_TYPE, ct);
    }
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    (status, bytes.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let (status, body) = send(app, "GET", uri, Body::empty(), None).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

async fn upload(app: &Router) {
    let (status, _) = send(app, "PUT", "/source", Body::from(vec![1u8, 2, 3]), Some("image/png")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

async fn wait_until_idle(app: &Router) -> Value {
    for _ in 0..1000 {
        let status = get_json(app, "/status").await;
        if status["phase"]["state"] == "idle" {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("generation did not finish");
}

#[tokio::test(start_paused = true)]
async fn classes_are_listed_in_index_order() {
    let app = app(ScriptedService::always_ok());
    let (status, body) = send(&app, "GET", "/classes", Body::empty(), None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert_eq!(text.lines().collect::<Vec<_>>(), vec!["yawning_face", "hand", "phone", "focused_face", "anxious_face"]);
}

#[tokio::test(start_paused = true)]
async fn generate_without_source_sets_banner() {
    let app = app(ScriptedService::always_ok());
    let (status, _) = send(&app, "POST", "/generate", Body::empty(), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status = get_json(&app, "/status").await;
    assert_eq!(status["error"], "Invalid input: Select an image first.");

    let (code, _) = send(&app, "DELETE", "/error", Body::empty(), None).await;
    assert_eq!(code, StatusCode::NO_CONTENT);
    assert!(get_json(&app, "/status").await["error"].is_null());
}

#[tokio::test(start_paused = true)]
async fn upload_rejects_non_images() {
    let app = app(ScriptedService::always_ok());
    let (status, _) = send(&app, "PUT", "/source", Body::from("hello"), Some("text/plain")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "PUT", "/source", Body::from(vec![1u8]), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn full_run_then_download() {
    let app = app(ScriptedService::always_ok());
    upload(&app).await;

    let (status, body) = send(&app, "POST", "/generate", Body::empty(), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let accepted: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(accepted["phase"]["state"], "generating");

    // a second run cannot start while the first is active
    let (status, _) = send(&app, "POST", "/generate", Body::empty(), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let done = wait_until_idle(&app).await;
    assert!(done["error"].is_null());
    let categories = done["results"].as_array().unwrap();
    assert_eq!(categories.len(), 4);
    assert_eq!(categories[1]["category"], "HOLDING_PHONE");
    for c in categories {
        assert_eq!(c["images"].as_array().unwrap().len(), 4);
    }

    let id = categories[0]["images"][0]["id"].as_str().unwrap().to_string();
    let (status, png) = send(&app, "GET", &format!("/images/{}", id), Body::empty(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(png, vec![1, 2, 3]);
    let (_, label) = send(&app, "GET", &format!("/images/{}/label", id), Body::empty(), None).await;
    assert_eq!(String::from_utf8(label).unwrap(), HAND_LABEL);

    let (status, zip_bytes) = send(&app, "GET", "/download", Body::empty(), None).await;
    assert_eq!(status, StatusCode::OK);
    let archive = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
    assert_eq!(archive.len(), 1 + 16 * 2);
    let names: Vec<&str> = archive.file_names().collect();
    assert!(names.contains(&"images/holding-phone-4.png"));
    assert!(names.contains(&"labels/anxious-1.txt"));
}

#[tokio::test(start_paused = true)]
async fn partial_failure_is_reported_in_banner() {
    let app = app(ScriptedService::new(|category, _, _| {
        if category == Category::Anxious { Err(AppError::NoImage) } else { Ok(ok_variant()) }
    }));
    upload(&app).await;
    let (status, _) = send(&app, "POST", "/generate", Body::empty(), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let done = wait_until_idle(&app).await;
    assert_eq!(done["error"], "12/16 succeeded, check logs.");
    assert_eq!(done["results"].as_array().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn download_needs_results_and_unknown_images_are_404() {
    let app = app(ScriptedService::always_ok());
    let (status, _) = send(&app, "GET", "/download", Body::empty(), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", &format!("/images/{}", uuid::Uuid::new_v4()), Body::empty(), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn new_source_discards_previous_results() {
    let app = app(ScriptedService::always_ok());
    upload(&app).await;
    send(&app, "POST", "/generate", Body::empty(), None).await;
    let done = wait_until_idle(&app).await;
    assert_eq!(done["results"].as_array().unwrap().len(), 4);

    upload(&app).await;
    let status = get_json(&app, "/status").await;
    assert!(status["results"].as_array().unwrap().is_empty());
    assert_eq!(status["has_source"], true);

    let (code, _) = send(&app, "DELETE", "/source", Body::empty(), None).await;
    assert_eq!(code, StatusCode::NO_CONTENT);
    assert_eq!(get_json(&app, "/status").await["has_source"], false);
}

async fn wait_for_results(session: &Session) {
    for _ in 0..500 {
        let status = session.status().await;
        if status.phase == Phase::Idle {
            assert!(status.error.is_none());
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("generation did not finish");
}

#[tokio::test]
async fn abandoned_download_returns_session_to_idle() {
    // accepts connections at the kernel level but never answers
    let stalled = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let image_url = format!("http://{}/image.png", stalled.local_addr().unwrap());
    let service = ScriptedService::new(move |_, _, _| {
        Ok(GeneratedVariant { image_uri: image_url.clone(), label: HAND_LABEL.to_string() })
    });
    let policy = RetryPolicy { pacing: Duration::ZERO, ..RetryPolicy::default() };
    let session = Session::new(RetryLoop::new(Arc::new(service), policy), ArchiveBuilder::new());

    session.select_source(source()).await.unwrap();
    session.start_generation().await.unwrap();
    wait_for_results(&session).await;

    let attempt = tokio::time::timeout(Duration::from_millis(300), session.download()).await;
    assert!(attempt.is_err(), "download should still be waiting on the image");

    assert_eq!(session.status().await.phase, Phase::Idle);
    session.select_source(source()).await.unwrap();
    assert!(session.status().await.results.is_empty());
    drop(stalled);
}
