//! Integration tests for fieldwatch-api endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Agent registration, lookup, deletion, and the video cap
//! - Form 34A intake: duplicate serial flagging, extraction failure, hard conflicts
//! - Reconciliation and tally reports over HTTP
//! - The HTTP vision extractor against a local mock service

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fieldwatch_api::extraction::{ExtractedForm, FormExtractor, HttpFormExtractor};
use fieldwatch_api::{build_router, AppState};
use fieldwatch_common::db::{
    init::{create_schema, init_database},
    CandidateVotes,
};
use fieldwatch_common::store::SqliteStore;
use fieldwatch_common::{Error, Result};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

/// Reads the "image" as text: `SERIAL;first,last,party,votes;...`
///
/// An empty serial (or the literal `BLURRY`) fails extraction.
struct TextFormExtractor;

#[async_trait]
impl FormExtractor for TextFormExtractor {
    async fn extract(&self, image: &[u8]) -> Result<ExtractedForm> {
        let text = String::from_utf8_lossy(image);
        let mut parts = text.split(';');
        let serial = parts.next().unwrap_or_default().trim().to_string();
        if serial.is_empty() || serial == "BLURRY" {
            return Err(Error::ExtractionFailed("Serial number unreadable".to_string()));
        }

        let candidates = parts
            .filter(|p| !p.is_empty())
            .map(|p| {
                let fields: Vec<&str> = p.split(',').collect();
                CandidateVotes {
                    first_name: fields[0].to_string(),
                    last_name: fields[1].to_string(),
                    party_name: fields[2].to_string(),
                    votes: fields[3].parse().unwrap(),
                }
            })
            .collect();

        Ok(ExtractedForm {
            serial_number: serial,
            candidates,
        })
    }
}

struct TestApp {
    _dir: TempDir,
    store: SqliteStore,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let dir = TempDir::new().expect("Should create temp dir");
        let pool = init_database(&dir.path().join("fieldwatch.db"))
            .await
            .expect("Should initialize database");
        let store = SqliteStore::new(pool);
        let state = AppState::new(store.clone(), Arc::new(TextFormExtractor), 3);
        Self {
            _dir: dir,
            store,
            router: build_router(state),
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Should parse JSON")
        };
        (status, json)
    }

    async fn register(&self, id: &str, station: Option<&str>) -> String {
        let (status, body) = self
            .send("POST", "/api/agents", Some(agent_body(id, station)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["agent_code"].as_str().unwrap().to_string()
    }

    async fn submit(
        &self,
        agent_code: &str,
        form_text: &str,
        station: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut body = json!({
            "agent_code": agent_code,
            "image_base64": STANDARD.encode(form_text),
        });
        if let Some(code) = station {
            body["polling_station_code"] = json!(code);
        }
        self.send("POST", "/api/forms", Some(body)).await
    }
}

fn agent_body(id: &str, station: Option<&str>) -> Value {
    json!({
        "first_name": "Achieng",
        "last_name": format!("Agent{}", id),
        "phone_number": format!("07110000{}", id),
        "national_id": format!("NID{}", id),
        "county_code": "047",
        "county_name": "Nairobi",
        "constituency_code": "290",
        "constituency_name": "Westlands",
        "ward_code": "1441",
        "ward_name": "Kitisuru",
        "polling_station_code": station,
    })
}

fn station_json(code: &str, county: &str) -> Value {
    json!({
        "county_code": county,
        "county_name": "Nairobi",
        "constituency_code": "290",
        "constituency_name": "Westlands",
        "ward_code": "1441",
        "ward_name": "Kitisuru",
        "polling_station_code": code,
        "polling_station_name": format!("Station {}", code),
        "registered_voters": 600
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "fieldwatch-api");
    assert!(body["version"].is_string());
}

// =============================================================================
// Agents
// =============================================================================

#[tokio::test]
async fn test_register_and_fetch_agent() {
    let app = TestApp::new().await;
    let code = app.register("01", Some("A1")).await;
    assert!(code.starts_with("AGT-"));

    let (status, body) = app.send("GET", &format!("/api/agents/{}", code), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ward_code"], "1441");
    assert_eq!(body["polling_station_code"], "A1");
}

#[tokio::test]
async fn test_register_missing_fields_is_bad_request() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send("POST", "/api/agents", Some(json!({"first_name": "Achieng"})))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].as_str().unwrap().contains("national_id"));
}

#[tokio::test]
async fn test_register_twice_is_conflict() {
    let app = TestApp::new().await;
    app.register("01", None).await;

    let (status, _) = app.send("POST", "/api/agents", Some(agent_body("01", None))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_agent_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/api/agents/AGT-NOPE00", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_video_cap_enforced() {
    let app = TestApp::new().await;
    let code = app.register("01", None).await;
    let uri = format!("/api/agents/{}/videos", code);

    for i in 0..3 {
        let (status, _) = app
            .send("POST", &uri, Some(json!({"video_url": format!("https://v.example/{}.mp4", i)})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = app
        .send("POST", &uri, Some(json!({"video_url": "https://v.example/3.mp4"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, videos) = app.send("GET", &uri, None).await;
    assert_eq!(videos.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_delete_agent_removes_submission() {
    let app = TestApp::new().await;
    let code = app.register("01", Some("A1")).await;
    let (_, created) = app.submit(&code, "S1;Amina,Otieno,Blue,40", None).await;
    let submission_id = created["submission"]["id"].as_str().unwrap().to_string();

    let (status, _) = app.send("DELETE", &format!("/api/agents/{}", code), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send("GET", &format!("/api/submissions/{}", submission_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("DELETE", &format!("/api/agents/{}", code), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Form 34A intake
// =============================================================================

#[tokio::test]
async fn test_submit_form_uses_agent_station_by_default() {
    let app = TestApp::new().await;
    let code = app.register("01", Some("A1")).await;

    let (status, body) = app
        .submit(&code, "34A-001;Amina,Otieno,Blue,120;Brian,Kamau,Green,80", None)
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["submission"]["serial_number"], "34A-001");
    assert_eq!(body["submission"]["polling_station_code"], "A1");
    assert_eq!(body["submission"]["county_code"], "047");
    assert_eq!(body["submission"]["candidate_results"].as_array().unwrap().len(), 2);
    assert!(body["submission"]["image_digest"].as_str().unwrap().len() == 64);
    assert!(body["duplicate"].is_null());

    let (status, record) = app
        .send("GET", &format!("/api/agents/{}/submission", code), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["id"], body["submission"]["id"]);
}

#[tokio::test]
async fn test_duplicate_serial_is_accepted_and_recorded() {
    let app = TestApp::new().await;
    let first_agent = app.register("01", Some("A1")).await;
    let second_agent = app.register("02", Some("A2")).await;

    let (_, first) = app.submit(&first_agent, "S-777;Amina,Otieno,Blue,10", None).await;
    let first_id = first["submission"]["id"].as_str().unwrap().to_string();

    let (status, second) = app.submit(&second_agent, "S-777;Amina,Otieno,Blue,12", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["duplicate"]["serial_number"], "S-777");
    assert_eq!(second["duplicate"]["existing_submission_id"], first_id.as_str());

    let (_, discrepancies) = app.send("GET", "/api/discrepancies", None).await;
    let discrepancies = discrepancies.as_array().unwrap();
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0]["kind"], "duplicate");
    assert_eq!(discrepancies[0]["related_submission_ids"], json!([first_id]));
    assert_eq!(discrepancies[0]["id"], second["duplicate"]["discrepancy_id"]);

    let (_, submissions) = app.send("GET", "/api/submissions", None).await;
    assert_eq!(submissions.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_duplicate_serial_stores_nothing_if_flagging_fails() {
    let app = TestApp::new().await;
    let first_agent = app.register("01", None).await;
    let second_agent = app.register("02", None).await;
    app.submit(&first_agent, "S-500", None).await;

    sqlx::query("DROP TABLE discrepancies")
        .execute(app.store.pool())
        .await
        .unwrap();

    let (status, body) = app.submit(&second_agent, "S-500", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");

    // The submission rolled back with the discrepancy
    let (_, submissions) = app.send("GET", "/api/submissions", None).await;
    assert_eq!(submissions.as_array().unwrap().len(), 1);
    let (status, _) = app
        .send("GET", &format!("/api/agents/{}/submission", second_agent), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // So the agent can retry once the store recovers
    create_schema(app.store.pool()).await.unwrap();
    let (status, body) = app.submit(&second_agent, "S-500", None).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["duplicate"]["discrepancy_id"].is_string());

    let (_, discrepancies) = app.send("GET", "/api/discrepancies", None).await;
    assert_eq!(discrepancies.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_second_form_for_agent_is_conflict() {
    let app = TestApp::new().await;
    let code = app.register("01", None).await;

    let (status, _) = app.submit(&code, "S1", None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.submit(&code, "S2", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_extraction_failure_persists_nothing() {
    let app = TestApp::new().await;
    let code = app.register("01", None).await;

    let (status, body) = app.submit(&code, "BLURRY", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "EXTRACTION_FAILED");

    let (_, submissions) = app.send("GET", "/api/submissions", None).await;
    assert!(submissions.as_array().unwrap().is_empty());

    // The agent can retry with a readable image
    let (status, _) = app.submit(&code, "S1", None).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_submit_validation_errors() {
    let app = TestApp::new().await;
    let code = app.register("01", None).await;

    let (status, _) = app
        .send("POST", "/api/forms", Some(json!({"agent_code": code, "image_base64": "***"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("POST", "/api/forms", Some(json!({"agent_code": code, "image_base64": ""})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.submit("AGT-NOPE00", "S1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_checks_agent_before_decoding_image() {
    let app = TestApp::new().await;

    let bad_image = json!({"agent_code": "AGT-NOPE00", "image_base64": "***"});
    let (status, body) = app.send("POST", "/api/forms", Some(bad_image)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let code = app.register("01", None).await;
    app.submit(&code, "S1", None).await;

    let (status, _) = app
        .send("POST", "/api/forms", Some(json!({"agent_code": code, "image_base64": "***"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/agents")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "INVALID_BODY");

    let request = Request::builder()
        .method("POST")
        .uri("/api/forms")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "INVALID_BODY");
}

// =============================================================================
// Reports
// =============================================================================

#[tokio::test]
async fn test_station_reports_end_to_end() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            "POST",
            "/api/stations/import",
            Some(json!([station_json("A1", "047"), station_json("A2", "047")])),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imported"], 2);

    let first = app.register("01", None).await;
    app.submit(&first, "S1", Some("A1")).await;

    let (_, missing) = app.send("GET", "/api/reports/missing-submissions", None).await;
    assert_eq!(missing["missing_count"], 1);
    assert_eq!(missing["total_stations"], 2);
    assert_eq!(missing["stations"][0]["polling_station_code"], "A2");

    let (_, duplicates) = app.send("GET", "/api/reports/duplicate-submissions", None).await;
    assert_eq!(duplicates["total_duplicates"], 0);

    let second = app.register("02", None).await;
    app.submit(&second, "S2", Some("A1")).await;

    let (_, duplicates) = app.send("GET", "/api/reports/duplicate-submissions", None).await;
    assert_eq!(duplicates["station_duplicates"].as_array().unwrap().len(), 1);
    assert_eq!(duplicates["station_duplicates"][0]["polling_station_code"], "A1");
    assert_eq!(duplicates["station_duplicates"][0]["count"], 2);
    assert!(duplicates["serial_duplicates"].as_array().unwrap().is_empty());

    let third = app.register("03", None).await;
    app.submit(&third, "S3", Some("Z9")).await;

    let (_, extra) = app
        .send("GET", "/api/reports/extra-submissions?county=047", None)
        .await;
    assert_eq!(extra["count"], 1);
    assert_eq!(extra["submissions"][0]["polling_station_code"], "Z9");
}

#[tokio::test]
async fn test_tally_report() {
    let app = TestApp::new().await;
    let first = app.register("01", None).await;
    let second = app.register("02", None).await;

    app.submit(&first, "S1;Amina,Otieno,Blue,50;Brian,Kamau,Green,50", None).await;
    app.submit(&second, "S2;Brian,Kamau,Green,10;Amina,Otieno,Blue,10", None).await;

    let (status, tally) = app.send("GET", "/api/reports/tally", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tally["total_votes"], 120);
    assert!(tally["county"].is_null());
    // Equal totals keep first-seen order
    assert_eq!(tally["candidates"][0]["first_name"], "Amina");
    assert_eq!(tally["candidates"][0]["total_votes"], 60);
    assert_eq!(tally["candidates"][1]["first_name"], "Brian");

    let (_, other_county) = app.send("GET", "/api/reports/tally?county=001", None).await;
    assert_eq!(other_county["total_votes"], 0);
    assert!(other_county["candidates"].as_array().unwrap().is_empty());
}

// =============================================================================
// HTTP vision extractor
// =============================================================================

async fn spawn_mock_vision(response: Value, status: StatusCode) -> String {
    let app = Router::new().route(
        "/extract",
        post(move |Json(body): Json<Value>| {
            let response = response.clone();
            async move {
                assert!(body["image_base64"].is_string());
                (status, Json(response))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/extract", addr)
}

#[tokio::test]
async fn test_http_extractor_reads_service_response() {
    let endpoint = spawn_mock_vision(
        json!({
            "serialNumber": "34A-9",
            "candidates": [
                {"firstName": "Amina", "lastName": "Otieno", "partyName": "Blue", "votes": 7}
            ]
        }),
        StatusCode::OK,
    )
    .await;

    let extractor = HttpFormExtractor::new(endpoint, None, Duration::from_secs(5)).unwrap();
    let form = extractor.extract(b"scan").await.unwrap();
    assert_eq!(form.serial_number, "34A-9");
    assert_eq!(form.candidates[0].votes, 7);
}

#[tokio::test]
async fn test_http_extractor_service_error() {
    let endpoint =
        spawn_mock_vision(json!({"error": "busy"}), StatusCode::SERVICE_UNAVAILABLE).await;

    let extractor =
        HttpFormExtractor::new(endpoint, Some("key".to_string()), Duration::from_secs(5)).unwrap();
    let err = extractor.extract(b"scan").await.unwrap_err();
    assert!(matches!(err, Error::ExtractionFailed(_)));
}
