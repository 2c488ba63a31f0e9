//! Shared test fixtures: a stub LMS served from a loopback listener, and
//! app state wired to tempdir-backed stores.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Extension, response::Json, routing::get, routing::post, Router};
use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use lms_autoflow::app_state::AppState;
use lms_autoflow::client_cache::ClientCache;
use lms_autoflow::crypto;
use lms_autoflow::environment::{Environment, SledEnvironmentStore};
use lms_autoflow::exec_history::SledCloneHistoryStore;
use lms_autoflow::kpi_table::KpiTable;

pub const TEST_KEY: [u8; 32] = [9u8; 32];
pub const MASTER_PASSWORD: &str = "master-pw";

#[derive(Default)]
pub struct Counters {
    pub login: AtomicUsize,
    pub populate: AtomicUsize,
    pub status_change: AtomicUsize,
    pub question_update: AtomicUsize,
}

pub struct StubLms {
    pub base_url: String,
    pub counters: Arc<Counters>,
}

/// Serve a canned LMS on a random loopback port.
pub async fn spawn_stub_lms() -> StubLms {
    let counters = Arc::new(Counters::default());

    let app = Router::new()
        .route("/user/login", post(login))
        .route("/program/search", post(program_search))
        .route("/program/clone", post(program_clone))
        .route("/domain/groups", get(domain_groups))
        .route("/domain/new", post(domain_new))
        .route("/syllabus/search", post(syllabus_search))
        .route("/syllabus/populate-sequential", post(syllabus_populate))
        .route("/syllabus/update-status", post(syllabus_status))
        .route("/user/find-by-code", post(find_user))
        .route("/user/merge-data", post(merge_data))
        .route("/question-bank/search", post(bank_search))
        .route("/question/search-by-tag", post(questions_by_tag))
        .route("/question/update", post(question_update))
        .layer(Extension(counters.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("stub LMS should bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubLms {
        base_url: format!("http://{addr}"),
        counters,
    }
}

async fn login(
    Extension(counters): Extension<Arc<Counters>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    counters.login.fetch_add(1, Ordering::SeqCst);
    if body.get("lname").and_then(Value::as_str) == Some("baduser") {
        return Json(json!({ "success": false, "message": "invalid credentials" }));
    }
    Json(json!({ "success": true, "session": "stub" }))
}

async fn program_search(Json(_): Json<Value>) -> Json<Value> {
    Json(json!({
        "success": true,
        "programs": [
            { "iid": 101, "name": "Algebra I", "status": "approved" },
            { "iid": 102, "name": "Geometry", "status": "approved" }
        ],
        "total": 2
    }))
}

async fn program_clone(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "success": true,
        "program": { "iid": 9001, "cloned_from": body.get("program_iid") }
    }))
}

async fn domain_groups() -> Json<Value> {
    Json(json!({ "success": true, "groups": [ { "id": "g1", "name": "Default" } ] }))
}

async fn domain_new(Json(_): Json<Value>) -> Json<Value> {
    // HTTP 200 with an application-level refusal
    Json(json!({ "success": false, "message": "slug already exists" }))
}

async fn syllabus_search(Json(_): Json<Value>) -> Json<Value> {
    Json(json!({
        "success": true,
        "syllabuses": [ { "id": 5, "iid": 55, "name": "Term 1" } ]
    }))
}

async fn syllabus_populate(
    Extension(counters): Extension<Arc<Counters>>,
    Json(_): Json<Value>,
) -> Json<Value> {
    counters.populate.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "success": false, "message": "sequence conflict" }))
}

async fn syllabus_status(
    Extension(counters): Extension<Arc<Counters>>,
    Json(_): Json<Value>,
) -> Json<Value> {
    counters.status_change.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "success": true }))
}

async fn find_user(Json(body): Json<Value>) -> Json<Value> {
    match body.get("code").and_then(Value::as_str) {
        Some("alice") => Json(json!({ "success": true, "user": { "iid": 11, "code": "alice" } })),
        Some("bob") => Json(json!({ "success": true, "user": { "iid": 22, "code": "bob" } })),
        _ => Json(json!({ "success": true })),
    }
}

async fn merge_data(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "success": true,
        "merged": true,
        "from": body.get("from_user_iid"),
        "to": body.get("to_user_iid")
    }))
}

async fn bank_search(Json(_): Json<Value>) -> Json<Value> {
    Json(json!({
        "success": true,
        "banks": [ { "iid": 7, "name": "Midterm Bank" } ]
    }))
}

async fn questions_by_tag(Json(_): Json<Value>) -> Json<Value> {
    // one updatable, one non-numeric filename, one out-of-range index,
    // one the LMS refuses to update
    Json(json!({
        "success": true,
        "questions": [
            { "iid": 1, "file": "exam-part-3.pdf" },
            { "iid": 2, "file": "exam-final.pdf" },
            { "iid": 3, "file": "quiz-999.pdf" },
            { "iid": 4, "file": "exam-part-2.pdf" }
        ]
    }))
}

async fn question_update(
    Extension(counters): Extension<Arc<Counters>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    counters.question_update.fetch_add(1, Ordering::SeqCst);
    if body.get("iid").and_then(Value::as_i64) == Some(4) {
        return Json(json!({ "success": false, "message": "question locked" }));
    }
    Json(json!({ "success": true }))
}

/// App state over tempdir-backed sled stores; the tempdir must outlive it.
pub fn test_state(dir: &tempfile::TempDir) -> Arc<AppState> {
    let db = sled::open(dir.path()).expect("sled should open");
    Arc::new(AppState {
        environments: Arc::new(SledEnvironmentStore::new(db.clone())),
        clone_history: Arc::new(SledCloneHistoryStore::new(db)),
        client_cache: ClientCache::new(Duration::from_secs(60)),
        kpi_table: KpiTable::builtin(),
        encryption_key: TEST_KEY,
        http_timeout: Duration::from_secs(5),
    })
}

/// Seed one environment pointing at the stub LMS; returns its id.
pub fn seed_environment(state: &AppState, host: &str) -> Uuid {
    let now = Utc::now();
    let env = Environment {
        id: Uuid::new_v4(),
        name: "stub".into(),
        host: host.to_string(),
        default_dmn: "acme".into(),
        master_password_enc: Some(crypto::encrypt_to_b64(MASTER_PASSWORD, &TEST_KEY).unwrap()),
        root_password_enc: None,
        default_headers: BTreeMap::new(),
        base_params: Map::new(),
        created_at: now,
        updated_at: now,
    };
    state.environments.upsert(&env).unwrap();
    env.id
}
