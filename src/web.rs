//! HTTP API
//!
//! One POST endpoint per flow, environment administration, the clone audit
//! listing, and health checks. The admin identity arrives from the fronting
//! auth layer as the `x-user-id` header.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::api_errors::{AppError, AppErrorWithHistory};
use crate::app_state::AppState;
use crate::client_cache::ClientCache;
use crate::credentials::ROOT_USER_CODE;
use crate::crypto;
use crate::environment::{Environment, EnvironmentSummary};
use crate::exec_history::CloneExecutionRecord;
use crate::flows::{self, FlowOutput, FlowRequest};
use crate::history::RequestHistoryItem;

const ADMIN_USER_HEADER: &str = "x-user-id";
const DEFAULT_ADMIN_USER: &str = "admin";
const CLONE_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    pub success: bool,
    pub data: Value,
    pub request_history: Vec<RequestHistoryItem>,
}

impl From<FlowOutput> for FlowResponse {
    fn from(output: FlowOutput) -> Self {
        Self {
            success: true,
            data: output.data,
            request_history: output.history,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auto/clone-program", post(clone_program))
        .route("/api/auto/create-domain", post(create_domain))
        .route("/api/auto/fix-syllabus", post(fix_syllabus))
        .route("/api/auto/merge-data", post(merge_data))
        .route("/api/auto/update-kpi-time", post(update_kpi_time))
        .route("/api/auto/clear-session", post(clear_session))
        .route("/api/auto/clone-history", get(clone_history))
        .route(
            "/api/environments",
            get(list_environments).post(create_environment),
        )
        .route(
            "/api/environments/{id}",
            get(get_environment)
                .put(update_environment)
                .delete(delete_environment),
        )
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(state))
}

fn admin_user(headers: &HeaderMap) -> String {
    headers
        .get(ADMIN_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_ADMIN_USER)
        .to_string()
}

// ---- flow endpoints ----

/// Deserialize a flow body by hand so a malformed or incomplete payload
/// comes back as a 400 in the usual `{success, error, requestHistory}`
/// envelope rather than the extractor's bare-text rejection.
fn parse_flow_request<A: DeserializeOwned>(
    body: Value,
) -> Result<FlowRequest<A>, AppErrorWithHistory> {
    serde_json::from_value(body).map_err(|e| {
        AppError::bad_request(format!("invalid flow request: {e}")).with_history(Vec::new())
    })
}

async fn clone_program(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<FlowResponse>, AppErrorWithHistory> {
    let admin = admin_user(&headers);
    let req: FlowRequest<flows::clone_program::CloneProgramAction> = parse_flow_request(body)?;
    let output = flows::clone_program::run(&state, &admin, req).await?;
    Ok(Json(output.into()))
}

async fn create_domain(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<FlowResponse>, AppErrorWithHistory> {
    let admin = admin_user(&headers);
    let req: FlowRequest<flows::create_domain::CreateDomainAction> = parse_flow_request(body)?;
    let output = flows::create_domain::run(&state, &admin, req).await?;
    Ok(Json(output.into()))
}

async fn fix_syllabus(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<FlowResponse>, AppErrorWithHistory> {
    let admin = admin_user(&headers);
    let req: FlowRequest<flows::fix_syllabus::FixSyllabusAction> = parse_flow_request(body)?;
    let output = flows::fix_syllabus::run(&state, &admin, req).await?;
    Ok(Json(output.into()))
}

async fn merge_data(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<FlowResponse>, AppErrorWithHistory> {
    let admin = admin_user(&headers);
    let req: FlowRequest<flows::merge_data::MergeDataAction> = parse_flow_request(body)?;
    let output = flows::merge_data::run(&state, &admin, req).await?;
    Ok(Json(output.into()))
}

async fn update_kpi_time(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<FlowResponse>, AppErrorWithHistory> {
    let admin = admin_user(&headers);
    let req: FlowRequest<flows::update_kpi::UpdateKpiAction> = parse_flow_request(body)?;
    let output = flows::update_kpi::run(&state, &admin, req).await?;
    Ok(Json(output.into()))
}

#[derive(Debug, Deserialize)]
struct ClearSessionRequest {
    environment_id: Uuid,
    dmn: Option<String>,
    user_code: Option<String>,
}

/// Explicitly drop the caller's cached LMS session so the next flow against
/// the same target logs in afresh.
async fn clear_session(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ClearSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let env = state
        .environments
        .get(&req.environment_id)?
        .ok_or_else(|| {
            AppError::not_found(format!("environment {} not found", req.environment_id))
        })?;

    let dmn = req.dmn.unwrap_or_else(|| env.default_dmn.clone());
    let user_code = req
        .user_code
        .unwrap_or_else(|| ROOT_USER_CODE.to_string());
    let key = ClientCache::key(&admin_user(&headers), &env.id, &dmn, &user_code);
    let cleared = state.client_cache.remove(&key).await;

    Ok(Json(serde_json::json!({ "cleared": cleared })))
}

async fn clone_history(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<CloneExecutionRecord>>, AppError> {
    let records = state.clone_history.list(CLONE_HISTORY_LIMIT)?;
    Ok(Json(records))
}

// ---- environment administration ----

#[derive(Debug, Deserialize)]
pub struct EnvironmentUpsertRequest {
    pub name: String,
    pub host: String,
    pub default_dmn: String,
    /// Plaintext in transit; encrypted before it touches the store.
    pub master_password: Option<String>,
    pub root_password: Option<String>,
    #[serde(default)]
    pub default_headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub base_params: Option<Map<String, Value>>,
}

impl EnvironmentUpsertRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::bad_request("name must not be empty"));
        }
        if !self.host.starts_with("http://") && !self.host.starts_with("https://") {
            return Err(AppError::bad_request("host must be an http(s) URL"));
        }
        if self.default_dmn.trim().is_empty() {
            return Err(AppError::bad_request("default_dmn must not be empty"));
        }
        Ok(())
    }
}

fn encrypt_secret(
    secret: &Option<String>,
    key: &[u8; 32],
) -> Result<Option<String>, AppError> {
    match secret {
        Some(s) if !s.is_empty() => crypto::encrypt_to_b64(s, key)
            .map(Some)
            .map_err(|e| AppError::internal(format!("encryption failed: {e}"))),
        _ => Ok(None),
    }
}

async fn list_environments(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<EnvironmentSummary>>, AppError> {
    let envs = state.environments.list()?;
    Ok(Json(envs.iter().map(EnvironmentSummary::from).collect()))
}

async fn get_environment(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<EnvironmentSummary>, AppError> {
    let env = state
        .environments
        .get(&id)?
        .ok_or_else(|| AppError::not_found(format!("environment {id} not found")))?;
    Ok(Json(EnvironmentSummary::from(&env)))
}

async fn create_environment(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<EnvironmentUpsertRequest>,
) -> Result<Json<EnvironmentSummary>, AppError> {
    req.validate()?;

    let now = Utc::now();
    let env = Environment {
        id: Uuid::new_v4(),
        name: req.name.clone(),
        host: req.host.trim_end_matches('/').to_string(),
        default_dmn: req.default_dmn.clone(),
        master_password_enc: encrypt_secret(&req.master_password, &state.encryption_key)?,
        root_password_enc: encrypt_secret(&req.root_password, &state.encryption_key)?,
        default_headers: req.default_headers.unwrap_or_default(),
        base_params: req.base_params.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    state.environments.upsert(&env)?;
    Ok(Json(EnvironmentSummary::from(&env)))
}

async fn update_environment(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<EnvironmentUpsertRequest>,
) -> Result<Json<EnvironmentSummary>, AppError> {
    req.validate()?;

    let mut env = state
        .environments
        .get(&id)?
        .ok_or_else(|| AppError::not_found(format!("environment {id} not found")))?;

    env.name = req.name.clone();
    env.host = req.host.trim_end_matches('/').to_string();
    env.default_dmn = req.default_dmn.clone();
    // absent password fields keep the stored secret
    if let Some(enc) = encrypt_secret(&req.master_password, &state.encryption_key)? {
        env.master_password_enc = Some(enc);
    }
    if let Some(enc) = encrypt_secret(&req.root_password, &state.encryption_key)? {
        env.root_password_enc = Some(enc);
    }
    if let Some(headers) = req.default_headers {
        env.default_headers = headers;
    }
    if let Some(params) = req.base_params {
        env.base_params = params;
    }
    env.updated_at = Utc::now();

    state.environments.upsert(&env)?;
    Ok(Json(EnvironmentSummary::from(&env)))
}

async fn delete_environment(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !state.environments.delete(&id)? {
        return Err(AppError::not_found(format!("environment {id} not found")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---- health ----

async fn healthz() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn readyz(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let ready = state.environments.list().is_ok();
    Json(serde_json::json!({ "ready": ready }))
}
