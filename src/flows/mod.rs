//! Scripted LMS flows
//!
//! Every flow follows the same shape: resolve the environment, resolve
//! credentials, obtain a cached or freshly logged-in client, clear its
//! history, then run the flow's steps strictly in sequence. Results and
//! failures both carry the request history accumulated during the action.

pub mod clone_program;
pub mod create_domain;
pub mod fix_syllabus;
pub mod merge_data;
pub mod update_kpi;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::client_cache::ClientCache;
use crate::credentials::{self, ROOT_USER_CODE};
use crate::errors::AutomationError;
use crate::history::RequestHistoryItem;
use crate::lms_client::LmsClient;

/// Common envelope for every flow endpoint; the per-flow action enum is
/// flattened in.
#[derive(Debug, Deserialize)]
pub struct FlowRequest<A> {
    pub environment_id: Uuid,
    pub dmn: Option<String>,
    pub user_code: Option<String>,
    pub pass: Option<String>,
    #[serde(flatten)]
    pub action: A,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowErrorKind {
    Validation,
    NotFound,
    Auth,
    Config,
    Execution,
    Internal,
}

/// The one failure shape every flow function returns: what went wrong, and
/// everything that was sent to the LMS before it did.
#[derive(Debug)]
pub struct FlowError {
    pub kind: FlowErrorKind,
    pub message: String,
    pub history: Vec<RequestHistoryItem>,
}

impl FlowError {
    pub fn new(kind: FlowErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            history: Vec::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Validation, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Execution, message)
    }

    pub fn with_history(mut self, history: Vec<RequestHistoryItem>) -> Self {
        self.history = history;
        self
    }
}

impl From<AutomationError> for FlowError {
    fn from(err: AutomationError) -> Self {
        let kind = match &err {
            AutomationError::Validation { .. } => FlowErrorKind::Validation,
            AutomationError::NotFound { .. } => FlowErrorKind::NotFound,
            AutomationError::Auth { .. } => FlowErrorKind::Auth,
            AutomationError::Config { .. } | AutomationError::Decryption { .. } => {
                FlowErrorKind::Config
            }
            AutomationError::Network { .. } => FlowErrorKind::Execution,
            _ => FlowErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

/// Successful flow outcome: payload plus the action's request history.
#[derive(Debug)]
pub struct FlowOutput {
    pub data: Value,
    pub history: Vec<RequestHistoryItem>,
}

pub type FlowResult = Result<FlowOutput, FlowError>;

/// Resolved per-invocation context shared by the flow steps.
pub struct FlowContext {
    pub client: Arc<LmsClient>,
    pub environment_id: Uuid,
    pub admin_user: String,
    pub dmn: String,
}

/// The common prelude: environment lookup, credential resolution, cached
/// client reuse or a fresh login. Credentials are resolved before the cache
/// is consulted, so a request with no resolvable password fails even when a
/// session could have been reused.
pub async fn acquire_client<A>(
    state: &AppState,
    admin_user: &str,
    req: &FlowRequest<A>,
) -> Result<FlowContext, FlowError> {
    let env = state
        .environments
        .get(&req.environment_id)
        .map_err(FlowError::from)?
        .ok_or_else(|| {
            FlowError::from(AutomationError::not_found(
                "environment",
                req.environment_id.to_string(),
            ))
        })?;

    let dmn = req
        .dmn
        .clone()
        .unwrap_or_else(|| env.default_dmn.clone());
    let user_code = req
        .user_code
        .clone()
        .unwrap_or_else(|| ROOT_USER_CODE.to_string());

    let password = credentials::resolve_password(
        &env,
        &user_code,
        req.pass.as_deref(),
        &state.encryption_key,
    )?;

    let key = ClientCache::key(admin_user, &env.id, &dmn, &user_code);
    let client = match state.client_cache.get(&key).await {
        Some(client) => client,
        None => {
            let client = Arc::new(LmsClient::new(
                &env.host,
                &dmn,
                &user_code,
                env.default_headers.clone(),
                env.base_params.clone(),
                state.http_timeout,
            )?);
            if let Err(err) = client.login(&password).await {
                return Err(FlowError::from(err).with_history(client.history()));
            }
            state.client_cache.set(key, client.clone()).await;
            client
        }
    };

    // history reflects only the action that is about to run
    client.clear_history();

    Ok(FlowContext {
        client,
        environment_id: env.id,
        admin_user: admin_user.to_string(),
        dmn,
    })
}

/// Parse a caller-supplied id that may arrive as a JSON number or string.
/// Rejecting here keeps bad ids from ever reaching the network.
pub fn parse_integer_id(field: &str, value: &Value) -> Result<i64, FlowError> {
    match value {
        Value::Number(n) if n.is_i64() => Ok(n.as_i64().unwrap()),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| FlowError::validation(format!("{field} must be an integer, got '{s}'"))),
        other => Err(FlowError::validation(format!(
            "{field} must be an integer, got {other}"
        ))),
    }
}
