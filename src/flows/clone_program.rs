//! Clone-program flow
//!
//! Step 1 lists programs filtered by status (default `approved`); step 2
//! clones a selected program by numeric id. Clone attempts are additionally
//! recorded to the clone-history store, fire-and-forget.

use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::exec_history::CloneExecutionRecord;
use crate::lms_client::SendRequest;

use super::{acquire_client, parse_integer_id, FlowError, FlowOutput, FlowRequest, FlowResult};

const SEARCH_PATH: &str = "/program/search";
const CLONE_PATH: &str = "/program/clone";

const DEFAULT_STATUSES: &[&str] = &["approved"];

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CloneProgramAction {
    GetPrograms {
        #[serde(default)]
        statuses: Option<Vec<String>>,
    },
    CloneProgram {
        program_iid: Value,
    },
}

pub async fn run(
    state: &AppState,
    admin_user: &str,
    req: FlowRequest<CloneProgramAction>,
) -> FlowResult {
    // input validation happens before any network traffic
    let parsed_iid = match &req.action {
        CloneProgramAction::CloneProgram { program_iid } => {
            Some(parse_integer_id("program_iid", program_iid)?)
        }
        CloneProgramAction::GetPrograms { .. } => None,
    };

    let ctx = acquire_client(state, admin_user, &req).await?;

    match req.action {
        CloneProgramAction::GetPrograms { statuses } => {
            let statuses = statuses.unwrap_or_else(|| {
                DEFAULT_STATUSES.iter().map(|s| s.to_string()).collect()
            });

            let mut payload = Map::new();
            payload.insert("status".into(), json!(statuses));

            let outcome = ctx.client.send(SendRequest::post(SEARCH_PATH, payload)).await;
            if !outcome.success {
                return Err(FlowError::execution(
                    outcome.error.unwrap_or_else(|| "program search failed".into()),
                )
                .with_history(ctx.client.history()));
            }

            let programs = outcome
                .data
                .get("programs")
                .cloned()
                .unwrap_or_else(|| json!([]));
            let total = outcome
                .data
                .get("total")
                .cloned()
                .unwrap_or_else(|| json!(programs.as_array().map(Vec::len).unwrap_or(0)));

            Ok(FlowOutput {
                data: json!({ "programs": programs, "total": total }),
                history: ctx.client.history(),
            })
        }

        CloneProgramAction::CloneProgram { .. } => {
            let program_iid = parsed_iid.expect("validated above");
            let started = Instant::now();

            let mut payload = Map::new();
            payload.insert("program_iid".into(), json!(program_iid));

            let outcome = ctx.client.send(SendRequest::post(CLONE_PATH, payload)).await;

            record_attempt(
                state,
                &ctx.admin_user,
                ctx.environment_id,
                &ctx.dmn,
                program_iid,
                outcome.success,
                outcome.error.clone(),
                started.elapsed().as_millis() as u64,
                ctx.client.history(),
            );

            if !outcome.success {
                return Err(FlowError::execution(
                    outcome.error.unwrap_or_else(|| "program clone failed".into()),
                )
                .with_history(ctx.client.history()));
            }

            Ok(FlowOutput {
                data: outcome.data,
                history: ctx.client.history(),
            })
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn record_attempt(
    state: &AppState,
    admin_user: &str,
    environment_id: Uuid,
    dmn: &str,
    program_iid: i64,
    success: bool,
    error: Option<String>,
    duration_ms: u64,
    request_history: Vec<crate::history::RequestHistoryItem>,
) {
    let record = CloneExecutionRecord {
        id: Uuid::new_v4(),
        admin_user: admin_user.to_string(),
        environment_id,
        dmn: dmn.to_string(),
        program_iid,
        success,
        error,
        duration_ms,
        request_history,
        created_at: Utc::now(),
    };

    // fire-and-forget: a persistence failure never fails the response
    if let Err(e) = state.clone_history.append(&record) {
        warn!(program_iid, error = %e, "failed to persist clone execution record");
    }
}
