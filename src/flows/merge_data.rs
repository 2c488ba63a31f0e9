//! Merge-data flow
//!
//! Resolves two users by code, then merges learning data from the first
//! user's internal id to the second's. Either lookup failing aborts before
//! the merge; the error names the failing side so the operator knows which
//! code to fix.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::app_state::AppState;
use crate::lms_client::{LmsClient, SendRequest};

use super::{acquire_client, FlowError, FlowOutput, FlowRequest, FlowResult};

const FIND_USER_PATH: &str = "/user/find-by-code";
const MERGE_PATH: &str = "/user/merge-data";

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MergeDataAction {
    Merge {
        from_user_code: String,
        to_user_code: String,
    },
}

pub async fn run(
    state: &AppState,
    admin_user: &str,
    req: FlowRequest<MergeDataAction>,
) -> FlowResult {
    let MergeDataAction::Merge {
        ref from_user_code,
        ref to_user_code,
    } = req.action;

    if from_user_code.trim().is_empty() || to_user_code.trim().is_empty() {
        return Err(FlowError::validation("both user codes are required"));
    }
    if from_user_code == to_user_code {
        return Err(FlowError::validation(
            "from_user_code and to_user_code must differ",
        ));
    }

    let from_user_code = from_user_code.clone();
    let to_user_code = to_user_code.clone();

    let ctx = acquire_client(state, admin_user, &req).await?;

    let from_user = lookup_user(&ctx.client, &from_user_code)
        .await
        .map_err(|e| e.prefixed("From user:").with_history(ctx.client.history()))?;
    let to_user = lookup_user(&ctx.client, &to_user_code)
        .await
        .map_err(|e| e.prefixed("To user:").with_history(ctx.client.history()))?;

    let mut payload = Map::new();
    payload.insert("from_user_iid".into(), json!(from_user.iid));
    payload.insert("to_user_iid".into(), json!(to_user.iid));

    let outcome = ctx.client.send(SendRequest::post(MERGE_PATH, payload)).await;
    if !outcome.success {
        return Err(FlowError::execution(
            outcome.error.unwrap_or_else(|| "merge failed".into()),
        )
        .with_history(ctx.client.history()));
    }

    Ok(FlowOutput {
        data: json!({
            "fromUser": { "code": from_user_code, "iid": from_user.iid },
            "toUser": { "code": to_user_code, "iid": to_user.iid },
            "result": outcome.data,
        }),
        history: ctx.client.history(),
    })
}

struct ResolvedUser {
    iid: i64,
}

async fn lookup_user(client: &LmsClient, code: &str) -> Result<ResolvedUser, FlowError> {
    let mut payload = Map::new();
    payload.insert("code".into(), Value::String(code.to_string()));

    let outcome = client.send(SendRequest::post(FIND_USER_PATH, payload)).await;
    if !outcome.success {
        return Err(FlowError::execution(
            outcome
                .error
                .unwrap_or_else(|| format!("lookup failed for '{code}'")),
        ));
    }

    let iid = outcome
        .data
        .get("user")
        .and_then(|u| u.get("iid"))
        .and_then(Value::as_i64)
        .ok_or_else(|| FlowError::execution(format!("user '{code}' not found")))?;

    Ok(ResolvedUser { iid })
}

impl FlowError {
    fn prefixed(mut self, prefix: &str) -> Self {
        self.message = format!("{prefix} {}", self.message);
        self
    }
}
