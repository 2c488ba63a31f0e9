//! Update-KPI-time flow
//!
//! Step 1 searches question banks by name. Step 2 fetches a bank's tagged
//! questions and rewrites each one's `kpi_time` from the duration table,
//! indexed by the number parsed out of the question's attached filename.
//! Updates run one at a time; a failing question is recorded as a named
//! error and the batch continues, so the operation reports partial success
//! with processed/updated counts.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::app_state::AppState;
use crate::kpi_table::index_from_filename;
use crate::lms_client::SendRequest;

use super::{acquire_client, parse_integer_id, FlowError, FlowOutput, FlowRequest, FlowResult};

const BANK_SEARCH_PATH: &str = "/question-bank/search";
const QUESTIONS_PATH: &str = "/question/search-by-tag";
const UPDATE_PATH: &str = "/question/update";

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpdateKpiAction {
    SearchBanks {
        name: String,
    },
    UpdateBank {
        bank_iid: Value,
        #[serde(default)]
        tag: Option<String>,
    },
}

pub async fn run(
    state: &AppState,
    admin_user: &str,
    req: FlowRequest<UpdateKpiAction>,
) -> FlowResult {
    let parsed_bank_iid = match &req.action {
        UpdateKpiAction::UpdateBank { bank_iid, .. } => {
            Some(parse_integer_id("bank_iid", bank_iid)?)
        }
        UpdateKpiAction::SearchBanks { name } => {
            if name.trim().is_empty() {
                return Err(FlowError::validation("name must not be empty"));
            }
            None
        }
    };

    let ctx = acquire_client(state, admin_user, &req).await?;

    match req.action {
        UpdateKpiAction::SearchBanks { name } => {
            let mut payload = Map::new();
            payload.insert("name".into(), Value::String(name));

            let outcome = ctx
                .client
                .send(SendRequest::post(BANK_SEARCH_PATH, payload))
                .await;
            if !outcome.success {
                return Err(FlowError::execution(
                    outcome
                        .error
                        .unwrap_or_else(|| "question bank search failed".into()),
                )
                .with_history(ctx.client.history()));
            }

            let banks = outcome
                .data
                .get("banks")
                .cloned()
                .unwrap_or_else(|| json!([]));

            Ok(FlowOutput {
                data: json!({ "banks": banks }),
                history: ctx.client.history(),
            })
        }

        UpdateKpiAction::UpdateBank { tag, .. } => {
            let bank_iid = parsed_bank_iid.expect("validated above");

            let mut payload = Map::new();
            payload.insert("bank_iid".into(), json!(bank_iid));
            if let Some(tag) = tag {
                payload.insert("tag".into(), Value::String(tag));
            }

            let outcome = ctx
                .client
                .send(SendRequest::post(QUESTIONS_PATH, payload))
                .await;
            if !outcome.success {
                return Err(FlowError::execution(
                    outcome
                        .error
                        .unwrap_or_else(|| "question fetch failed".into()),
                )
                .with_history(ctx.client.history()));
            }

            let questions = outcome
                .data
                .get("questions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            let mut updated = 0usize;
            let mut errors: Vec<String> = Vec::new();

            // strictly sequential: each update awaits before the next starts
            for (index, question) in questions.iter().enumerate() {
                let iid = match question.get("iid").and_then(Value::as_i64) {
                    Some(iid) => iid,
                    None => {
                        errors.push(format!("question #{index}: missing iid"));
                        continue;
                    }
                };

                let kpi_time = match kpi_time_for(state, question) {
                    Ok(v) => v,
                    Err(message) => {
                        errors.push(format!("question {iid}: {message}"));
                        continue;
                    }
                };

                let mut update = Map::new();
                update.insert("iid".into(), json!(iid));
                update.insert("kpi_time".into(), json!(kpi_time));

                let outcome = ctx
                    .client
                    .send(
                        SendRequest::post(UPDATE_PATH, update)
                            .with_loop(index, iid.to_string()),
                    )
                    .await;

                if outcome.success && outcome.api_success() != Some(false) {
                    updated += 1;
                } else {
                    let message = outcome
                        .error
                        .clone()
                        .or_else(|| outcome.api_error())
                        .unwrap_or_else(|| "update failed".into());
                    errors.push(format!("question {iid}: {message}"));
                }
            }

            Ok(FlowOutput {
                data: json!({
                    "bankIid": bank_iid,
                    "processed": questions.len(),
                    "updated": updated,
                    "errors": errors,
                }),
                history: ctx.client.history(),
            })
        }
    }
}

/// Derive the KPI duration for one question from its attached filename.
fn kpi_time_for(state: &AppState, question: &Value) -> Result<u64, String> {
    let file = question
        .get("file")
        .and_then(Value::as_str)
        .ok_or_else(|| "no attached file".to_string())?;

    let index = index_from_filename(file)
        .ok_or_else(|| format!("cannot derive KPI index from '{file}'"))?;

    state
        .kpi_table
        .duration_for_index(index)
        .ok_or_else(|| {
            format!(
                "KPI index {index} from '{file}' outside table range 1..={}",
                state.kpi_table.len()
            )
        })
}
