//! Fix-syllabus-sequential flow
//!
//! A syllabus is addressed by two distinct identifiers: `syllabus_iid` is
//! the LMS-internal id used to populate sequential numbering, `syllabus_id`
//! is the database id used to change its status. Populate must succeed
//! before the status change is attempted; on populate failure the status
//! call is never issued.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::app_state::AppState;
use crate::lms_client::SendRequest;

use super::{acquire_client, parse_integer_id, FlowError, FlowOutput, FlowRequest, FlowResult};

const SEARCH_PATH: &str = "/syllabus/search";
const POPULATE_PATH: &str = "/syllabus/populate-sequential";
const STATUS_PATH: &str = "/syllabus/update-status";

const APPROVED_STATUS: &str = "approved";

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FixSyllabusAction {
    SearchSyllabuses {
        #[serde(default)]
        keyword: Option<String>,
    },
    FixSyllabus {
        syllabus_id: Value,
        syllabus_iid: Value,
    },
}

pub async fn run(
    state: &AppState,
    admin_user: &str,
    req: FlowRequest<FixSyllabusAction>,
) -> FlowResult {
    let parsed_ids = match &req.action {
        FixSyllabusAction::FixSyllabus {
            syllabus_id,
            syllabus_iid,
        } => Some((
            parse_integer_id("syllabus_id", syllabus_id)?,
            parse_integer_id("syllabus_iid", syllabus_iid)?,
        )),
        FixSyllabusAction::SearchSyllabuses { .. } => None,
    };

    let ctx = acquire_client(state, admin_user, &req).await?;

    match req.action {
        FixSyllabusAction::SearchSyllabuses { keyword } => {
            let mut payload = Map::new();
            if let Some(keyword) = keyword {
                payload.insert("name".into(), Value::String(keyword));
            }

            let outcome = ctx.client.send(SendRequest::post(SEARCH_PATH, payload)).await;
            if !outcome.success {
                return Err(FlowError::execution(
                    outcome
                        .error
                        .unwrap_or_else(|| "syllabus search failed".into()),
                )
                .with_history(ctx.client.history()));
            }

            let syllabuses = outcome
                .data
                .get("syllabuses")
                .cloned()
                .unwrap_or_else(|| json!([]));

            Ok(FlowOutput {
                data: json!({ "syllabuses": syllabuses }),
                history: ctx.client.history(),
            })
        }

        FixSyllabusAction::FixSyllabus { .. } => {
            let (syllabus_id, syllabus_iid) = parsed_ids.expect("validated above");

            // step 1: populate sequential numbering, keyed by the internal id
            let mut populate = Map::new();
            populate.insert("syllabus_iid".into(), json!(syllabus_iid));

            let outcome = ctx
                .client
                .send(SendRequest::post(POPULATE_PATH, populate))
                .await;
            let populate_ok = outcome.success && outcome.api_success() != Some(false);
            if !populate_ok {
                // surfaced immediately; the status change is skipped
                let message = outcome
                    .error
                    .clone()
                    .or_else(|| outcome.api_error())
                    .unwrap_or_else(|| "sequential populate failed".into());
                return Err(FlowError::execution(format!("populate: {message}"))
                    .with_history(ctx.client.history()));
            }

            // step 2: approve, keyed by the database id
            let mut status = Map::new();
            status.insert("syllabus_id".into(), json!(syllabus_id));
            status.insert("status".into(), json!(APPROVED_STATUS));

            let outcome = ctx.client.send(SendRequest::post(STATUS_PATH, status)).await;
            if !outcome.success {
                return Err(FlowError::execution(format!(
                    "status change: {}",
                    outcome
                        .error
                        .unwrap_or_else(|| "status update failed".into())
                ))
                .with_history(ctx.client.history()));
            }

            Ok(FlowOutput {
                data: json!({
                    "syllabusId": syllabus_id,
                    "syllabusIid": syllabus_iid,
                    "populated": true,
                    "status": APPROVED_STATUS,
                }),
                history: ctx.client.history(),
            })
        }
    }
}
