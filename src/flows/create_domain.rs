//! Create-domain flow
//!
//! Step 1 fetches the available domain groups; step 2 creates a domain from
//! a slug and a group. The LMS answers domain creation with HTTP 200 even
//! when it refuses the request, so the creation result always reports
//! transport success and surfaces the LMS's own verdict separately as
//! `apiSuccess`/`apiError`; callers must inspect both.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::app_state::AppState;
use crate::lms_client::SendRequest;

use super::{acquire_client, FlowError, FlowOutput, FlowRequest, FlowResult};

const GROUPS_PATH: &str = "/domain/groups";
const CREATE_PATH: &str = "/domain/new";

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CreateDomainAction {
    GetDomainGroups {},
    CreateDomain {
        slug: String,
        domain_group: String,
    },
}

pub async fn run(
    state: &AppState,
    admin_user: &str,
    req: FlowRequest<CreateDomainAction>,
) -> FlowResult {
    if let CreateDomainAction::CreateDomain { slug, .. } = &req.action {
        if slug.trim().is_empty() {
            return Err(FlowError::validation("slug must not be empty"));
        }
    }

    let ctx = acquire_client(state, admin_user, &req).await?;

    match req.action {
        CreateDomainAction::GetDomainGroups {} => {
            let outcome = ctx
                .client
                .send(SendRequest::get(GROUPS_PATH, Map::new()))
                .await;
            if !outcome.success {
                return Err(FlowError::execution(
                    outcome
                        .error
                        .unwrap_or_else(|| "domain group fetch failed".into()),
                )
                .with_history(ctx.client.history()));
            }

            let groups = outcome
                .data
                .get("groups")
                .cloned()
                .unwrap_or_else(|| json!([]));

            Ok(FlowOutput {
                data: json!({ "groups": groups }),
                history: ctx.client.history(),
            })
        }

        CreateDomainAction::CreateDomain { slug, domain_group } => {
            let mut payload = Map::new();
            payload.insert("slug".into(), Value::String(slug));
            payload.insert("domain_group".into(), Value::String(domain_group));

            let outcome = ctx.client.send(SendRequest::post(CREATE_PATH, payload)).await;
            if !outcome.success {
                return Err(FlowError::execution(
                    outcome
                        .error
                        .unwrap_or_else(|| "domain creation request failed".into()),
                )
                .with_history(ctx.client.history()));
            }

            // transport success does not imply business success
            let api_success = outcome.api_success().unwrap_or(true);
            let api_error = if api_success {
                Value::Null
            } else {
                outcome
                    .api_error()
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            };

            Ok(FlowOutput {
                data: json!({
                    "apiSuccess": api_success,
                    "apiError": api_error,
                    "domain": outcome.data.get("domain").cloned().unwrap_or(Value::Null),
                }),
                history: ctx.client.history(),
            })
        }
    }
}
