//! Authenticated LMS session client
//!
//! One `LmsClient` is bound to a (host, dmn, user_code) triple. Login runs
//! once per client; the reqwest cookie store carries the session across
//! subsequent calls. Every outbound call records exactly one history item,
//! and every fault (transport error, non-JSON body, non-2xx status) is
//! captured into the returned `CallOutcome` instead of propagating.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{AutomationError, AutomationResult};
use crate::history::{HistoryBuffer, RequestHistoryItem};

const LOGIN_PATH: &str = "/user/login";

/// Outcome of one outbound call. `success` means transport-level success
/// (2xx with a parseable JSON body); the LMS's own success flag travels
/// inside `data` and is the caller's business to inspect.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub success: bool,
    pub status: Option<u16>,
    pub data: Value,
    pub error: Option<String>,
}

impl CallOutcome {
    /// The application-level success flag, when the LMS body carries one.
    pub fn api_success(&self) -> Option<bool> {
        self.data.get("success").and_then(Value::as_bool)
    }

    /// Best-effort application-level error message from the LMS body.
    pub fn api_error(&self) -> Option<String> {
        self.data
            .get("message")
            .or_else(|| self.data.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub path: String,
    pub method: Method,
    pub payload: Map<String, Value>,
    /// Overrides the client's domain for this one call.
    pub dmn: Option<String>,
    pub loop_index: Option<usize>,
    pub loop_item: Option<String>,
}

impl SendRequest {
    pub fn post(path: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            method: Method::POST,
            payload,
            dmn: None,
            loop_index: None,
            loop_item: None,
        }
    }

    pub fn get(path: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            method: Method::GET,
            ..Self::post(path, payload)
        }
    }

    pub fn with_loop(mut self, index: usize, item: impl Into<String>) -> Self {
        self.loop_index = Some(index);
        self.loop_item = Some(item.into());
        self
    }
}

pub struct LmsClient {
    host: String,
    dmn: String,
    user_code: String,
    http: reqwest::Client,
    default_headers: BTreeMap<String, String>,
    base_params: Map<String, Value>,
    history: HistoryBuffer,
}

impl LmsClient {
    pub fn new(
        host: impl Into<String>,
        dmn: impl Into<String>,
        user_code: impl Into<String>,
        default_headers: BTreeMap<String, String>,
        base_params: Map<String, Value>,
        timeout: Duration,
    ) -> AutomationResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| AutomationError::network("build HTTP client", e))?;

        let host = host.into();
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            dmn: dmn.into(),
            user_code: user_code.into(),
            http,
            default_headers,
            base_params,
            history: HistoryBuffer::new(),
        })
    }

    pub fn dmn(&self) -> &str {
        &self.dmn
    }

    pub fn user_code(&self) -> &str {
        &self.user_code
    }

    pub fn history(&self) -> Vec<RequestHistoryItem> {
        self.history.snapshot()
    }

    /// Reset the buffer so history reflects only the coming action.
    pub fn clear_history(&self) {
        self.history.clear();
    }

    /// Authenticate against the LMS. The session cookie lands in the cookie
    /// store; the login attempt itself stays in the history either way.
    pub async fn login(&self, password: &str) -> AutomationResult<()> {
        let mut payload = Map::new();
        payload.insert("lname".into(), Value::String(self.user_code.clone()));
        payload.insert("password".into(), Value::String(password.to_string()));

        let outcome = self.send(SendRequest::post(LOGIN_PATH, payload)).await;

        if !outcome.success {
            return Err(AutomationError::auth(
                outcome
                    .error
                    .unwrap_or_else(|| "login request failed".to_string()),
            ));
        }
        if outcome.api_success() == Some(false) {
            return Err(AutomationError::auth(
                outcome
                    .api_error()
                    .unwrap_or_else(|| "login rejected by LMS".to_string()),
            ));
        }

        debug!(host = %self.host, user = %self.user_code, "LMS login succeeded");
        Ok(())
    }

    /// Issue one call against the LMS and record it. Never returns an error:
    /// all faults are folded into the outcome.
    pub async fn send(&self, req: SendRequest) -> CallOutcome {
        let url = format!("{}{}", self.host, req.path);
        let merged = self.merged_payload(&req);
        let started_at = Utc::now();
        let start = Instant::now();

        let mut builder = self.http.request(req.method.clone(), &url);
        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        builder = if req.method == Method::GET {
            builder.query(&query_pairs(&merged))
        } else {
            builder.json(&merged)
        };

        let (status, data, error) = match builder.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                match resp.text().await {
                    Ok(text) => match serde_json::from_str::<Value>(&text) {
                        Ok(json) => (Some(status), json, None),
                        Err(_) => (
                            Some(status),
                            Value::Null,
                            Some(format!(
                                "non-JSON response: {}",
                                text.chars().take(200).collect::<String>()
                            )),
                        ),
                    },
                    Err(e) => (Some(status), Value::Null, Some(e.to_string())),
                }
            }
            Err(e) => (e.status().map(|s| s.as_u16()), Value::Null, Some(e.to_string())),
        };

        let transport_ok = status.map(|s| (200..300).contains(&s)).unwrap_or(false);
        let success = transport_ok && error.is_none();
        let error = if success {
            None
        } else {
            Some(error.unwrap_or_else(|| format!("LMS returned status {:?}", status)))
        };

        self.history.push(RequestHistoryItem {
            method: req.method.to_string(),
            url: url.clone(),
            payload: Value::Object(merged),
            status,
            response: if data.is_null() { None } else { Some(data.clone()) },
            error: error.clone(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            started_at,
            loop_index: req.loop_index,
            loop_item: req.loop_item,
        });

        debug!(url = %url, status = ?status, success, "LMS call completed");

        CallOutcome {
            success,
            status,
            data,
            error,
        }
    }

    /// Base params first, then the client domain (or the per-call override),
    /// then call-specific fields; later writers win.
    fn merged_payload(&self, req: &SendRequest) -> Map<String, Value> {
        let mut merged = self.base_params.clone();
        let dmn = req.dmn.clone().unwrap_or_else(|| self.dmn.clone());
        merged.insert("dmn".into(), Value::String(dmn));
        for (k, v) in &req.payload {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }
}

fn query_pairs(payload: &Map<String, Value>) -> Vec<(String, String)> {
    payload
        .iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}
