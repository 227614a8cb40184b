//! JMAP transport: session discovery and method-call batches over HTTP.

use crate::config::{Config, Credentials};
use crate::error::{Error, ExecutionError, Result};
use crate::models::{CAPABILITY_CORE, Session};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[cfg(test)]
pub(crate) mod fake;

const SESSION_PATH: &str = "/jmap/session";
const TIMEOUT: Duration = Duration::from_secs(30);

/// The authenticated request primitive everything above it is built on.
///
/// Implementations deliver each batch exactly once and report network and
/// auth problems as [`ExecutionError`]s. No retries happen above this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The session document, possibly from an earlier call.
    async fn session(&self) -> Result<Session>;

    /// Fetch the session again so account changes are seen.
    async fn refresh_session(&self) -> Result<Session> {
        self.session().await
    }

    /// Send one batch of method calls and return the raw `methodResponses`.
    async fn send(&self, using: &[&str], method_calls: Vec<Value>) -> Result<Vec<Value>>;
}

pub struct JmapClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    /// Latest session; `send` reads `apiUrl` from it.
    session: RwLock<Option<Session>>,
}

#[derive(Debug, Serialize)]
struct JmapRequest {
    using: Vec<String>,
    #[serde(rename = "methodCalls")]
    method_calls: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct JmapResponse {
    #[serde(rename = "methodResponses")]
    method_responses: Vec<Value>,
}

impl JmapClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Result<Self> {
        Self::with_timeout(base_url, credentials, TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            session: RwLock::new(None),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.base_url(), config.credentials()?)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Token(token) => req.bearer_auth(token),
            Credentials::Basic { username, password } => req.basic_auth(username, Some(password)),
        }
    }

    fn check_status(status: StatusCode) -> Result<()> {
        match status.as_u16() {
            401 | 403 => Err(ExecutionError::AuthFailure(format!("Server returned {}", status)).into()),
            429 => Err(ExecutionError::TransportFailure("Rate limited. Try again later.".into()).into()),
            _ if !status.is_success() => {
                Err(ExecutionError::TransportFailure(format!("Server returned {}", status)).into())
            }
            _ => Ok(()),
        }
    }

    #[instrument(skip(self))]
    async fn fetch_session(&self) -> Result<Session> {
        let url = format!("{}{}", self.base_url, SESSION_PATH);
        debug!(%url, "Fetching JMAP session");
        let resp = self.authorize(self.client.get(&url)).send().await?;
        Self::check_status(resp.status())?;

        let session: Session = resp.json().await?;
        debug!(username = %session.username, "Session established");
        Ok(session)
    }
}

#[async_trait]
impl Transport for JmapClient {
    async fn session(&self) -> Result<Session> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.clone());
        }
        self.refresh_session().await
    }

    async fn refresh_session(&self) -> Result<Session> {
        let session = self.fetch_session().await?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    #[instrument(skip(self, method_calls), fields(calls = method_calls.len()))]
    async fn send(&self, using: &[&str], method_calls: Vec<Value>) -> Result<Vec<Value>> {
        let session = self.session().await?;
        let mut capabilities = vec![CAPABILITY_CORE.to_string()];
        capabilities.extend(
            using
                .iter()
                .filter(|c| **c != CAPABILITY_CORE)
                .map(|c| c.to_string()),
        );
        let req = JmapRequest {
            using: capabilities,
            method_calls,
        };

        debug!(url = %session.api_url, "Making JMAP request");
        let resp = self
            .authorize(self.client.post(&session.api_url))
            .json(&req)
            .send()
            .await?;
        Self::check_status(resp.status())?;

        let jmap_resp: JmapResponse = resp.json().await?;
        Ok(jmap_resp.method_responses)
    }
}

/// Find the invocation answering `call_id`.
fn find_response<'a>(responses: &'a [Value], call_id: &str) -> Option<&'a [Value]> {
    responses
        .iter()
        .filter_map(Value::as_array)
        .find(|inv| inv.get(2).and_then(Value::as_str) == Some(call_id))
        .map(Vec::as_slice)
}

/// Decode the arguments of the response to `call_id`, turning JMAP `error`
/// invocations into [`Error::Jmap`].
pub fn parse_response<T: for<'de> Deserialize<'de>>(
    responses: &[Value],
    call_id: &str,
    expected_method: &str,
) -> Result<T> {
    let jmap_err = |error_type: &str, description: String| Error::Jmap {
        method: expected_method.into(),
        error_type: error_type.into(),
        description,
    };

    let inv = find_response(responses, call_id)
        .ok_or_else(|| jmap_err("parse", format!("No response for call {}", call_id)))?;

    let method_name = inv.first().and_then(Value::as_str).unwrap_or("");
    let data = inv.get(1).unwrap_or(&Value::Null);

    if method_name == "error" {
        let error_type = data
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let description = data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("No description");
        return Err(jmap_err(error_type, description.into()));
    }

    if method_name != expected_method {
        return Err(jmap_err(
            "parse",
            format!("Unexpected response method {:?}", method_name),
        ));
    }

    serde_json::from_value(data.clone()).map_err(|e| jmap_err("parse", e.to_string()))
}
