//! Two-stage query execution: ids first, then the records for that page.

use crate::error::{EntityKind, Error, Result};
use crate::jmap::{Transport, parse_response};
use crate::query::{RecordKind, ResolvedQuery};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Extra properties fetched when a single message is shown in full.
const MESSAGE_DETAIL_PROPERTIES: &[&str] = &["textBody", "bodyValues"];

/// Output of the id query: the page of ids to fetch, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPage {
    pub account_id: String,
    pub kind: RecordKind,
    pub ids: Vec<String>,
    pub total: Option<u64>,
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<String>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Deserialize)]
struct GetResponse {
    list: Vec<Value>,
    #[serde(rename = "notFound", default)]
    not_found: Vec<String>,
}

pub struct Executor<'a> {
    transport: &'a dyn Transport,
}

impl<'a> Executor<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Run both stages. The query is consumed; nothing is retried.
    pub async fn execute(&self, query: ResolvedQuery) -> Result<Vec<Value>> {
        let page = self.query_ids(query).await?;
        self.fetch(page).await
    }

    /// Stage one. When the query is scoped to a container, the same batch
    /// checks the container still exists.
    #[instrument(skip(self, query), fields(kind = ?query.kind, account = %query.account_id))]
    pub async fn query_ids(&self, query: ResolvedQuery) -> Result<IdPage> {
        let mut calls = Vec::with_capacity(2);
        if let Some(container) = &query.container {
            calls.push(json!([
                container.get_method(),
                { "accountId": query.account_id, "ids": [container.id], "properties": ["id"] },
                "c0"
            ]));
        }
        calls.push(json!([query.kind.query_method(), query.query_arguments(), "q0"]));

        let responses = self.transport.send(&[query.kind.capability()], calls).await?;

        if let Some(container) = &query.container {
            let check: GetResponse = parse_response(&responses, "c0", container.get_method())?;
            if check.list.is_empty() || check.not_found.contains(&container.id) {
                return Err(Error::StaleReference {
                    kind: container.kind,
                    id: container.id.clone(),
                });
            }
        }

        let resp: QueryResponse = parse_response(&responses, "q0", query.kind.query_method())?;
        let mut ids = resp.ids;
        ids.truncate(query.limit as usize);
        debug!(count = ids.len(), total = ?resp.total, "Query matched");

        Ok(IdPage {
            account_id: query.account_id,
            kind: query.kind,
            ids,
            total: resp.total,
        })
    }

    /// Stage two. Records come back in the order of `page.ids`; ids that
    /// disappeared since stage one are skipped.
    #[instrument(skip(self, page), fields(kind = ?page.kind, count = page.ids.len()))]
    pub async fn fetch(&self, page: IdPage) -> Result<Vec<Value>> {
        if page.ids.is_empty() {
            return Ok(Vec::new());
        }

        let method = page.kind.get_method();
        let responses = self
            .transport
            .send(
                &[page.kind.capability()],
                vec![json!([
                    method,
                    {
                        "accountId": page.account_id,
                        "ids": page.ids,
                        "properties": page.kind.properties(),
                    },
                    "g0"
                ])],
            )
            .await?;
        let resp: GetResponse = parse_response(&responses, "g0", method)?;
        if !resp.not_found.is_empty() {
            debug!(missing = ?resp.not_found, "Records vanished between query and fetch");
        }

        let mut by_id: HashMap<String, Value> = resp
            .list
            .into_iter()
            .filter_map(|r| Some((r.get("id")?.as_str()?.to_string(), r)))
            .collect();
        Ok(page.ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Fetch one message with its text body.
    #[instrument(skip(self))]
    pub async fn get_message(&self, account_id: &str, message_id: &str) -> Result<Value> {
        let kind = RecordKind::Message;
        let properties: Vec<&str> = kind
            .properties()
            .iter()
            .chain(MESSAGE_DETAIL_PROPERTIES)
            .copied()
            .collect();

        let responses = self
            .transport
            .send(
                &[kind.capability()],
                vec![json!([
                    kind.get_method(),
                    {
                        "accountId": account_id,
                        "ids": [message_id],
                        "properties": properties,
                        "fetchTextBodyValues": true,
                    },
                    "g0"
                ])],
            )
            .await?;
        let resp: GetResponse = parse_response(&responses, "g0", kind.get_method())?;

        resp.list
            .into_iter()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(message_id))
            .ok_or_else(|| Error::not_found(EntityKind::Message, message_id))
    }
}
