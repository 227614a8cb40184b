//! Account and container-name resolution, memoized for a single call.
//!
//! A `Resolver` is created per operation and dropped with it, so renamed
//! mailboxes or calendars are always seen by the next call. It also fetches
//! the session once per operation, so accounts are never stale.

use crate::error::{EntityKind, Error, Result};
use crate::jmap::{Transport, parse_response};
use crate::models::{CAPABILITY_CALENDARS, CAPABILITY_MAIL, Calendar, Mailbox, Session};
use crate::query::AccountRef;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Deserialize)]
struct GetResponse<T> {
    list: Vec<T>,
}

pub struct Resolver<'a> {
    transport: &'a dyn Transport,
    session: Option<Session>,
    containers: HashMap<(EntityKind, String, String), String>,
}

impl<'a> Resolver<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            session: None,
            containers: HashMap::new(),
        }
    }

    async fn session(&mut self) -> Result<&Session> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.transport.refresh_session().await?,
        };
        Ok(self.session.insert(session))
    }

    /// Primary account for `capability`, or the explicit id if the session
    /// knows it.
    pub async fn resolve_account(&mut self, account: &AccountRef, capability: &str) -> Result<String> {
        let session = self.session().await?;
        match account {
            AccountRef::Primary => session
                .primary_account_id(capability)
                .map(str::to_string)
                .ok_or_else(|| Error::not_found(EntityKind::Account, "primary")),
            AccountRef::Explicit(id) if session.accounts.contains_key(id) => Ok(id.clone()),
            AccountRef::Explicit(id) => Err(Error::not_found(EntityKind::Account, id.as_str())),
        }
    }

    /// Match on name first, then on role, ignoring case.
    pub async fn resolve_mailbox(&mut self, account_id: &str, name: &str) -> Result<String> {
        self.lookup(EntityKind::Mailbox, account_id, name).await
    }

    pub async fn resolve_calendar(&mut self, account_id: &str, name: &str) -> Result<String> {
        self.lookup(EntityKind::Calendar, account_id, name).await
    }

    #[instrument(skip(self))]
    async fn lookup(&mut self, kind: EntityKind, account_id: &str, name: &str) -> Result<String> {
        let key = (kind, account_id.to_string(), name.to_lowercase());
        if let Some(id) = self.containers.get(&key) {
            return Ok(id.clone());
        }

        let found = match kind {
            EntityKind::Calendar => self.find_calendar(account_id, name).await?,
            _ => self.find_mailbox(account_id, name).await?,
        };
        let id = found.ok_or_else(|| Error::not_found(kind, name))?;
        debug!(%id, "Resolved {} name", kind);
        self.containers.insert(key, id.clone());
        Ok(id)
    }

    async fn find_mailbox(&self, account_id: &str, name: &str) -> Result<Option<String>> {
        let responses = self
            .transport
            .send(
                &[CAPABILITY_MAIL],
                vec![json!([
                    "Mailbox/get",
                    { "accountId": account_id, "properties": ["id", "name", "role"] },
                    "m0"
                ])],
            )
            .await?;
        let resp: GetResponse<Mailbox> = parse_response(&responses, "m0", "Mailbox/get")?;

        let name_lower = name.to_lowercase();
        let by_name = resp
            .list
            .iter()
            .find(|m| m.name.to_lowercase() == name_lower);
        let by_role = || {
            resp.list
                .iter()
                .find(|m| m.role.as_deref().map(str::to_lowercase).as_deref() == Some(name_lower.as_str()))
        };
        Ok(by_name.or_else(by_role).map(|m| m.id.clone()))
    }

    async fn find_calendar(&self, account_id: &str, name: &str) -> Result<Option<String>> {
        let responses = self
            .transport
            .send(
                &[CAPABILITY_CALENDARS],
                vec![json!([
                    "Calendar/get",
                    { "accountId": account_id, "properties": ["id", "name"] },
                    "c0"
                ])],
            )
            .await?;
        let resp: GetResponse<Calendar> = parse_response(&responses, "c0", "Calendar/get")?;

        let name_lower = name.to_lowercase();
        Ok(resp
            .list
            .into_iter()
            .find(|c| c.name.to_lowercase() == name_lower)
            .map(|c| c.id))
    }
}
