//! Compiles typed descriptors into JMAP `*/query` arguments.

use super::filter::{FilterDescriptor, PageSpec, SortSpec};
use crate::error::EntityKind;
use crate::models::{CAPABILITY_CALENDARS, CAPABILITY_CONTACTS, CAPABILITY_MAIL};
use serde_json::{Map, Value, json};

/// Which record family a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Message,
    Contact,
    Event,
}

impl RecordKind {
    pub fn capability(self) -> &'static str {
        match self {
            Self::Message => CAPABILITY_MAIL,
            Self::Contact => CAPABILITY_CONTACTS,
            Self::Event => CAPABILITY_CALENDARS,
        }
    }

    pub fn query_method(self) -> &'static str {
        match self {
            Self::Message => "Email/query",
            Self::Contact => "ContactCard/query",
            Self::Event => "CalendarEvent/query",
        }
    }

    pub fn get_method(self) -> &'static str {
        match self {
            Self::Message => "Email/get",
            Self::Contact => "ContactCard/get",
            Self::Event => "CalendarEvent/get",
        }
    }

    /// Properties requested from `*/get` for list-style results.
    pub fn properties(self) -> &'static [&'static str] {
        match self {
            Self::Message => &[
                "id", "threadId", "mailboxIds", "keywords", "receivedAt", "sentAt",
                "from", "to", "cc", "subject", "preview", "hasAttachment",
            ],
            Self::Contact => &[
                "id", "name", "emails", "phones", "organizations", "updated",
            ],
            Self::Event => &[
                "id", "calendarIds", "title", "start", "timeZone", "duration",
                "utcStart", "utcEnd", "showWithoutTime", "locations", "participants",
                "recurrenceRules",
            ],
        }
    }
}

/// A resolved mailbox or calendar the query is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub kind: EntityKind,
    pub id: String,
}

impl Container {
    pub fn mailbox(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Mailbox,
            id: id.into(),
        }
    }

    pub fn calendar(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Calendar,
            id: id.into(),
        }
    }

    /// `*/get` method used to check the container still exists.
    pub fn get_method(&self) -> &'static str {
        match self.kind {
            EntityKind::Calendar => "Calendar/get",
            _ => "Mailbox/get",
        }
    }
}

/// A fully compiled query. Built once, handed to the executor by value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub account_id: String,
    pub kind: RecordKind,
    pub container: Option<Container>,
    pub filter: Option<Value>,
    pub sort: Vec<Value>,
    pub position: u32,
    pub limit: u32,
}

impl ResolvedQuery {
    /// Arguments object for the `*/query` method call.
    pub fn query_arguments(&self) -> Value {
        let mut args = Map::new();
        args.insert("accountId".into(), json!(self.account_id));
        if let Some(filter) = &self.filter {
            args.insert("filter".into(), filter.clone());
        }
        if !self.sort.is_empty() {
            args.insert("sort".into(), Value::Array(self.sort.clone()));
        }
        args.insert("position".into(), json!(self.position));
        args.insert("limit".into(), json!(self.limit));
        Value::Object(args)
    }
}

/// Collapse predicate terms: none → no filter, one → itself, more → AND.
fn combine(mut terms: Vec<Value>) -> Option<Value> {
    match terms.len() {
        0 => None,
        1 => terms.pop(),
        _ => Some(json!({ "operator": "AND", "conditions": terms })),
    }
}

/// `mailbox_id` is the already-resolved id for `filter.mailbox`; the name
/// itself is never sent to the server.
pub fn compile_messages(
    filter: &FilterDescriptor,
    sort: &SortSpec,
    page: &PageSpec,
    account_id: &str,
    mailbox_id: Option<&str>,
) -> ResolvedQuery {
    let mut terms = Vec::new();

    if let Some(sender) = &filter.sender {
        terms.push(json!({ "from": sender }));
    }
    if let Some(subject) = &filter.subject {
        terms.push(json!({ "subject": subject }));
    }
    if let Some(mailbox) = mailbox_id {
        terms.push(json!({ "inMailbox": mailbox }));
    }
    match filter.read {
        Some(true) => terms.push(json!({ "hasKeyword": "$seen" })),
        Some(false) => terms.push(json!({ "notKeyword": "$seen" })),
        None => {}
    }
    if let Some(has_attachment) = filter.has_attachment {
        terms.push(json!({ "hasAttachment": has_attachment }));
    }
    // Calendar days are taken in UTC, both ends inclusive.
    if let Some(start) = filter.date_start {
        terms.push(json!({ "after": format!("{}T00:00:00Z", start) }));
    }
    if let Some(end) = filter.date_end {
        terms.push(json!({ "before": format!("{}T23:59:59Z", end) }));
    }

    ResolvedQuery {
        account_id: account_id.to_string(),
        kind: RecordKind::Message,
        container: mailbox_id.map(Container::mailbox),
        filter: combine(terms),
        sort: vec![json!({
            "property": sort.field.property(),
            "isAscending": sort.ascending,
        })],
        position: page.offset,
        limit: page.limit,
    }
}

pub fn compile_contacts(page: &PageSpec, account_id: &str) -> ResolvedQuery {
    ResolvedQuery {
        account_id: account_id.to_string(),
        kind: RecordKind::Contact,
        container: None,
        filter: None,
        sort: Vec::new(),
        position: page.offset,
        limit: page.limit,
    }
}

/// Events come back soonest first.
pub fn compile_events(page: &PageSpec, account_id: &str, calendar_id: Option<&str>) -> ResolvedQuery {
    ResolvedQuery {
        account_id: account_id.to_string(),
        kind: RecordKind::Event,
        container: calendar_id.map(Container::calendar),
        filter: calendar_id.map(|id| json!({ "inCalendars": [id] })),
        sort: vec![json!({ "property": "start", "isAscending": true })],
        position: page.offset,
        limit: page.limit,
    }
}
