//! In-memory JMAP server for unit tests.
//!
//! Answers `Mailbox/get`, `Calendar/get`, `*/query` and `*/get` from fixture
//! records and keeps a log of every batch it receives.

use super::Transport;
use crate::error::{ExecutionError, Result};
use crate::models::Session;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

pub(crate) struct FakeTransport {
    session: Session,
    pub mailboxes: Mutex<Vec<Value>>,
    pub calendars: Mutex<Vec<Value>>,
    pub emails: Vec<Value>,
    pub contacts: Vec<Value>,
    pub events: Vec<Value>,
    /// Listing order differs from query order, as real servers may do.
    pub reverse_get_order: bool,
    fail_with: Option<ExecutionError>,
    log: Mutex<Vec<Vec<String>>>,
    session_calls: Mutex<usize>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let session: Session = serde_json::from_value(json!({
            "accounts": {
                "u1": {"name": "me@example.com", "isPersonal": true},
                "u2": {"name": "shared@example.com", "isPersonal": false}
            },
            "primaryAccounts": {
                "urn:ietf:params:jmap:mail": "u1",
                "urn:ietf:params:jmap:contacts": "u1",
                "urn:ietf:params:jmap:calendars": "u1"
            },
            "username": "me@example.com",
            "apiUrl": "https://jmap.test/api"
        }))
        .expect("fixture session");

        Self {
            session,
            mailboxes: Mutex::new(vec![
                json!({"id": "mb-inbox", "name": "Inbox", "role": "inbox"}),
                json!({"id": "mb-sent", "name": "Sent Items", "role": "sent"}),
                json!({"id": "mb-archive", "name": "Archive", "role": "archive"}),
            ]),
            calendars: Mutex::new(vec![
                json!({"id": "cal-personal", "name": "Personal"}),
                json!({"id": "cal-work", "name": "Work"}),
            ]),
            emails: Vec::new(),
            contacts: Vec::new(),
            events: Vec::new(),
            reverse_get_order: false,
            fail_with: None,
            log: Mutex::new(Vec::new()),
            session_calls: Mutex::new(0),
        }
    }

    pub fn failing(err: ExecutionError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::new()
        }
    }

    pub fn email(id: &str, mailbox: &str, from: &str, subject: &str, received_at: &str) -> Value {
        json!({
            "id": id,
            "threadId": format!("t-{id}"),
            "mailboxIds": {mailbox: true},
            "keywords": {},
            "receivedAt": received_at,
            "sentAt": received_at,
            "from": [{"name": null, "email": from}],
            "to": [{"name": "Me", "email": "me@example.com"}],
            "subject": subject,
            "preview": format!("preview of {subject}"),
            "hasAttachment": false,
            "textBody": [{"partId": "1", "type": "text/plain"}],
            "bodyValues": {"1": {"value": format!("body of {subject}")}}
        })
    }

    pub fn send_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn session_count(&self) -> usize {
        *self.session_calls.lock().unwrap()
    }

    /// Method names of every batch, in order.
    pub fn methods(&self) -> Vec<Vec<String>> {
        self.log.lock().unwrap().clone()
    }

    pub fn all_methods(&self) -> Vec<String> {
        self.methods().into_iter().flatten().collect()
    }

    fn answer(&self, name: &str, args: &Value) -> (String, Value) {
        let ok = |v: Value| (name.to_string(), v);
        match name {
            "Mailbox/get" => ok(get_from(&self.mailboxes.lock().unwrap(), args, false)),
            "Calendar/get" => ok(get_from(&self.calendars.lock().unwrap(), args, false)),
            "Email/get" => ok(get_from(&self.emails, args, self.reverse_get_order)),
            "ContactCard/get" => ok(get_from(&self.contacts, args, self.reverse_get_order)),
            "CalendarEvent/get" => ok(get_from(&self.events, args, self.reverse_get_order)),
            "Email/query" => match query_emails(&self.emails, args) {
                Ok(v) => ok(v),
                Err(e) => ("error".into(), json!({"type": e, "description": "bad filter"})),
            },
            "ContactCard/query" => ok(window(self.contacts.clone(), args)),
            "CalendarEvent/query" => {
                let calendar = args
                    .pointer("/filter/inCalendars/0")
                    .and_then(Value::as_str);
                let mut events: Vec<Value> = self
                    .events
                    .iter()
                    .filter(|e| calendar.is_none_or(|c| e["calendarIds"].get(c).is_some()))
                    .cloned()
                    .collect();
                events.sort_by(|a, b| a["start"].as_str().cmp(&b["start"].as_str()));
                ok(window(events, args))
            }
            _ => (
                "error".into(),
                json!({"type": "unknownMethod", "description": name}),
            ),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn session(&self) -> Result<Session> {
        *self.session_calls.lock().unwrap() += 1;
        if let Some(err) = &self.fail_with {
            return Err(err.clone().into());
        }
        Ok(self.session.clone())
    }

    async fn send(&self, _using: &[&str], method_calls: Vec<Value>) -> Result<Vec<Value>> {
        let names = method_calls
            .iter()
            .map(|c| c[0].as_str().unwrap_or_default().to_string())
            .collect();
        self.log.lock().unwrap().push(names);
        if let Some(err) = &self.fail_with {
            return Err(err.clone().into());
        }

        Ok(method_calls
            .iter()
            .map(|call| {
                let (name, args) = self.answer(call[0].as_str().unwrap_or_default(), &call[1]);
                json!([name, args, call[2]])
            })
            .collect())
    }
}

fn get_from(records: &[Value], args: &Value, reverse: bool) -> Value {
    let Some(ids) = args.get("ids").and_then(Value::as_array) else {
        return json!({"list": records, "notFound": []});
    };
    let by_id: HashMap<&str, &Value> = records
        .iter()
        .filter_map(|r| Some((r["id"].as_str()?, r)))
        .collect();
    let mut list = Vec::new();
    let mut not_found = Vec::new();
    for id in ids.iter().filter_map(Value::as_str) {
        match by_id.get(id) {
            Some(r) => list.push((*r).clone()),
            None => not_found.push(id.to_string()),
        }
    }
    if reverse {
        list.reverse();
    }
    json!({"list": list, "notFound": not_found})
}

fn window(records: Vec<Value>, args: &Value) -> Value {
    let position = args["position"].as_u64().unwrap_or(0) as usize;
    let limit = args["limit"].as_u64().unwrap_or(u64::MAX) as usize;
    let ids: Vec<Value> = records
        .iter()
        .skip(position)
        .take(limit)
        .map(|r| r["id"].clone())
        .collect();
    json!({"ids": ids, "position": position, "total": records.len()})
}

fn query_emails(emails: &[Value], args: &Value) -> std::result::Result<Value, &'static str> {
    let mut matched = Vec::new();
    for email in emails {
        let hit = match args.get("filter") {
            Some(f) => matches(email, f)?,
            None => true,
        };
        if hit {
            matched.push(email.clone());
        }
    }

    if let Some(sort) = args["sort"].get(0) {
        let property = sort["property"].as_str().unwrap_or("receivedAt").to_string();
        let ascending = sort["isAscending"].as_bool().unwrap_or(false);
        matched.sort_by(|a, b| {
            let ord = a[property.as_str()].as_str().cmp(&b[property.as_str()].as_str());
            if ascending { ord } else { ord.reverse() }
        });
    }
    Ok(window(matched, args))
}

fn matches(email: &Value, filter: &Value) -> std::result::Result<bool, &'static str> {
    let obj: &Map<String, Value> = filter.as_object().ok_or("invalidArguments")?;
    if obj.get("operator").and_then(Value::as_str) == Some("AND") {
        for cond in obj["conditions"].as_array().ok_or("invalidArguments")? {
            if !matches(email, cond)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    for (key, value) in obj {
        let hit = match key.as_str() {
            "from" => email["from"]
                .as_array()
                .into_iter()
                .flatten()
                .any(|a| a["email"].as_str().unwrap_or("").contains(value.as_str().unwrap_or(""))),
            "subject" => email["subject"]
                .as_str()
                .unwrap_or("")
                .to_lowercase()
                .contains(&value.as_str().unwrap_or("").to_lowercase()),
            "inMailbox" => email["mailboxIds"].get(value.as_str().unwrap_or("")).is_some(),
            "hasKeyword" => email["keywords"].get(value.as_str().unwrap_or("")).is_some(),
            "notKeyword" => email["keywords"].get(value.as_str().unwrap_or("")).is_none(),
            "hasAttachment" => email["hasAttachment"].as_bool().unwrap_or(false) == value.as_bool().unwrap_or(false),
            "after" => email["receivedAt"].as_str().unwrap_or("") >= value.as_str().unwrap_or(""),
            "before" => email["receivedAt"].as_str().unwrap_or("") < value.as_str().unwrap_or(""),
            _ => return Err("unsupportedFilter"),
        };
        if !hit {
            return Ok(false);
        }
    }
    Ok(true)
}
