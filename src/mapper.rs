//! Raw JMAP records → stable output records.
//!
//! Every timestamp is rendered in one display zone, e.g.
//! `2024-01-05 04:00 AM CST`. Mapping never drops or reorders records.

use crate::error::{Error, Result};
use crate::models::{CalendarEvent, ContactCard, Email, EmailAddress};
use crate::query::RecordKind;
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %I:%M %p %Z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayZone(Tz);

impl Default for DisplayZone {
    fn default() -> Self {
        Self(chrono_tz::America::Chicago)
    }
}

impl From<Tz> for DisplayZone {
    fn from(tz: Tz) -> Self {
        Self(tz)
    }
}

impl DisplayZone {
    pub fn tz(&self) -> Tz {
        self.0
    }

    pub fn render(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.0)
            .format(DISPLAY_FORMAT)
            .to_string()
    }

    /// Render an RFC 3339 timestamp; unparseable input renders as `None`.
    fn render_raw(&self, field: &str, raw: Option<&str>) -> Option<String> {
        parse_instant(field, raw?).map(|t| self.render(t))
    }
}

fn parse_instant(field: &str, raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            warn!(field, value = raw, error = %e, "Unparseable timestamp");
            None
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MessageFlags {
    pub read: bool,
    pub has_attachment: bool,
    pub flagged: bool,
    pub draft: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    pub thread_id: Option<String>,
    pub subject: Option<String>,
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub mailbox_ids: Vec<String>,
    pub received_at: Option<String>,
    pub sent_at: Option<String>,
    pub flags: MessageFlags,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ContactFlags {
    pub has_email: bool,
    pub has_phone: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContactRecord {
    pub id: String,
    pub name: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub organizations: Vec<String>,
    pub updated_at: Option<String>,
    pub flags: ContactFlags,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct EventFlags {
    pub all_day: bool,
    pub recurring: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventRecord {
    pub id: String,
    pub title: Option<String>,
    pub calendar_ids: Vec<String>,
    pub organizer: Option<String>,
    pub location: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub flags: EventFlags,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordMapper {
    zone: DisplayZone,
}

impl RecordMapper {
    pub fn new(zone: DisplayZone) -> Self {
        Self { zone }
    }

    pub fn messages(&self, raw: Vec<Value>) -> Result<Vec<MessageRecord>> {
        decode_all::<Email>(raw, RecordKind::Message)
            .map(|emails| emails.iter().map(|e| self.message(e)).collect())
    }

    pub fn contacts(&self, raw: Vec<Value>) -> Result<Vec<ContactRecord>> {
        decode_all::<ContactCard>(raw, RecordKind::Contact)
            .map(|cards| cards.iter().map(|c| self.contact(c)).collect())
    }

    pub fn events(&self, raw: Vec<Value>) -> Result<Vec<EventRecord>> {
        decode_all::<CalendarEvent>(raw, RecordKind::Event)
            .map(|events| events.iter().map(|e| self.event(e)).collect())
    }

    pub fn message(&self, e: &Email) -> MessageRecord {
        let mut mailbox_ids: Vec<String> = e
            .mailbox_ids
            .iter()
            .filter(|(_, on)| **on)
            .map(|(id, _)| id.clone())
            .collect();
        mailbox_ids.sort();

        MessageRecord {
            id: e.id.clone(),
            thread_id: e.thread_id.clone(),
            subject: e.subject.clone(),
            from: addresses(e.from.as_deref()),
            to: addresses(e.to.as_deref()),
            cc: addresses(e.cc.as_deref()),
            preview: e.preview.clone(),
            body: e.text_content().map(str::to_string),
            mailbox_ids,
            received_at: self.zone.render_raw("receivedAt", e.received_at.as_deref()),
            sent_at: self.zone.render_raw("sentAt", e.sent_at.as_deref()),
            flags: MessageFlags {
                read: e.is_read(),
                has_attachment: e.has_attachment.unwrap_or(false),
                flagged: e.is_flagged(),
                draft: e.is_draft(),
            },
        }
    }

    pub fn contact(&self, c: &ContactCard) -> ContactRecord {
        let emails = sorted_values(&c.emails, |e| Some(e.address.clone()));
        let phones = sorted_values(&c.phones, |p| Some(p.number.clone()));
        let organizations = sorted_values(&c.organizations, |o| o.name.clone());
        let name = c
            .name
            .as_ref()
            .and_then(|n| n.display())
            .or_else(|| emails.first().cloned())
            .unwrap_or_else(|| "(unnamed)".to_string());

        ContactRecord {
            id: c.id.clone(),
            name,
            flags: ContactFlags {
                has_email: !emails.is_empty(),
                has_phone: !phones.is_empty(),
            },
            emails,
            phones,
            organizations,
            updated_at: self.zone.render_raw("updated", c.updated.as_deref()),
        }
    }

    pub fn event(&self, e: &CalendarEvent) -> EventRecord {
        let start = event_start(e);
        let end = match e.utc_end.as_deref() {
            Some(raw) => parse_instant("utcEnd", raw),
            None => start
                .zip(e.duration.as_deref().and_then(parse_duration))
                .and_then(|(s, d)| {
                    let end = s.checked_add_signed(d);
                    if end.is_none() {
                        warn!(field = "duration", value = ?e.duration, "Event end out of range");
                    }
                    end
                }),
        };

        let mut calendar_ids: Vec<String> = e
            .calendar_ids
            .iter()
            .filter(|(_, on)| **on)
            .map(|(id, _)| id.clone())
            .collect();
        calendar_ids.sort();

        let organizer = e.participants.as_ref().and_then(|participants| {
            let mut owners: Vec<_> = participants
                .iter()
                .filter(|(_, p)| p.roles.get("owner").copied().unwrap_or(false))
                .collect();
            owners.sort_by(|a, b| a.0.cmp(b.0));
            owners.first().map(|(_, p)| {
                let addr = EmailAddress {
                    name: p.name.clone(),
                    email: p
                        .email
                        .clone()
                        .unwrap_or_default(),
                };
                addr.to_string()
            })
        });

        let location = e.locations.as_ref().and_then(|locations| {
            sorted_values(locations, |l| l.name.clone())
                .into_iter()
                .next()
        });

        EventRecord {
            id: e.id.clone(),
            title: e.title.clone(),
            calendar_ids,
            organizer: organizer.filter(|o| !o.is_empty()),
            location,
            start: start.map(|t| self.zone.render(t)),
            end: end.map(|t| self.zone.render(t)),
            flags: EventFlags {
                all_day: e.show_without_time.unwrap_or(false),
                recurring: e
                    .recurrence_rules
                    .as_ref()
                    .is_some_and(|rules| !rules.is_empty()),
            },
        }
    }
}

fn decode_all<T: DeserializeOwned>(raw: Vec<Value>, kind: RecordKind) -> Result<Vec<T>> {
    raw.into_iter()
        .map(|r| {
            serde_json::from_value(r).map_err(|e| Error::Jmap {
                method: kind.get_method().into(),
                error_type: "parse".into(),
                description: e.to_string(),
            })
        })
        .collect()
}

fn addresses(addrs: Option<&[EmailAddress]>) -> Vec<String> {
    addrs
        .unwrap_or_default()
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// JSContact/JSCalendar maps keyed by opaque ids, flattened in key order.
fn sorted_values<T>(map: &HashMap<String, T>, f: impl Fn(&T) -> Option<String>) -> Vec<String> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .filter_map(|(_, v)| f(v))
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// `utcStart` when the server computed it, otherwise the local `start` in
/// the event's own zone (UTC for floating events).
fn event_start(e: &CalendarEvent) -> Option<DateTime<Utc>> {
    if let Some(raw) = e.utc_start.as_deref() {
        return parse_instant("utcStart", raw);
    }
    let raw = e.start.as_deref()?;
    let local = match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        Ok(t) => t,
        Err(err) => {
            warn!(field = "start", value = raw, error = %err, "Unparseable timestamp");
            return None;
        }
    };
    let tz = match e.time_zone.as_deref().map(str::parse::<Tz>) {
        None => return Some(local.and_utc()),
        Some(Ok(tz)) => tz,
        Some(Err(_)) => {
            warn!(time_zone = ?e.time_zone, "Unknown event time zone, using UTC");
            return Some(local.and_utc());
        }
    };
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => Some(t.with_timezone(&Utc)),
        LocalResult::None => {
            // Skipped by a spring-forward transition.
            warn!(field = "start", value = raw, time_zone = %tz, "Nonexistent local time, shifting forward an hour");
            tz.from_local_datetime(&local.checked_add_signed(TimeDelta::hours(1))?)
                .earliest()
                .map(|t| t.with_timezone(&Utc))
        }
    }
}

/// ISO 8601 duration as used by JSCalendar: `PnW` or `PnDTnHnMnS`.
fn parse_duration(s: &str) -> Option<TimeDelta> {
    let rest = s.strip_prefix('P')?;
    let (date_part, time_part) = rest.split_once('T').unwrap_or((rest, ""));
    let mut total = TimeDelta::zero();

    for (part, units) in [
        (date_part, &[('W', 604_800), ('D', 86_400)][..]),
        (time_part, &[('H', 3_600), ('M', 60), ('S', 1)][..]),
    ] {
        let mut digits = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let (_, secs) = units.iter().find(|(unit, _)| *unit == c)?;
            let n: i64 = digits.parse().ok()?;
            digits.clear();
            total = total.checked_add(&TimeDelta::try_seconds(n.checked_mul(*secs)?)?)?;
        }
        if !digits.is_empty() {
            return None;
        }
    }
    Some(total)
}
