use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CAPABILITY_CORE: &str = "urn:ietf:params:jmap:core";
pub const CAPABILITY_MAIL: &str = "urn:ietf:params:jmap:mail";
pub const CAPABILITY_CONTACTS: &str = "urn:ietf:params:jmap:contacts";
pub const CAPABILITY_CALENDARS: &str = "urn:ietf:params:jmap:calendars";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub capabilities: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub accounts: HashMap<String, Account>,
    #[serde(default)]
    pub primary_accounts: HashMap<String, String>,
    pub username: String,
    pub api_url: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl Session {
    /// Primary account for `capability`, falling back to the mail account.
    pub fn primary_account_id(&self, capability: &str) -> Option<&str> {
        self.primary_accounts
            .get(capability)
            .or_else(|| self.primary_accounts.get(CAPABILITY_MAIL))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    #[serde(default)]
    pub is_personal: bool,
    #[serde(default)]
    pub is_read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) if !name.is_empty() => write!(f, "{} <{}>", name, self.email),
            _ => write!(f, "{}", self.email),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailBodyPart {
    pub part_id: Option<String>,
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailBodyValue {
    pub value: String,
    #[serde(default)]
    pub is_truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub mailbox_ids: HashMap<String, bool>,
    #[serde(default)]
    pub keywords: HashMap<String, bool>,
    #[serde(default)]
    pub received_at: Option<String>,
    #[serde(default)]
    pub sent_at: Option<String>,
    #[serde(default)]
    pub from: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub to: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub cc: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub has_attachment: Option<bool>,
    #[serde(default)]
    pub text_body: Option<Vec<EmailBodyPart>>,
    #[serde(default)]
    pub body_values: Option<HashMap<String, EmailBodyValue>>,
}

impl Email {
    fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.get(keyword).copied().unwrap_or(false)
    }

    pub fn is_read(&self) -> bool {
        self.has_keyword("$seen")
    }

    pub fn is_flagged(&self) -> bool {
        self.has_keyword("$flagged")
    }

    pub fn is_draft(&self) -> bool {
        self.has_keyword("$draft")
    }

    pub fn text_content(&self) -> Option<&str> {
        let body_values = self.body_values.as_ref()?;
        let text_body = self.text_body.as_ref()?;
        let part = text_body.first()?;
        let part_id = part.part_id.as_ref()?;
        body_values.get(part_id).map(|v| v.value.as_str())
    }
}

/// JSContact card as returned by `ContactCard/get`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactCard {
    pub id: String,
    #[serde(default)]
    pub name: Option<ContactName>,
    #[serde(default)]
    pub emails: HashMap<String, ContactEmail>,
    #[serde(default)]
    pub phones: HashMap<String, ContactPhone>,
    #[serde(default)]
    pub organizations: HashMap<String, ContactOrganization>,
    #[serde(default)]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContactName {
    #[serde(default)]
    pub full: Option<String>,
    #[serde(default)]
    pub components: Vec<NameComponent>,
}

impl ContactName {
    /// `full` when present, else the components joined in order.
    pub fn display(&self) -> Option<String> {
        if let Some(full) = self.full.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(full.trim().to_string());
        }
        let joined = self
            .components
            .iter()
            .filter(|c| c.kind != "separator")
            .map(|c| c.value.trim())
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NameComponent {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContactEmail {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContactPhone {
    pub number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContactOrganization {
    #[serde(default)]
    pub name: Option<String>,
}

/// JSCalendar event as returned by `CalendarEvent/get`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub calendar_ids: HashMap<String, bool>,
    #[serde(default)]
    pub title: Option<String>,
    /// Local date-time without offset, interpreted in `time_zone`.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub utc_start: Option<String>,
    #[serde(default)]
    pub utc_end: Option<String>,
    #[serde(default)]
    pub show_without_time: Option<bool>,
    #[serde(default)]
    pub locations: Option<HashMap<String, EventLocation>>,
    #[serde(default)]
    pub participants: Option<HashMap<String, EventParticipant>>,
    #[serde(default)]
    pub recurrence_rules: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventLocation {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventParticipant {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: HashMap<String, bool>,
}

#[derive(Debug, Serialize)]
pub struct Output<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Output<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            message: None,
        }
    }

    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            code: None,
            message: Some(message.into()),
        }
    }

    pub fn error(err: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.into()),
            code: code.map(str::to_string),
            message: None,
        }
    }

    pub fn print(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize output: {}", e),
        }
    }
}
