//! Turns loosely-typed tool arguments into typed query descriptors.
//!
//! Everything downstream of this module works on the typed values only.

use crate::error::ValidationError;
use chrono::NaiveDate;
use serde_json::{Map, Value};

type Result<T> = std::result::Result<T, ValidationError>;

/// Raw arguments as received at the tool-calling boundary.
pub type RawArgs = Map<String, Value>;

pub const DEFAULT_LIMIT: u32 = 25;
pub const MAX_LIMIT: u32 = 256;
pub const DEFAULT_MAILBOX: &str = "inbox";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AccountRef {
    #[default]
    Primary,
    Explicit(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterDescriptor {
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub mailbox: Option<String>,
    pub read: Option<bool>,
    pub has_attachment: Option<bool>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    ReceivedAt,
    SentAt,
    Subject,
}

impl SortField {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "receivedAt" => Ok(Self::ReceivedAt),
            "sentAt" => Ok(Self::SentAt),
            "subject" => Ok(Self::Subject),
            other => Err(ValidationError::InvalidSortField(other.to_string())),
        }
    }

    /// JMAP `Email/query` sort property.
    pub fn property(self) -> &'static str {
        match self {
            Self::ReceivedAt => "receivedAt",
            Self::SentAt => "sentAt",
            Self::Subject => "subject",
        }
    }
}

/// Newest first unless asked otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub limit: u32,
    pub offset: u32,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Arguments of `messages-list` and `messages-search`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageQuery {
    pub account: AccountRef,
    pub filter: FilterDescriptor,
    pub sort: SortSpec,
    pub page: PageSpec,
}

impl MessageQuery {
    /// `messages-list`: one mailbox (the inbox unless named), newest first.
    pub fn list(raw: &RawArgs) -> Result<Self> {
        let args = Args(raw);
        let filter = FilterDescriptor {
            mailbox: Some(
                args.mailbox()?
                    .unwrap_or_else(|| DEFAULT_MAILBOX.to_string()),
            ),
            has_attachment: args.bool("has_attachment")?,
            ..Default::default()
        };
        Ok(Self {
            account: args.account()?,
            filter,
            sort: SortSpec::default(),
            page: args.page(false)?,
        })
    }

    /// `messages-search`: every filter, sorting and offset paging.
    pub fn search(raw: &RawArgs) -> Result<Self> {
        let args = Args(raw);
        let date_start = args.date("date_start")?;
        let date_end = args.date("date_end")?;
        if let (Some(start), Some(end)) = (date_start, date_end)
            && start > end
        {
            return Err(ValidationError::InvalidRange { start, end });
        }

        let filter = FilterDescriptor {
            sender: args.string("sender")?,
            subject: args.string("subject")?,
            mailbox: args.mailbox()?,
            read: args.bool("read")?,
            has_attachment: args.bool("has_attachment")?,
            date_start,
            date_end,
        };

        let field = match args.get("sort_by") {
            None => SortField::default(),
            Some(Value::String(s)) => SortField::parse(s.trim())?,
            Some(other) => return Err(ValidationError::InvalidSortField(other.to_string())),
        };
        let sort = SortSpec {
            field,
            ascending: args.bool("sort_ascending")?.unwrap_or(false),
        };

        Ok(Self {
            account: args.account()?,
            filter,
            sort,
            page: args.page(true)?,
        })
    }
}

/// Arguments of `messages-get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLookup {
    pub account: AccountRef,
    pub message_id: String,
}

impl MessageLookup {
    pub fn from_raw(raw: &RawArgs) -> Result<Self> {
        let args = Args(raw);
        let message_id = args
            .string("message_id")?
            .ok_or_else(|| ValidationError::invalid_argument("message_id", "is required"))?;
        Ok(Self {
            account: args.account()?,
            message_id,
        })
    }
}

/// Arguments of `contacts-list`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactsQuery {
    pub account: AccountRef,
    pub page: PageSpec,
}

impl ContactsQuery {
    pub fn from_raw(raw: &RawArgs) -> Result<Self> {
        let args = Args(raw);
        Ok(Self {
            account: args.account()?,
            page: args.page(false)?,
        })
    }
}

/// Arguments of `events-list`. No calendar name means every calendar.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventsQuery {
    pub account: AccountRef,
    pub calendar: Option<String>,
    pub page: PageSpec,
}

impl EventsQuery {
    pub fn from_raw(raw: &RawArgs) -> Result<Self> {
        let args = Args(raw);
        Ok(Self {
            account: args.account()?,
            calendar: args.string("calendar_name")?,
            page: args.page(false)?,
        })
    }
}

/// Typed accessors over the raw argument map. `null` counts as absent.
struct Args<'a>(&'a RawArgs);

impl Args<'_> {
    fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    fn string(&self, field: &str) -> Result<Option<String>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => {
                let s = s.trim();
                Ok((!s.is_empty()).then(|| s.to_string()))
            }
            Some(_) => Err(ValidationError::invalid_argument(field, "expected a string")),
        }
    }

    fn bool(&self, field: &str) -> Result<Option<bool>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(ValidationError::invalid_argument(field, "expected a boolean")),
            },
            Some(_) => Err(ValidationError::invalid_argument(field, "expected a boolean")),
        }
    }

    fn integer(&self, field: &str) -> Result<Option<i64>> {
        let invalid = || ValidationError::invalid_argument(field, "expected an integer");
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Some(i));
                }
                // Integral floats like 10.0 are integers; 2.5 and huge values are not.
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                    _ => Err(invalid()),
                }
            }
            Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
            Some(_) => Err(invalid()),
        }
    }

    fn date(&self, field: &str) -> Result<Option<NaiveDate>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Some)
                .map_err(|_| ValidationError::InvalidDate {
                    field: field.to_string(),
                    value: s.clone(),
                }),
            Some(other) => Err(ValidationError::InvalidDate {
                field: field.to_string(),
                value: other.to_string(),
            }),
        }
    }

    fn account(&self) -> Result<AccountRef> {
        Ok(self
            .string("account_id")?
            .map(AccountRef::Explicit)
            .unwrap_or_default())
    }

    /// `mailbox` and `mailbox_name` name the same thing.
    fn mailbox(&self) -> Result<Option<String>> {
        match (self.string("mailbox")?, self.string("mailbox_name")?) {
            (Some(a), Some(b)) if !a.eq_ignore_ascii_case(&b) => Err(ValidationError::invalid_argument(
                "mailbox",
                format!("conflicts with mailbox_name ({:?} vs {:?})", a, b),
            )),
            (a, b) => Ok(a.or(b)),
        }
    }

    fn page(&self, with_offset: bool) -> Result<PageSpec> {
        let limit = match self.integer("limit")? {
            None => DEFAULT_LIMIT,
            Some(n) if n < 1 => {
                return Err(ValidationError::invalid_argument("limit", "must be at least 1"));
            }
            Some(n) => n.min(MAX_LIMIT as i64) as u32,
        };
        let offset = if with_offset {
            match self.integer("offset")? {
                None => 0,
                Some(n) if n < 0 => {
                    return Err(ValidationError::invalid_argument("offset", "must not be negative"));
                }
                Some(n) => u32::try_from(n)
                    .map_err(|_| ValidationError::invalid_argument("offset", "is too large"))?,
            }
        } else {
            0
        };
        Ok(PageSpec { limit, offset })
    }
}
