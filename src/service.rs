//! The five exposed operations: normalize → resolve → compile → execute → map.

use crate::error::Result;
use crate::executor::Executor;
use crate::jmap::Transport;
use crate::mapper::{ContactRecord, DisplayZone, EventRecord, MessageRecord, RecordMapper};
use crate::models::{CAPABILITY_CALENDARS, CAPABILITY_CONTACTS, CAPABILITY_MAIL};
use crate::query::{
    ContactsQuery, EventsQuery, MessageLookup, MessageQuery, RawArgs, compile_contacts,
    compile_events, compile_messages,
};
use crate::resolver::Resolver;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    MessagesList,
    MessagesSearch,
    MessagesGet,
    ContactsList,
    EventsList,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::MessagesList => "messages-list",
            Self::MessagesSearch => "messages-search",
            Self::MessagesGet => "messages-get",
            Self::ContactsList => "contacts-list",
            Self::EventsList => "events-list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared across calls; holds no per-call state.
#[derive(Clone)]
pub struct MailService {
    transport: Arc<dyn Transport>,
    mapper: RecordMapper,
}

impl MailService {
    pub fn new(transport: Arc<dyn Transport>, zone: DisplayZone) -> Self {
        Self {
            transport,
            mapper: RecordMapper::new(zone),
        }
    }

    #[instrument(skip(self, raw))]
    pub async fn messages_list(&self, raw: &RawArgs) -> Result<Vec<MessageRecord>> {
        let query = MessageQuery::list(raw)?;
        self.run_message_query(query).await
    }

    #[instrument(skip(self, raw))]
    pub async fn messages_search(&self, raw: &RawArgs) -> Result<Vec<MessageRecord>> {
        let query = MessageQuery::search(raw)?;
        self.run_message_query(query).await
    }

    #[instrument(skip(self, raw))]
    pub async fn messages_get(&self, raw: &RawArgs) -> Result<MessageRecord> {
        let lookup = MessageLookup::from_raw(raw)?;
        let transport = self.transport.as_ref();
        let account_id = Resolver::new(transport)
            .resolve_account(&lookup.account, CAPABILITY_MAIL)
            .await?;

        let raw = Executor::new(transport)
            .get_message(&account_id, &lookup.message_id)
            .await?;
        let mut records = self.mapper.messages(vec![raw])?;
        Ok(records.remove(0))
    }

    #[instrument(skip(self, raw))]
    pub async fn contacts_list(&self, raw: &RawArgs) -> Result<Vec<ContactRecord>> {
        let query = ContactsQuery::from_raw(raw)?;
        let transport = self.transport.as_ref();
        let account_id = Resolver::new(transport)
            .resolve_account(&query.account, CAPABILITY_CONTACTS)
            .await?;

        let compiled = compile_contacts(&query.page, &account_id);
        let raw = Executor::new(transport).execute(compiled).await?;
        self.mapper.contacts(raw)
    }

    #[instrument(skip(self, raw))]
    pub async fn events_list(&self, raw: &RawArgs) -> Result<Vec<EventRecord>> {
        let query = EventsQuery::from_raw(raw)?;
        let transport = self.transport.as_ref();
        let mut resolver = Resolver::new(transport);
        let account_id = resolver
            .resolve_account(&query.account, CAPABILITY_CALENDARS)
            .await?;
        let calendar_id = match &query.calendar {
            Some(name) => Some(resolver.resolve_calendar(&account_id, name).await?),
            None => None,
        };

        let compiled = compile_events(&query.page, &account_id, calendar_id.as_deref());
        let raw = Executor::new(transport).execute(compiled).await?;
        self.mapper.events(raw)
    }

    async fn run_message_query(&self, query: MessageQuery) -> Result<Vec<MessageRecord>> {
        let transport = self.transport.as_ref();
        let mut resolver = Resolver::new(transport);
        let account_id = resolver
            .resolve_account(&query.account, CAPABILITY_MAIL)
            .await?;
        let mailbox_id = match &query.filter.mailbox {
            Some(name) => Some(resolver.resolve_mailbox(&account_id, name).await?),
            None => None,
        };

        let compiled = compile_messages(
            &query.filter,
            &query.sort,
            &query.page,
            &account_id,
            mailbox_id.as_deref(),
        );
        debug!(filter = ?compiled.filter, "Compiled message query");
        let raw = Executor::new(transport).execute(compiled).await?;
        self.mapper.messages(raw)
    }
}
