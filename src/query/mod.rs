//! Argument normalization and query compilation. No I/O happens here.

pub mod compile;
pub mod filter;

pub use compile::{
    Container, RecordKind, ResolvedQuery, compile_contacts, compile_events, compile_messages,
};
pub use filter::{
    AccountRef, ContactsQuery, EventsQuery, FilterDescriptor, MessageLookup, MessageQuery,
    PageSpec, RawArgs, SortField, SortSpec,
};
