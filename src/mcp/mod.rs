//! MCP (Model Context Protocol) server for Fastmail
//!
//! Exposes the read-only mail, contact and calendar operations as MCP tools.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::Error;
use crate::jmap::{JmapClient, Transport};
use crate::mapper::DisplayZone;
use crate::query::RawArgs;
use crate::service::{MailService, Operation};

type ToolResult = std::result::Result<CallToolResult, McpError>;

mod format;
use format::*;

// ============ Request Types ============
//
// Numbers and booleans stay loosely typed here; `query::filter` validates them.

#[derive(Debug, Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct MessagesListRequest {
    /// Account ID (default: primary account)
    #[serde(default)]
    pub account_id: Option<String>,
    /// Mailbox name or role (default: INBOX)
    #[serde(default)]
    pub mailbox_name: Option<String>,
    /// Same as `mailbox_name`
    #[serde(default)]
    pub mailbox: Option<String>,
    /// Maximum number of messages to return (integer, default 25, max 256)
    #[serde(default)]
    pub limit: Option<Value>,
    /// Filter messages with attachments (boolean)
    #[serde(default)]
    pub has_attachment: Option<Value>,
}

#[derive(Debug, Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct MessagesSearchRequest {
    /// Account ID (default: primary account)
    #[serde(default)]
    pub account_id: Option<String>,
    /// Filter by sender email
    #[serde(default)]
    pub sender: Option<String>,
    /// Filter by subject text
    #[serde(default)]
    pub subject: Option<String>,
    /// Filter by mailbox name or role
    #[serde(default)]
    pub mailbox: Option<String>,
    /// Same as `mailbox`
    #[serde(default)]
    pub mailbox_name: Option<String>,
    /// Filter by read status (boolean)
    #[serde(default)]
    pub read: Option<Value>,
    /// Filter messages with attachments (boolean)
    #[serde(default)]
    pub has_attachment: Option<Value>,
    /// Start date, inclusive (YYYY-MM-DD)
    #[serde(default)]
    pub date_start: Option<String>,
    /// End date, inclusive (YYYY-MM-DD)
    #[serde(default)]
    pub date_end: Option<String>,
    /// Maximum number of messages to return (integer, default 25, max 256)
    #[serde(default)]
    pub limit: Option<Value>,
    /// Number of messages to skip (integer)
    #[serde(default)]
    pub offset: Option<Value>,
    /// Sort field: receivedAt, sentAt or subject (default receivedAt)
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Sort in ascending order (boolean, default false)
    #[serde(default)]
    pub sort_ascending: Option<Value>,
}

#[derive(Debug, Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct MessagesGetRequest {
    /// Account ID (default: primary account)
    #[serde(default)]
    pub account_id: Option<String>,
    /// Message ID (from messages-list or messages-search)
    pub message_id: String,
}

#[derive(Debug, Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct ContactsListRequest {
    /// Account ID (default: primary account)
    #[serde(default)]
    pub account_id: Option<String>,
    /// Maximum number of contacts to return (integer, default 25, max 256)
    #[serde(default)]
    pub limit: Option<Value>,
}

#[derive(Debug, Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct EventsListRequest {
    /// Account ID (default: primary account)
    #[serde(default)]
    pub account_id: Option<String>,
    /// Calendar name (default: all calendars)
    #[serde(default)]
    pub calendar_name: Option<String>,
    /// Maximum number of events to return (integer, default 25, max 256)
    #[serde(default)]
    pub limit: Option<Value>,
}

/// Back to the raw argument map the normalizer expects.
fn to_raw<T: Serialize>(req: &T) -> RawArgs {
    match serde_json::to_value(req) {
        Ok(Value::Object(map)) => map,
        _ => RawArgs::new(),
    }
}

// ============ Server Implementation ============

#[derive(Clone)]
pub struct FastmailMcp {
    service: MailService,
    tool_router: ToolRouter<Self>,
}

impl FastmailMcp {
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::load()?;
        let client = JmapClient::from_config(&config)?;
        // Fail at startup rather than on the first tool call.
        client.session().await?;

        let zone = DisplayZone::from(config.display_zone()?);
        Ok(Self::with_service(MailService::new(Arc::new(client), zone)))
    }

    pub fn with_service(service: MailService) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    fn text_result(text: impl Into<String>) -> ToolResult {
        Ok(CallToolResult::success(vec![Content::text(text.into())]))
    }

    fn error_result(op: Operation, err: &Error) -> ToolResult {
        Ok(CallToolResult::error(vec![Content::text(format!(
            "{} failed [{}]: {}",
            op,
            err.code(),
            err
        ))]))
    }

    fn list_result<T>(items: &[T], empty: &str, fmt: impl Fn(&T) -> String) -> ToolResult {
        if items.is_empty() {
            return Self::text_result(empty);
        }
        let text = items
            .iter()
            .map(fmt)
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        Self::text_result(text)
    }
}

#[tool_router]
impl FastmailMcp {
    #[tool(
        name = "messages-list",
        description = "List email messages in a mailbox (default INBOX), newest first. Returns summaries with ID, sender, subject, date and preview."
    )]
    async fn messages_list(&self, Parameters(req): Parameters<MessagesListRequest>) -> ToolResult {
        match self.service.messages_list(&to_raw(&req)).await {
            Ok(messages) => Self::list_result(&messages, "No messages found.", format_message_summary),
            Err(e) => Self::error_result(Operation::MessagesList, &e),
        }
    }

    #[tool(
        name = "messages-search",
        description = "Search email messages with advanced filtering including date ranges. All filters are combined with AND. Dates are YYYY-MM-DD and inclusive."
    )]
    async fn messages_search(
        &self,
        Parameters(req): Parameters<MessagesSearchRequest>,
    ) -> ToolResult {
        match self.service.messages_search(&to_raw(&req)).await {
            Ok(messages) => Self::list_result(&messages, "No messages found.", format_message_summary),
            Err(e) => Self::error_result(Operation::MessagesSearch, &e),
        }
    }

    #[tool(
        name = "messages-get",
        description = "Get full details of a specific message, including its text body."
    )]
    async fn messages_get(&self, Parameters(req): Parameters<MessagesGetRequest>) -> ToolResult {
        match self.service.messages_get(&to_raw(&req)).await {
            Ok(message) => Self::text_result(format_message_full(&message)),
            Err(e) => Self::error_result(Operation::MessagesGet, &e),
        }
    }

    #[tool(name = "contacts-list", description = "List contacts from the address book.")]
    async fn contacts_list(&self, Parameters(req): Parameters<ContactsListRequest>) -> ToolResult {
        match self.service.contacts_list(&to_raw(&req)).await {
            Ok(contacts) => Self::list_result(&contacts, "No contacts found.", format_contact),
            Err(e) => Self::error_result(Operation::ContactsList, &e),
        }
    }

    #[tool(
        name = "events-list",
        description = "List calendar events, soonest first. Optionally restrict to one calendar by name."
    )]
    async fn events_list(&self, Parameters(req): Parameters<EventsListRequest>) -> ToolResult {
        match self.service.events_list(&to_raw(&req)).await {
            Ok(events) => Self::list_result(&events, "No events found.", format_event),
            Err(e) => Self::error_result(Operation::EventsList, &e),
        }
    }
}

#[tool_handler]
impl ServerHandler for FastmailMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "fastmail-mcp".to_string(),
                title: Some("Fastmail MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: Some("https://github.com/radiosilence/fastmail-mcp".to_string()),
            },
            instructions: Some(
                "Fastmail MCP Server - read-only access to mail, contacts and calendars.\n\n\
                ## Messages\n\
                1. Use `messages-list` to see the newest messages in a mailbox\n\
                2. Use `messages-search` to filter by sender, subject, mailbox, read state, \
                attachments and date range\n\
                3. Use `messages-get` with a message ID to read the full message\n\n\
                ## Contacts and calendars\n\
                - `contacts-list` lists address book entries\n\
                - `events-list` lists upcoming events, optionally for one calendar\n\n\
                All times are shown in the server's display timezone."
                    .to_string(),
            ),
        }
    }
}

/// Run the MCP server with stdio transport
pub async fn run_server() -> anyhow::Result<()> {
    use rmcp::{ServiceExt, transport::stdio};

    let service = FastmailMcp::new().await?;
    let server = service
        .serve(stdio())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {}", e))?;

    server
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {}", e))?;

    Ok(())
}
