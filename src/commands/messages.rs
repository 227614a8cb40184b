use super::{raw_args, service};
use fastmail_mcp::Result;
use fastmail_mcp::models::Output;
use serde_json::json;

pub async fn list_messages(
    mailbox: Option<&str>,
    limit: Option<u32>,
    has_attachment: Option<bool>,
    account: Option<&str>,
) -> Result<()> {
    let args = raw_args(json!({
        "account_id": account,
        "mailbox_name": mailbox,
        "limit": limit,
        "has_attachment": has_attachment,
    }));
    let messages = service()?.messages_list(&args).await?;
    Output::success(messages).print();
    Ok(())
}

/// Filters for `messages search`, as given on the command line.
#[derive(Debug, Default)]
pub struct SearchArgs {
    pub account: Option<String>,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub mailbox: Option<String>,
    pub read: Option<bool>,
    pub has_attachment: Option<bool>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort_by: Option<String>,
    pub ascending: bool,
}

pub async fn search_messages(search: SearchArgs) -> Result<()> {
    let args = raw_args(json!({
        "account_id": search.account,
        "sender": search.sender,
        "subject": search.subject,
        "mailbox": search.mailbox,
        "read": search.read,
        "has_attachment": search.has_attachment,
        "date_start": search.date_start,
        "date_end": search.date_end,
        "limit": search.limit,
        "offset": search.offset,
        "sort_by": search.sort_by,
        "sort_ascending": search.ascending,
    }));
    let messages = service()?.messages_search(&args).await?;
    Output::success(messages).print();
    Ok(())
}

pub async fn get_message(message_id: &str, account: Option<&str>) -> Result<()> {
    let args = raw_args(json!({
        "account_id": account,
        "message_id": message_id,
    }));
    let message = service()?.messages_get(&args).await?;
    Output::success(message).print();
    Ok(())
}
