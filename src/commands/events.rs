use super::{raw_args, service};
use fastmail_mcp::Result;
use fastmail_mcp::models::Output;
use serde_json::json;

pub async fn list_events(
    calendar: Option<&str>,
    limit: Option<u32>,
    account: Option<&str>,
) -> Result<()> {
    let args = raw_args(json!({
        "account_id": account,
        "calendar_name": calendar,
        "limit": limit,
    }));
    let events = service()?.events_list(&args).await?;
    Output::success(events).print();
    Ok(())
}
