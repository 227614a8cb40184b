use super::{raw_args, service};
use fastmail_mcp::Result;
use fastmail_mcp::models::Output;
use serde_json::json;

pub async fn list_contacts(limit: Option<u32>, account: Option<&str>) -> Result<()> {
    let args = raw_args(json!({ "account_id": account, "limit": limit }));
    let contacts = service()?.contacts_list(&args).await?;
    Output::success(contacts).print();
    Ok(())
}
