mod auth;
mod contacts;
mod events;
mod messages;

pub use auth::*;
pub use contacts::*;
pub use events::*;
pub use messages::*;

use fastmail_mcp::Result;
use fastmail_mcp::config::Config;
use fastmail_mcp::jmap::JmapClient;
use fastmail_mcp::mapper::DisplayZone;
use fastmail_mcp::query::RawArgs;
use fastmail_mcp::service::MailService;
use serde_json::Value;
use std::sync::Arc;

fn service() -> Result<MailService> {
    let config = Config::load()?;
    let client = JmapClient::from_config(&config)?;
    let zone = DisplayZone::from(config.display_zone()?);
    Ok(MailService::new(Arc::new(client), zone))
}

/// CLI flags go through the same argument normalization as MCP calls.
fn raw_args(value: Value) -> RawArgs {
    match value {
        Value::Object(map) => map,
        _ => RawArgs::new(),
    }
}
