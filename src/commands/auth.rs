use fastmail_mcp::Result;
use fastmail_mcp::config::{Config, Credentials};
use fastmail_mcp::jmap::{JmapClient, Transport};
use fastmail_mcp::models::Output;

pub async fn auth(token: &str) -> Result<()> {
    let mut config = Config::saved()?;
    let client = JmapClient::new(config.base_url(), Credentials::Token(token.to_string()))?;
    let session = client.session().await?;

    config.set_token(token.to_string());
    config.save()?;

    Output::<()>::success_msg(format!("Authenticated as {}", session.username)).print();

    Ok(())
}
