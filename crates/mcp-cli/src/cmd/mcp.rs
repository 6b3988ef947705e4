use anyhow::Context;
use mattermost_client::MattermostClient;
use mattermost_mcp_core::config::Settings;
use mattermost_mcp_server::mcp::protocol::handle_message;
use mattermost_mcp_server::AppState;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Serve MCP over stdio: one JSON-RPC message per line in, one response per
/// line out. Notifications get no response. Logs go to stderr.
pub fn run() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("loading configuration")?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let client = MattermostClient::from_settings(&settings)?;
        let state = AppState::new(Arc::new(client), None);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        tracing::info!("MCP stdio server ready");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let Some(resp) = handle_message(line.as_bytes(), &state).await else {
                continue;
            };
            let mut out = serde_json::to_vec(&resp)?;
            out.push(b'\n');
            stdout.write_all(&out).await?;
            stdout.flush().await?;
        }
        Ok::<(), anyhow::Error>(())
    })
}
