use anyhow::Context;
use mattermost_client::MattermostClient;
use mattermost_mcp_core::config::{LlmConfig, MonitoringConfig, Settings};
use mattermost_mcp_server::monitor::TopicMonitor;
use mattermost_mcp_server::AppState;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run the HTTP server until SIGINT/SIGTERM.
///
/// A failed Mattermost login or monitor start is logged and the server comes
/// up anyway; `/ready` reports the connection state.
pub fn run(port: Option<u16>) -> anyhow::Result<()> {
    let settings = Settings::from_env().context("loading configuration")?;
    let monitoring = MonitoringConfig::from_env().context("loading monitoring configuration")?;
    let llm = LlmConfig::from_env().context("loading LLM configuration")?;
    let port = port.unwrap_or(settings.http_port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            mattermost_url = %settings.mattermost_base_url(),
            port,
            "Starting Mattermost MCP server"
        );

        let client = Arc::new(MattermostClient::from_settings(&settings)?);
        if let Err(e) = client.login().await {
            warn!(error = %e, "Failed to connect to Mattermost, continuing");
        }

        let monitor = if monitoring.enabled {
            start_monitor(client.clone(), &monitoring, &llm).await
        } else {
            info!("Topic monitoring disabled");
            None
        };

        let state = AppState::new(client.clone(), monitor.clone());
        let served = mattermost_mcp_server::serve(state, port).await;

        if let Some(monitor) = monitor {
            monitor.stop();
        }
        if let Err(e) = client.logout().await {
            warn!(error = %e, "logout failed");
        }
        info!("Mattermost MCP server stopped");
        served
    })
}

async fn start_monitor(
    client: Arc<MattermostClient>,
    config: &MonitoringConfig,
    llm: &LlmConfig,
) -> Option<Arc<TopicMonitor>> {
    let monitor = match TopicMonitor::new(client, config, llm) {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "Invalid monitoring configuration, monitoring disabled");
            return None;
        }
    };
    match monitor.start().await {
        Ok(()) => {
            info!(state_path = %monitor.state_path().display(), "Topic monitoring started");
            Some(Arc::new(monitor))
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Error starting topic monitor, continuing without it");
            None
        }
    }
}
