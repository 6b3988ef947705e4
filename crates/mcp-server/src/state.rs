use crate::mcp::tools::{self, McpTool};
use crate::monitor::TopicMonitor;
use mattermost_client::MattermostClient;
use std::sync::Arc;

/// Shared application state passed to all route handlers and MCP tools.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<MattermostClient>,
    /// Present only when monitoring is enabled and started.
    pub monitor: Option<Arc<TopicMonitor>>,
    pub tools: Arc<Vec<Box<dyn McpTool>>>,
}

impl AppState {
    pub fn new(client: Arc<MattermostClient>, monitor: Option<Arc<TopicMonitor>>) -> Self {
        Self {
            client,
            monitor,
            tools: Arc::new(tools::all_tools()),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(url: &str) -> Self {
        let client = MattermostClient::new(url, "test-token", "team1")
            .unwrap_or_else(|e| panic!("test client: {e}"));
        Self::new(Arc::new(client), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_registers_tools() {
        let state = AppState::for_tests("http://localhost:8065");
        assert_eq!(state.tools.len(), 10);
        assert!(state.monitor.is_none());
    }
}
