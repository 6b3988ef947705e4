use super::{McpTool, ToolResult};
use crate::state::AppState;
use futures::future::BoxFuture;
use serde_json::{json, Value};

const NOT_INITIALIZED: &str = "Monitoring is not enabled or not initialized";

fn no_arguments() -> Value {
    json!({"type": "object", "properties": {}})
}

pub struct RunMonitoringTool;

impl McpTool for RunMonitoringTool {
    fn name(&self) -> &str {
        "mattermost_run_monitoring"
    }

    fn description(&self) -> &str {
        "Run the topic monitor immediately across all configured channels"
    }

    fn schema(&self) -> Value {
        no_arguments()
    }

    fn call<'a>(&'a self, _args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let Some(monitor) = &app.monitor else {
                return Ok(json!({"success": false, "message": NOT_INITIALIZED}));
            };
            if !monitor.is_enabled() {
                return Ok(json!({"success": false, "message": NOT_INITIALIZED}));
            }
            if !monitor.run_now().await {
                return Ok(json!({
                    "success": false,
                    "message": "A monitoring run is already in progress"
                }));
            }
            Ok(json!({
                "success": true,
                "message": "Monitoring run completed successfully"
            }))
        })
    }
}

pub struct GetMonitoringStatusTool;

impl McpTool for GetMonitoringStatusTool {
    fn name(&self) -> &str {
        "mattermost_get_monitoring_status"
    }

    fn description(&self) -> &str {
        "Report whether the topic monitor is enabled and whether a run is in progress"
    }

    fn schema(&self) -> Value {
        no_arguments()
    }

    fn call<'a>(&'a self, _args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let Some(monitor) = &app.monitor else {
                return Ok(json!({
                    "enabled": false,
                    "running": false,
                    "message": NOT_INITIALIZED
                }));
            };
            let enabled = monitor.is_enabled();
            let message = if enabled {
                "Monitoring system is active"
            } else {
                "Monitoring system is stopped"
            };
            Ok(json!({
                "enabled": enabled,
                "running": monitor.is_running(),
                "message": message
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_without_monitor() {
        let app = AppState::for_tests("http://127.0.0.1:9");
        let result = GetMonitoringStatusTool.call(json!({}), &app).await.unwrap();
        assert_eq!(result["enabled"], false);
        assert_eq!(result["running"], false);
        assert_eq!(result["message"], NOT_INITIALIZED);
    }

    #[tokio::test]
    async fn run_without_monitor_reports_failure() {
        let app = AppState::for_tests("http://127.0.0.1:9");
        let result = RunMonitoringTool.call(json!({}), &app).await.unwrap();
        assert_eq!(result["success"], false);
    }
}
