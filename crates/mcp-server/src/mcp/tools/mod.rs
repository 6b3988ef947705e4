use crate::state::AppState;
use futures::future::BoxFuture;
use serde_json::Value;

pub mod channels;
pub mod messages;
pub mod monitoring;
pub mod users;

pub type ToolResult = Result<Value, String>;

pub trait McpTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;
    fn call<'a>(&'a self, args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult>;
}

pub fn all_tools() -> Vec<Box<dyn McpTool>> {
    vec![
        Box::new(channels::ListChannelsTool),
        Box::new(channels::GetChannelHistoryTool),
        Box::new(messages::PostMessageTool),
        Box::new(messages::ReplyToThreadTool),
        Box::new(messages::AddReactionTool),
        Box::new(messages::GetThreadRepliesTool),
        Box::new(users::GetUsersTool),
        Box::new(users::GetUserProfileTool),
        Box::new(monitoring::RunMonitoringTool),
        Box::new(monitoring::GetMonitoringStatusTool),
    ]
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args[key]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing required argument: {key}"))
}

pub(crate) fn optional_u32(args: &Value, key: &str, default: u32) -> Result<u32, String> {
    match &args[key] {
        Value::Null => Ok(default),
        v => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| format!("argument {key} must be a non-negative integer")),
    }
}

pub(crate) fn page_schema(limit_default: u32, limit_description: &str) -> Value {
    serde_json::json!({
        "limit": {
            "type": "integer",
            "description": limit_description,
            "default": limit_default
        },
        "page": {
            "type": "integer",
            "description": "Page number for pagination (starting from 0)",
            "default": 0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_str_rejects_missing_and_empty() {
        let args = json!({"a": "x", "b": "", "c": 3});
        assert_eq!(required_str(&args, "a"), Ok("x"));
        assert!(required_str(&args, "b").is_err());
        assert!(required_str(&args, "c").is_err());
        assert_eq!(
            required_str(&args, "d").unwrap_err(),
            "missing required argument: d"
        );
    }

    #[test]
    fn optional_u32_defaults_and_validates() {
        let args = json!({"limit": 20, "page": -1, "bad": "x"});
        assert_eq!(optional_u32(&args, "limit", 100), Ok(20));
        assert_eq!(optional_u32(&args, "missing", 100), Ok(100));
        assert!(optional_u32(&args, "page", 0).is_err());
        assert!(optional_u32(&args, "bad", 0).is_err());
    }

    #[test]
    fn tool_names_are_unique() {
        let tools = all_tools();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }
}
