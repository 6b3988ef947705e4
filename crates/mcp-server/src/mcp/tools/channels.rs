use super::{optional_u32, page_schema, required_str, McpTool, ToolResult};
use crate::state::AppState;
use futures::future::BoxFuture;
use mattermost_mcp_core::models::{millis_to_rfc3339, Post};
use serde_json::{json, Value};

const MAX_CHANNELS_PER_PAGE: u32 = 200;

pub struct ListChannelsTool;

impl McpTool for ListChannelsTool {
    fn name(&self) -> &str {
        "mattermost_list_channels"
    }

    fn description(&self) -> &str {
        "List the public channels of the configured Mattermost team"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": page_schema(100, "Maximum number of channels to return (default 100, max 200)")
        })
    }

    fn call<'a>(&'a self, args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let limit = optional_u32(&args, "limit", 100)?.clamp(1, MAX_CHANNELS_PER_PAGE);
            let page = optional_u32(&args, "page", 0)?;

            let response = app
                .client
                .get_channels(limit, page)
                .await
                .map_err(|e| e.to_string())?;

            let channels: Vec<Value> = response
                .channels
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "name": c.name,
                        "display_name": c.display_name,
                        "type": c.channel_type,
                        "purpose": c.purpose,
                        "header": c.header,
                        "total_msg_count": c.total_msg_count,
                    })
                })
                .collect();

            Ok(json!({
                "channels": channels,
                "total_count": response.total_count,
                "page": page,
                "per_page": limit,
            }))
        })
    }
}

pub struct GetChannelHistoryTool;

impl McpTool for GetChannelHistoryTool {
    fn name(&self) -> &str {
        "mattermost_get_channel_history"
    }

    fn description(&self) -> &str {
        "Get recent messages from a Mattermost channel, newest first"
    }

    fn schema(&self) -> Value {
        let mut properties = page_schema(30, "Number of messages to retrieve (default 30)");
        properties["channel_id"] = json!({
            "type": "string",
            "description": "The ID of the channel"
        });
        json!({
            "type": "object",
            "properties": properties,
            "required": ["channel_id"]
        })
    }

    fn call<'a>(&'a self, args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let channel_id = required_str(&args, "channel_id")?;
            let limit = optional_u32(&args, "limit", 30)?;
            let page = optional_u32(&args, "page", 0)?;

            let response = app
                .client
                .get_posts_for_channel(channel_id, limit, page)
                .await
                .map_err(|e| e.to_string())?;

            let posts: Vec<Value> = response
                .ordered()
                .map(|p| {
                    let mut v = post_json(p);
                    v["reply_count"] = json!(p.reply_count);
                    v
                })
                .collect();

            Ok(json!({
                "posts": posts,
                "has_next": !response.next_post_id.is_empty(),
                "has_prev": !response.prev_post_id.is_empty(),
                "page": page,
                "per_page": limit,
            }))
        })
    }
}

/// The post fields every message-returning tool reports.
pub(crate) fn post_json(post: &Post) -> Value {
    json!({
        "id": post.id,
        "user_id": post.user_id,
        "message": post.message,
        "create_at": millis_to_rfc3339(post.create_at),
        "root_id": Some(post.root_id.as_str()).filter(|r| !r.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_json_nulls_empty_root() {
        let post = Post {
            id: "p1".into(),
            create_at: 1704067200000,
            message: "hi".into(),
            ..Default::default()
        };
        let v = post_json(&post);
        assert_eq!(v["root_id"], Value::Null);
        assert_eq!(v["create_at"], "2024-01-01T00:00:00+00:00");

        let reply = Post {
            root_id: "p0".into(),
            ..post
        };
        assert_eq!(post_json(&reply)["root_id"], "p0");
    }

    #[test]
    fn history_schema_requires_channel() {
        let schema = GetChannelHistoryTool.schema();
        assert_eq!(schema["required"], json!(["channel_id"]));
        assert_eq!(schema["properties"]["limit"]["default"], 30);
    }
}
