use super::channels::post_json;
use super::{required_str, McpTool, ToolResult};
use crate::state::AppState;
use futures::future::BoxFuture;
use mattermost_mcp_core::models::millis_to_rfc3339;
use serde_json::{json, Value};

fn string_props(fields: &[(&str, &str)]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(name, description)| {
            (
                name.to_string(),
                json!({"type": "string", "description": description}),
            )
        })
        .collect();
    let required: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub struct PostMessageTool;

impl McpTool for PostMessageTool {
    fn name(&self) -> &str {
        "mattermost_post_message"
    }

    fn description(&self) -> &str {
        "Post a new message to a Mattermost channel"
    }

    fn schema(&self) -> Value {
        string_props(&[
            ("channel_id", "The ID of the channel to post to"),
            ("message", "The message text to post"),
        ])
    }

    fn call<'a>(&'a self, args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let channel_id = required_str(&args, "channel_id")?;
            let message = required_str(&args, "message")?;

            let post = app
                .client
                .create_post(channel_id, message, "")
                .await
                .map_err(|e| e.to_string())?;

            Ok(json!({
                "id": post.id,
                "channel_id": post.channel_id,
                "message": post.message,
                "create_at": millis_to_rfc3339(post.create_at),
            }))
        })
    }
}

pub struct ReplyToThreadTool;

impl McpTool for ReplyToThreadTool {
    fn name(&self) -> &str {
        "mattermost_reply_to_thread"
    }

    fn description(&self) -> &str {
        "Reply to a specific message thread in Mattermost"
    }

    fn schema(&self) -> Value {
        string_props(&[
            ("channel_id", "The ID of the channel containing the thread"),
            ("post_id", "The ID of the parent message to reply to"),
            ("message", "The reply text"),
        ])
    }

    fn call<'a>(&'a self, args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let channel_id = required_str(&args, "channel_id")?;
            let post_id = required_str(&args, "post_id")?;
            let message = required_str(&args, "message")?;

            let post = app
                .client
                .create_post(channel_id, message, post_id)
                .await
                .map_err(|e| e.to_string())?;

            Ok(json!({
                "id": post.id,
                "channel_id": post.channel_id,
                "root_id": post.root_id,
                "message": post.message,
                "create_at": millis_to_rfc3339(post.create_at),
            }))
        })
    }
}

pub struct AddReactionTool;

impl McpTool for AddReactionTool {
    fn name(&self) -> &str {
        "mattermost_add_reaction"
    }

    fn description(&self) -> &str {
        "Add an emoji reaction to a message"
    }

    fn schema(&self) -> Value {
        string_props(&[
            ("channel_id", "The ID of the channel containing the message"),
            ("post_id", "The ID of the message to react to"),
            ("emoji_name", "The name of the emoji reaction (without colons)"),
        ])
    }

    fn call<'a>(&'a self, args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            required_str(&args, "channel_id")?;
            let post_id = required_str(&args, "post_id")?;
            let emoji_name = required_str(&args, "emoji_name")?.trim_matches(':');

            let reaction = app
                .client
                .add_reaction(post_id, emoji_name)
                .await
                .map_err(|e| e.to_string())?;

            Ok(json!({
                "post_id": reaction.post_id,
                "user_id": reaction.user_id,
                "emoji_name": reaction.emoji_name,
                "create_at": millis_to_rfc3339(reaction.create_at),
            }))
        })
    }
}

pub struct GetThreadRepliesTool;

impl McpTool for GetThreadRepliesTool {
    fn name(&self) -> &str {
        "mattermost_get_thread_replies"
    }

    fn description(&self) -> &str {
        "Get all posts in a message thread, including the root post"
    }

    fn schema(&self) -> Value {
        string_props(&[
            ("channel_id", "The ID of the channel containing the thread"),
            ("post_id", "The ID of the parent message"),
        ])
    }

    fn call<'a>(&'a self, args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            required_str(&args, "channel_id")?;
            let post_id = required_str(&args, "post_id")?;

            let thread = app
                .client
                .get_post_thread(post_id)
                .await
                .map_err(|e| e.to_string())?;

            let posts: Vec<Value> = thread.ordered().map(post_json).collect();
            let root_post = thread.posts.get(post_id).map(|rp| {
                json!({
                    "id": rp.id,
                    "user_id": rp.user_id,
                    "message": rp.message,
                    "create_at": millis_to_rfc3339(rp.create_at),
                })
            });

            Ok(json!({
                "posts": posts,
                "root_post": root_post,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemas_require_every_field() {
        let schema = ReplyToThreadTool.schema();
        assert_eq!(schema["required"], json!(["channel_id", "post_id", "message"]));
        assert_eq!(schema["properties"]["post_id"]["type"], "string");
    }
}
