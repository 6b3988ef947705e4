use super::{optional_u32, page_schema, required_str, McpTool, ToolResult};
use crate::state::AppState;
use futures::future::BoxFuture;
use mattermost_mcp_core::models::{millis_to_rfc3339, UserProfile};
use serde_json::{json, Value};

pub struct GetUsersTool;

impl McpTool for GetUsersTool {
    fn name(&self) -> &str {
        "mattermost_get_users"
    }

    fn description(&self) -> &str {
        "Get a list of users in the Mattermost workspace"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": page_schema(100, "Maximum number of users to return (default 100)")
        })
    }

    fn call<'a>(&'a self, args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let limit = optional_u32(&args, "limit", 100)?;
            let page = optional_u32(&args, "page", 0)?;

            let response = app
                .client
                .get_users(limit, page)
                .await
                .map_err(|e| e.to_string())?;

            let users: Vec<Value> = response
                .users
                .iter()
                .map(|u| {
                    json!({
                        "id": u.id,
                        "username": u.username,
                        "email": u.email,
                        "first_name": u.first_name,
                        "last_name": u.last_name,
                        "nickname": u.nickname,
                        "position": u.position,
                        "roles": u.roles,
                        "is_bot": u.is_bot,
                    })
                })
                .collect();

            Ok(json!({
                "users": users,
                "total_count": response.total_count,
                "page": page,
                "per_page": limit,
            }))
        })
    }
}

pub struct GetUserProfileTool;

impl McpTool for GetUserProfileTool {
    fn name(&self) -> &str {
        "mattermost_get_user_profile"
    }

    fn description(&self) -> &str {
        "Get detailed profile information for a specific user"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "string",
                    "description": "The ID of the user"
                }
            },
            "required": ["user_id"]
        })
    }

    fn call<'a>(&'a self, args: Value, app: &'a AppState) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let user_id = required_str(&args, "user_id")?;
            let profile = app
                .client
                .get_user_profile(user_id)
                .await
                .map_err(|e| e.to_string())?;
            Ok(profile_json(&profile))
        })
    }
}

fn optional_time(ms: i64) -> Value {
    if ms == 0 {
        Value::Null
    } else {
        Value::String(millis_to_rfc3339(ms))
    }
}

fn profile_json(profile: &UserProfile) -> Value {
    let u = &profile.user;
    json!({
        "id": u.id,
        "username": u.username,
        "email": u.email,
        "first_name": u.first_name,
        "last_name": u.last_name,
        "nickname": u.nickname,
        "position": u.position,
        "roles": u.roles,
        "locale": u.locale,
        "timezone": u.timezone,
        "is_bot": u.is_bot,
        "bot_description": u.bot_description,
        "last_picture_update": profile.last_picture_update,
        "create_at": optional_time(u.create_at),
        "update_at": optional_time(u.update_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mattermost_mcp_core::models::User;

    #[test]
    fn profile_zero_timestamps_are_null() {
        let profile = UserProfile {
            user: User {
                id: "u1".into(),
                username: "alice".into(),
                create_at: 1704067200000,
                ..Default::default()
            },
            ..Default::default()
        };
        let v = profile_json(&profile);
        assert_eq!(v["username"], "alice");
        assert_eq!(v["create_at"], "2024-01-01T00:00:00+00:00");
        assert_eq!(v["update_at"], Value::Null);
    }
}
