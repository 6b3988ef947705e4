//! Mattermost REST v4 payloads.
//!
//! Every field carries a serde default so partial payloads (and the trimmed
//! objects some endpoints return) still deserialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type JsonMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub id: String,
    pub team_id: String,
    pub display_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub header: String,
    pub purpose: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    pub total_msg_count: i64,
    pub creator_id: String,
}

impl Channel {
    pub fn is_open(&self) -> bool {
        self.channel_type == "O"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    pub edit_at: i64,
    pub user_id: String,
    pub channel_id: String,
    pub root_id: String,
    pub original_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub props: JsonMap,
    pub hashtags: String,
    pub pending_post_id: String,
    pub reply_count: i64,
    pub metadata: JsonMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub position: String,
    /// Space-separated role names, e.g. `"system_admin system_user"`.
    pub roles: String,
    pub locale: String,
    pub timezone: JsonMap,
    pub is_bot: bool,
    pub bot_description: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.split_whitespace().any(|r| r == role)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub last_picture_update: i64,
    pub auth_service: String,
    pub email_verified: bool,
    pub notify_props: JsonMap,
    pub props: JsonMap,
    pub terms_of_service_id: String,
    pub terms_of_service_create_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reaction {
    pub user_id: String,
    pub post_id: String,
    pub emoji_name: String,
    pub create_at: i64,
}

/// A page of posts. `order` lists post ids newest first; `posts` is keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostsResponse {
    pub posts: BTreeMap<String, Post>,
    pub order: Vec<String>,
    pub next_post_id: String,
    pub prev_post_id: String,
}

impl PostsResponse {
    /// Posts in `order`, skipping ids that have no body in `posts`.
    pub fn ordered(&self) -> impl Iterator<Item = &Post> {
        self.order.iter().filter_map(|id| self.posts.get(id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelsResponse {
    pub channels: Vec<Channel>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
    pub total_count: usize,
}

/// Format a Mattermost millisecond timestamp as RFC 3339 in UTC.
pub fn millis_to_rfc3339(ms: i64) -> String {
    millis_to_datetime(ms).to_rfc3339()
}

pub fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> serde_json::Value {
        serde_json::json!({
            "id": "post123",
            "create_at": 1704067200000i64,
            "update_at": 1704067200000i64,
            "delete_at": 0,
            "edit_at": 0,
            "user_id": "user123",
            "channel_id": "channel123",
            "root_id": "",
            "original_id": "",
            "message": "Test message",
            "type": "",
            "props": {},
            "hashtags": "",
            "pending_post_id": "",
            "reply_count": 0,
            "metadata": {}
        })
    }

    #[test]
    fn channel_from_payload() {
        let channel: Channel = serde_json::from_value(serde_json::json!({
            "id": "channel123",
            "team_id": "team123",
            "display_name": "Test Channel",
            "name": "test-channel",
            "type": "O",
            "total_msg_count": 100
        }))
        .unwrap();
        assert_eq!(channel.name, "test-channel");
        assert_eq!(channel.display_name, "Test Channel");
        assert!(channel.is_open());
        assert_eq!(channel.header, "");
    }

    #[test]
    fn post_from_payload() {
        let post: Post = serde_json::from_value(sample_post()).unwrap();
        assert_eq!(post.id, "post123");
        assert_eq!(post.message, "Test message");
        assert_eq!(post.channel_id, "channel123");
    }

    #[test]
    fn profile_flattens_user_fields() {
        let profile: UserProfile = serde_json::from_value(serde_json::json!({
            "id": "user123",
            "username": "testuser",
            "roles": "system_admin system_user",
            "timezone": {"useAutomaticTimezone": "true"},
            "email_verified": true,
            "last_picture_update": 1704067200000i64
        }))
        .unwrap();
        assert_eq!(profile.user.username, "testuser");
        assert!(profile.email_verified);
        assert!(profile.user.has_role("system_admin"));
        assert!(!profile.user.has_role("admin"));
    }

    #[test]
    fn ordered_skips_missing_posts() {
        let post: Post = serde_json::from_value(sample_post()).unwrap();
        let resp = PostsResponse {
            posts: BTreeMap::from([(post.id.clone(), post)]),
            order: vec!["ghost".into(), "post123".into()],
            ..Default::default()
        };
        let ids: Vec<&str> = resp.ordered().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["post123"]);
    }

    #[test]
    fn millis_format_as_utc() {
        assert_eq!(millis_to_rfc3339(1704067200000), "2024-01-01T00:00:00+00:00");
    }
}
