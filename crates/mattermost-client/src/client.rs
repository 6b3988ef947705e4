use crate::error::MattermostError;
use crate::Result;
use mattermost_mcp_core::config::{base_url, Settings};
use mattermost_mcp_core::models::{
    Channel, ChannelsResponse, Post, PostsResponse, Reaction, User, UserProfile, UsersResponse,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Normalise a configured server URL: default to `https://` when no scheme
/// is given and drop a trailing `/api/v4`.
pub fn normalize_base_url(url: &str) -> Result<String> {
    let url = base_url(url);
    if url.is_empty() {
        return Err(MattermostError::InvalidUrl(url));
    }
    if url.contains("://") {
        Ok(url)
    } else {
        Ok(format!("https://{url}"))
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct NewPost<'a> {
    channel_id: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_id: Option<&'a str>,
}

#[derive(Serialize)]
struct NewReaction<'a> {
    user_id: &'a str,
    post_id: &'a str,
    emoji_name: &'a str,
}

/// Mattermost REST v4 client authenticated with a bot or personal token.
pub struct MattermostClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    team_id: String,
    logged_in: AtomicBool,
}

impl MattermostClient {
    pub fn new(url: &str, token: &str, team_id: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(url)?,
            token: token.to_string(),
            team_id: team_id.to_string(),
            logged_in: AtomicBool::new(false),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.mattermost_url,
            &settings.mattermost_token,
            &settings.mattermost_team_id,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    // ---------------------------------------------------------------------
    // Session
    // ---------------------------------------------------------------------

    /// Verify the token against `users/me`. Success is cached.
    pub async fn login(&self) -> Result<()> {
        if self.is_logged_in() {
            return Ok(());
        }
        self.check_connection().await
    }

    /// Always round-trips to the server, regardless of the cached login.
    pub async fn check_connection(&self) -> Result<()> {
        match self.get::<User>("/users/me", &[]).await {
            Ok(_) => {
                if !self.logged_in.swap(true, Ordering::SeqCst) {
                    tracing::info!(url = %self.base_url, "Connected to Mattermost");
                }
                Ok(())
            }
            Err(e) => {
                self.logged_in.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    pub async fn logout(&self) -> Result<()> {
        if !self.logged_in.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let resp = self
            .http
            .post(self.url("/users/logout"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode::<serde_json::Value>(resp).await?;
        tracing::info!("Disconnected from Mattermost");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Channels
    // ---------------------------------------------------------------------

    /// Public channels of the configured team.
    pub async fn get_channels(&self, limit: u32, page: u32) -> Result<ChannelsResponse> {
        self.login().await?;
        let path = format!("/teams/{}/channels", self.team_id);
        let channels: Vec<Channel> = self.get(&path, &paging(limit, page)).await?;
        Ok(ChannelsResponse {
            total_count: channels.len(),
            channels,
        })
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Channel> {
        self.login().await?;
        self.get(&format!("/channels/{channel_id}"), &[]).await
    }

    pub async fn get_channel_by_name(&self, channel_name: &str) -> Result<Channel> {
        self.login().await?;
        let path = format!("/teams/{}/channels/name/{channel_name}", self.team_id);
        self.get(&path, &[]).await
    }

    pub async fn create_direct_channel(&self, user_id_1: &str, user_id_2: &str) -> Result<Channel> {
        self.login().await?;
        self.post("/channels/direct", &[user_id_1, user_id_2]).await
    }

    // ---------------------------------------------------------------------
    // Posts
    // ---------------------------------------------------------------------

    pub async fn get_posts_for_channel(
        &self,
        channel_id: &str,
        limit: u32,
        page: u32,
    ) -> Result<PostsResponse> {
        self.login().await?;
        let path = format!("/channels/{channel_id}/posts");
        self.get(&path, &paging(limit, page)).await
    }

    /// Create a post. A non-empty `root_id` makes it a thread reply.
    pub async fn create_post(&self, channel_id: &str, message: &str, root_id: &str) -> Result<Post> {
        self.login().await?;
        let body = NewPost {
            channel_id,
            message,
            root_id: Some(root_id).filter(|r| !r.is_empty()),
        };
        self.post("/posts", &body).await
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post> {
        self.login().await?;
        self.get(&format!("/posts/{post_id}"), &[]).await
    }

    pub async fn get_post_thread(&self, post_id: &str) -> Result<PostsResponse> {
        self.login().await?;
        self.get(&format!("/posts/{post_id}/thread"), &[]).await
    }

    /// React as the authenticated user.
    pub async fn add_reaction(&self, post_id: &str, emoji_name: &str) -> Result<Reaction> {
        let me = self.get_me().await?;
        let body = NewReaction {
            user_id: &me.user.id,
            post_id,
            emoji_name,
        };
        self.post("/reactions", &body).await
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    pub async fn get_users(&self, limit: u32, page: u32) -> Result<UsersResponse> {
        self.login().await?;
        let users: Vec<User> = self.get("/users", &paging(limit, page)).await?;
        Ok(UsersResponse {
            total_count: users.len(),
            users,
        })
    }

    pub async fn get_user_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.login().await?;
        self.get(&format!("/users/{user_id}"), &[]).await
    }

    pub async fn get_me(&self) -> Result<UserProfile> {
        self.get_user_profile("me").await
    }

    // ---------------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}/api/v4{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .map(|b| b.message)
            .filter(|m| !m.is_empty())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or(body);
        tracing::debug!(status = status.as_u16(), %message, "Mattermost API error");
        Err(MattermostError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn paging(limit: u32, page: u32) -> [(&'static str, String); 2] {
    [("page", page.to_string()), ("per_page", limit.to_string())]
}
