//! Scheduled topic monitoring: analyse configured channels and send a
//! notification to one target user for each channel with relevant posts.

pub mod analyzer;
pub mod scheduler;

use analyzer::{AnalysisResult, MessageAnalyzer};
use anyhow::{anyhow, Context};
use chrono::Utc;
use futures::FutureExt;
use mattermost_client::MattermostClient;
use mattermost_mcp_core::config::{LlmConfig, MonitoringConfig};
use mattermost_mcp_core::cron::CronSchedule;
use mattermost_mcp_core::models::{millis_to_datetime, Channel, User};
use mattermost_mcp_core::state::StateStore;
use scheduler::{Job, Scheduler};
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

const NOTIFY_MAX_POSTS: usize = 5;
const EXCERPT_CHARS: usize = 100;
const FALLBACK_CHANNEL: &str = "town-square";

/// Who gets notified, and where.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationTarget {
    pub user_id: String,
    pub username: String,
    pub channel_id: String,
}

struct Runner {
    client: Arc<MattermostClient>,
    analyzer: MessageAnalyzer,
    channels: Vec<String>,
    target: RwLock<Option<NotificationTarget>>,
}

impl Runner {
    async fn run_once(&self) {
        let started = Utc::now();
        let mut results = Vec::new();
        for channel in &self.channels {
            if let Some(result) = self.analyzer.analyze_channel(channel).await {
                results.push(result);
            }
        }
        for result in &results {
            self.notify(result).await;
        }
        info!(
            channels = self.channels.len(),
            notifications = results.len(),
            elapsed_ms = (Utc::now() - started).num_milliseconds(),
            "monitoring run finished"
        );
    }

    async fn notify(&self, result: &AnalysisResult) {
        let Some(target) = self.target.read().await.clone() else {
            warn!("No notification channel configured");
            return;
        };
        let message = format_notification(
            result,
            &target.username,
            self.client.base_url(),
            self.client.team_id(),
        );
        match self.client.create_post(&target.channel_id, &message, "").await {
            Ok(_) => info!(
                channel = %result.channel_name,
                posts = result.posts.len(),
                "Sent notification"
            ),
            Err(e) => error!(channel = %result.channel_name, error = %e, "Error sending notification"),
        }
    }
}

pub struct TopicMonitor {
    client: Arc<MattermostClient>,
    runner: Arc<Runner>,
    scheduler: Scheduler,
    state_path: std::path::PathBuf,
}

impl TopicMonitor {
    /// Build a monitor. Fails only on an invalid cron schedule.
    pub fn new(
        client: Arc<MattermostClient>,
        config: &MonitoringConfig,
        llm_config: &LlmConfig,
    ) -> mattermost_mcp_core::Result<Self> {
        let schedule = CronSchedule::parse(&config.schedule)?;
        let store = StateStore::open(&config.state_path);
        let state_path = store.path().to_path_buf();
        let analyzer = MessageAnalyzer::new(
            client.clone(),
            Arc::new(Mutex::new(store)),
            config,
            llm_config,
        );
        info!(
            schedule = %schedule,
            channels = ?config.channels,
            topics = ?config.topics,
            llm = analyzer.uses_llm(),
            "topic monitor configured"
        );
        Ok(Self {
            runner: Arc::new(Runner {
                client: client.clone(),
                analyzer,
                channels: config.channels.clone(),
                target: RwLock::new(None),
            }),
            client,
            scheduler: Scheduler::new(schedule),
            state_path,
        })
    }

    /// Resolve the notification target and start the scheduler.
    pub async fn start(&self) -> anyhow::Result<()> {
        let target = self.resolve_target().await?;
        info!(
            username = %target.username,
            channel_id = %target.channel_id,
            "notification target ready"
        );
        *self.runner.target.write().await = Some(target);
        self.scheduler.start(self.job());
        Ok(())
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Run immediately. Returns false when a run is already in progress.
    pub async fn run_now(&self) -> bool {
        self.scheduler.run_now(&self.job()).await
    }

    /// True while the scheduler loop is active.
    pub fn is_enabled(&self) -> bool {
        self.scheduler.is_active()
    }

    /// True while a monitoring run is in progress.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_job_running()
    }

    pub fn state_path(&self) -> &std::path::Path {
        &self.state_path
    }

    pub async fn target(&self) -> Option<NotificationTarget> {
        self.runner.target.read().await.clone()
    }

    fn job(&self) -> Job {
        let runner = self.runner.clone();
        Arc::new(move || {
            let runner = runner.clone();
            async move { runner.run_once().await }.boxed()
        })
    }

    async fn resolve_target(&self) -> anyhow::Result<NotificationTarget> {
        let users = self
            .client
            .get_users(100, 0)
            .await
            .context("listing users")?
            .users;
        let user = pick_target_user(&users)
            .ok_or_else(|| anyhow!("No users found in Mattermost"))?
            .clone();
        info!(username = %user.username, "Found notification target user");

        let me = self.client.get_me().await.context("resolving bot user")?;
        info!(username = %me.user.username, "Running as user");

        let channel_id = match self.client.create_direct_channel(&me.user.id, &user.id).await {
            Ok(dm) => {
                info!("Created DM channel for notifications");
                dm.id
            }
            Err(e) => {
                warn!(error = %e, "Could not create DM channel, using fallback");
                let channels = self
                    .client
                    .get_channels(200, 0)
                    .await
                    .context("listing channels")?
                    .channels;
                let fallback = pick_fallback_channel(&channels)
                    .ok_or_else(|| anyhow!("No suitable channel found for notifications"))?;
                info!(channel = %fallback.name, "Using fallback channel for notifications");
                fallback.id.clone()
            }
        };

        Ok(NotificationTarget {
            user_id: user.id,
            username: user.username,
            channel_id,
        })
    }
}

/// First admin, else first non-bot regular user, else first non-bot, else first.
pub fn pick_target_user(users: &[User]) -> Option<&User> {
    users
        .iter()
        .find(|u| u.has_role("system_admin"))
        .or_else(|| users.iter().find(|u| !u.is_bot && u.has_role("system_user")))
        .or_else(|| users.iter().find(|u| !u.is_bot))
        .or_else(|| users.first())
}

pub fn pick_fallback_channel(channels: &[Channel]) -> Option<&Channel> {
    channels
        .iter()
        .find(|c| c.name == FALLBACK_CHANNEL)
        .or_else(|| channels.iter().find(|c| c.is_open()))
        .or_else(|| channels.first())
}

pub fn format_notification(
    result: &AnalysisResult,
    username: &str,
    base_url: &str,
    team_id: &str,
) -> String {
    let mut out = format!("@{username} **Topic Monitor Alert**\n\n");
    let _ = write!(
        out,
        "Found {} relevant posts in channel: **{}**\n\n**Recent Messages:**\n",
        result.posts.len(),
        result.channel_name
    );

    for post in result.posts.iter().take(NOTIFY_MAX_POSTS) {
        let author = result.authors.get(&post.user_id).unwrap_or(&post.user_id);
        let timestamp = millis_to_datetime(post.create_at).format("%Y-%m-%d %H:%M");
        let excerpt: String = post.message.chars().take(EXCERPT_CHARS).collect();
        let ellipsis = if post.message.chars().count() > EXCERPT_CHARS {
            "..."
        } else {
            ""
        };
        let topics = result
            .post_topics
            .get(&post.id)
            .unwrap_or(&result.relevant_topics)
            .join(", ");
        let _ = write!(
            out,
            "- [{timestamp} ({author})]({base_url}/{team_id}/pl/{id}): \"{excerpt}{ellipsis}\"\n  Topics: **{topics}**\n\n",
            id = post.id
        );
    }

    if result.posts.len() > NOTIFY_MAX_POSTS {
        let _ = writeln!(out, "... and {} more", result.posts.len() - NOTIFY_MAX_POSTS);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mattermost_mcp_core::models::Post;
    use std::collections::{BTreeMap, HashMap};

    fn user(id: &str, roles: &str, is_bot: bool) -> User {
        User {
            id: id.into(),
            username: id.into(),
            roles: roles.into(),
            is_bot,
            ..Default::default()
        }
    }

    #[test]
    fn target_prefers_admin_then_regular_user() {
        let users = vec![
            user("bot", "system_user", true),
            user("bob", "system_user", false),
            user("root", "system_admin system_user", false),
        ];
        assert_eq!(pick_target_user(&users).unwrap().id, "root");
        assert_eq!(pick_target_user(&users[..2]).unwrap().id, "bob");
        assert_eq!(pick_target_user(&users[..1]).unwrap().id, "bot");
        assert!(pick_target_user(&[]).is_none());
    }

    #[test]
    fn fallback_channel_order() {
        let channel = |name: &str, kind: &str| Channel {
            id: name.into(),
            name: name.into(),
            channel_type: kind.into(),
            ..Default::default()
        };
        let channels = vec![channel("private", "P"), channel("random", "O"), channel("town-square", "O")];
        assert_eq!(pick_fallback_channel(&channels).unwrap().name, "town-square");
        assert_eq!(pick_fallback_channel(&channels[..2]).unwrap().name, "random");
        assert_eq!(pick_fallback_channel(&channels[..1]).unwrap().name, "private");
    }

    fn result_with(n: usize) -> AnalysisResult {
        let posts: Vec<Post> = (0..n)
            .map(|i| Post {
                id: format!("p{i}"),
                user_id: "u1".into(),
                message: "x".repeat(120),
                create_at: 1704110400000,
                ..Default::default()
            })
            .collect();
        let mut post_topics = BTreeMap::new();
        post_topics.insert("p0".to_string(), vec!["table tennis".to_string()]);
        let mut authors = HashMap::new();
        authors.insert("u1".to_string(), "alice".to_string());
        AnalysisResult {
            channel_id: "c1".into(),
            channel_name: "general".into(),
            posts,
            relevant_topics: vec!["release".into(), "table tennis".into()],
            post_topics,
            authors,
        }
    }

    #[test]
    fn notification_format() {
        let text = format_notification(&result_with(7), "root", "https://mm.example.com", "team1");
        assert!(text.starts_with(
            "@root **Topic Monitor Alert**\n\nFound 7 relevant posts in channel: **general**\n\n**Recent Messages:**\n"
        ));
        let excerpt = "x".repeat(100);
        assert!(text.contains(&format!(
            "- [2024-01-01 12:00 (alice)](https://mm.example.com/team1/pl/p0): \"{excerpt}...\"\n  Topics: **table tennis**\n\n"
        )));
        assert!(text.contains("pl/p1): "));
        assert!(text.contains("Topics: **release, table tennis**"));
        assert!(!text.contains("pl/p5)"));
        assert!(text.ends_with("... and 2 more\n"));
    }

    #[test]
    fn short_notification_has_no_tail() {
        let text = format_notification(&result_with(1), "root", "https://mm", "t");
        assert!(!text.contains("more"));
    }
}
