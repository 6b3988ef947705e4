//! Per-channel topic analysis: fetch unseen posts, classify them against the
//! configured topics (LLM first, keyword fallback), record them as processed.

use anyhow::Context;
use claude_client::ClaudeClient;
use mattermost_client::MattermostClient;
use mattermost_mcp_core::config::{LlmConfig, MonitoringConfig};
use mattermost_mcp_core::models::{millis_to_rfc3339, Post};
use mattermost_mcp_core::state::StateStore;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Channels are looked up by name among this many public channels.
const CHANNEL_LOOKUP_LIMIT: u32 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub channel_id: String,
    pub channel_name: String,
    /// Relevant posts, newest first.
    pub posts: Vec<Post>,
    pub relevant_topics: Vec<String>,
    /// post id → topics it matched.
    pub post_topics: BTreeMap<String, Vec<String>>,
    /// user id → username, for the authors that could be resolved.
    pub authors: HashMap<String, String>,
}

/// Which posts matched which topics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Matching post ids in the order the posts were given.
    pub post_ids: Vec<String>,
    pub topics: Vec<String>,
    pub post_topics: BTreeMap<String, Vec<String>>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.post_ids.is_empty()
    }

    /// Build from a `topic → [post id]` mapping, keeping only ids of `posts`.
    fn from_topic_map(posts: &[Post], map: &BTreeMap<String, Vec<String>>) -> Self {
        let mut post_topics: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut topics = BTreeSet::new();
        for (topic, ids) in map {
            for id in ids {
                if posts.iter().any(|p| &p.id == id) {
                    topics.insert(topic.clone());
                    let entry = post_topics.entry(id.clone()).or_default();
                    if !entry.contains(topic) {
                        entry.push(topic.clone());
                    }
                }
            }
        }
        let post_ids = posts
            .iter()
            .filter(|p| post_topics.contains_key(&p.id))
            .map(|p| p.id.clone())
            .collect();
        Self {
            post_ids,
            topics: topics.into_iter().collect(),
            post_topics,
        }
    }
}

/// Case-insensitive substring match of every topic against every post.
pub fn keyword_classify(posts: &[Post], topics: &[String]) -> Classification {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for post in posts {
        let message = post.message.to_lowercase();
        for topic in topics {
            let needle = topic.to_lowercase();
            if !needle.is_empty() && message.contains(&needle) {
                map.entry(topic.clone()).or_default().push(post.id.clone());
            }
        }
    }
    Classification::from_topic_map(posts, &map)
}

fn json_span() -> &'static Regex {
    static JSON_SPAN: OnceLock<Regex> = OnceLock::new();
    JSON_SPAN.get_or_init(|| Regex::new(r"\{[\s\S]*\}").unwrap())
}

/// Extract `{"topics": {topic: [post ids]}}` from a model reply.
///
/// The reply may wrap the object in prose; the span from the first `{` to the
/// last `}` is parsed. Topics whose value is not a non-empty list are dropped.
/// Returns `None` when no parseable object is found.
pub fn parse_llm_reply(reply: &str) -> Option<BTreeMap<String, Vec<String>>> {
    let span = json_span().find(reply)?;
    let value: Value = serde_json::from_str(span.as_str()).ok()?;
    let topics = match value.get("topics") {
        Some(Value::Object(map)) => map,
        Some(_) => return None,
        None => return Some(BTreeMap::new()),
    };
    Some(
        topics
            .iter()
            .filter_map(|(topic, ids)| {
                let ids: Vec<String> = ids
                    .as_array()?
                    .iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect();
                (!ids.is_empty()).then(|| (topic.clone(), ids))
            })
            .collect(),
    )
}

pub fn build_prompt(
    channel_name: &str,
    topics: &[String],
    posts: &[Post],
    authors: &HashMap<String, String>,
) -> String {
    let formatted: Vec<String> = posts
        .iter()
        .map(|p| {
            let author = authors.get(&p.user_id).unwrap_or(&p.user_id);
            format!(
                "[ID: {}] [{}] {}: \"{}\"",
                p.id,
                millis_to_rfc3339(p.create_at),
                author,
                p.message
            )
        })
        .collect();

    format!(
        r#"You are analyzing messages from a Mattermost channel named "{channel_name}".

Your task is to determine which messages are related to any of these topics: {topics}

Here are the messages:
{messages}

For each topic, list the IDs of messages that are relevant to that topic.
Format your response as JSON:
{{
  "topics": {{
    "topic1": ["post_id1", "post_id2"],
    "topic2": ["post_id3"]
  }}
}}

Only include topics that have at least one relevant message.
If no messages are relevant to any topic, return {{"topics": {{}}}}.

Be semantic in your analysis. For example, if the topic is "table tennis" and a message mentions "ping pong equipment" or "butterfly rackets", it should be considered relevant.
"#,
        topics = topics.join(", "),
        messages = formatted.join("\n\n"),
    )
}

// ---------------------------------------------------------------------------
// MessageAnalyzer
// ---------------------------------------------------------------------------

struct Llm {
    client: ClaudeClient,
    model: String,
    max_tokens: u32,
}

pub struct MessageAnalyzer {
    client: Arc<MattermostClient>,
    state: Arc<Mutex<StateStore>>,
    topics: Vec<String>,
    message_limit: u32,
    first_run_limit: u32,
    process_existing: bool,
    llm: Option<Llm>,
}

impl MessageAnalyzer {
    pub fn new(
        client: Arc<MattermostClient>,
        state: Arc<Mutex<StateStore>>,
        config: &MonitoringConfig,
        llm_config: &LlmConfig,
    ) -> Self {
        let llm = if llm_config.has_api_key() {
            match ClaudeClient::with_base_url(llm_config.api_key.clone(), &llm_config.base_url) {
                Ok(client) => Some(Llm {
                    client,
                    model: llm_config.model.clone(),
                    max_tokens: llm_config.max_tokens,
                }),
                Err(e) => {
                    warn!(error = %e, "LLM client unavailable, using keyword matching");
                    None
                }
            }
        } else {
            None
        };

        Self {
            client,
            state,
            topics: config.topics.clone(),
            message_limit: config.message_limit,
            first_run_limit: config.first_run_limit,
            process_existing: config.process_existing_on_first_run,
            llm,
        }
    }

    pub fn uses_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Analyse one channel by name. Errors are logged and yield `None`.
    pub async fn analyze_channel(&self, channel_name: &str) -> Option<AnalysisResult> {
        info!(channel = channel_name, "Analyzing channel");
        match self.try_analyze(channel_name).await {
            Ok(result) => result,
            Err(e) => {
                error!(channel = channel_name, error = %format!("{e:#}"), "Error analyzing channel");
                None
            }
        }
    }

    async fn try_analyze(&self, channel_name: &str) -> anyhow::Result<Option<AnalysisResult>> {
        let channels = self
            .client
            .get_channels(CHANNEL_LOOKUP_LIMIT, 0)
            .await
            .context("listing channels")?;
        let Some(channel) = channels.channels.into_iter().find(|c| c.name == channel_name) else {
            warn!(channel = channel_name, "Channel not found");
            return Ok(None);
        };

        let first_visit = self.state.lock().await.is_first_visit(&channel.id);
        if first_visit && !self.process_existing {
            let response = self
                .client
                .get_posts_for_channel(&channel.id, self.message_limit, 0)
                .await
                .context("fetching posts")?;
            let mut state = self.state.lock().await;
            state.mark_all_processed(&channel.id, response.ordered().map(|p| p.id.as_str()));
            state.save();
            info!(
                channel = channel_name,
                baseline = response.order.len(),
                "First run, recorded existing posts as baseline"
            );
            return Ok(None);
        }

        let limit = if first_visit {
            self.first_run_limit
        } else {
            self.message_limit
        };
        let response = self
            .client
            .get_posts_for_channel(&channel.id, limit, 0)
            .await
            .context("fetching posts")?;

        let unprocessed: Vec<Post> = {
            let state = self.state.lock().await;
            response
                .ordered()
                .filter(|p| !state.is_processed(&channel.id, &p.id))
                .cloned()
                .collect()
        };
        if unprocessed.is_empty() {
            if first_visit {
                let mut state = self.state.lock().await;
                state.mark_all_processed(&channel.id, std::iter::empty());
                state.save();
            }
            debug!(channel = channel_name, "No new posts to analyze");
            return Ok(None);
        }

        let authors = self.resolve_authors(&unprocessed).await;
        let classification = self
            .classify(channel_name, &unprocessed, &authors)
            .await;

        {
            let mut state = self.state.lock().await;
            state.mark_all_processed(&channel.id, unprocessed.iter().map(|p| p.id.as_str()));
            state.save();
        }

        if classification.is_empty() {
            debug!(channel = channel_name, "No relevant posts found");
            return Ok(None);
        }

        let posts = unprocessed
            .into_iter()
            .filter(|p| classification.post_ids.contains(&p.id))
            .collect();
        Ok(Some(AnalysisResult {
            channel_id: channel.id,
            channel_name: channel.name,
            posts,
            relevant_topics: classification.topics,
            post_topics: classification.post_topics,
            authors,
        }))
    }

    /// Look up each distinct author once. Failed lookups are left out.
    async fn resolve_authors(&self, posts: &[Post]) -> HashMap<String, String> {
        let mut authors = HashMap::new();
        let mut failed = BTreeSet::new();
        for post in posts {
            if authors.contains_key(&post.user_id) || failed.contains(&post.user_id) {
                continue;
            }
            match self.client.get_user_profile(&post.user_id).await {
                Ok(profile) => {
                    authors.insert(post.user_id.clone(), profile.user.username);
                }
                Err(e) => {
                    debug!(user_id = %post.user_id, error = %e, "author lookup failed");
                    failed.insert(post.user_id.clone());
                }
            }
        }
        authors
    }

    async fn classify(
        &self,
        channel_name: &str,
        posts: &[Post],
        authors: &HashMap<String, String>,
    ) -> Classification {
        let Some(llm) = &self.llm else {
            debug!("Using fallback keyword matching");
            return keyword_classify(posts, &self.topics);
        };

        let prompt = build_prompt(channel_name, &self.topics, posts, authors);
        debug!("Sending request to Anthropic API");
        let reply = match llm.client.complete(&llm.model, llm.max_tokens, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Error calling Anthropic API");
                return keyword_classify(posts, &self.topics);
            }
        };

        match parse_llm_reply(&reply) {
            Some(map) => {
                let classification = Classification::from_topic_map(posts, &map);
                info!(
                    relevant_count = classification.post_ids.len(),
                    topics = ?classification.topics,
                    "LLM analysis complete"
                );
                classification
            }
            None => {
                warn!("Could not parse LLM response, using fallback");
                keyword_classify(posts, &self.topics)
            }
        }
    }
}
