//! Persistent record of which posts the topic monitor has already seen.

use crate::io::atomic_write;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    pub last_run: DateTime<Utc>,
    /// channel id → processed post ids, in the order they were seen.
    #[serde(default)]
    pub processed_posts: BTreeMap<String, Vec<String>>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            last_run: Utc::now(),
            processed_posts: BTreeMap::new(),
        }
    }
}

/// JSON-file backed [`MonitorState`].
///
/// Load and save failures are logged and never surface to callers: a broken
/// state file costs duplicate notifications, not a stopped monitor.
pub struct StateStore {
    path: PathBuf,
    state: MonitorState,
}

impl StateStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = absolute(path.as_ref());
        let state = Self::load(&path);
        Self { path, state }
    }

    fn load(path: &Path) -> MonitorState {
        if !path.exists() {
            return MonitorState::default();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|data| serde_json::from_str(&data).map_err(|e| e.to_string()));
        match parsed {
            Ok(state) => state,
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "Error loading monitor state");
                MonitorState::default()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp `last_run` and write the state file.
    pub fn save(&mut self) {
        self.state.last_run = Utc::now();
        let result = serde_json::to_vec_pretty(&self.state)
            .map_err(crate::McpError::from)
            .and_then(|data| atomic_write(&self.path, &data));
        match result {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Monitor state saved"),
            Err(error) => {
                tracing::error!(path = %self.path.display(), %error, "Error saving monitor state")
            }
        }
    }

    pub fn is_processed(&self, channel_id: &str, post_id: &str) -> bool {
        self.state
            .processed_posts
            .get(channel_id)
            .is_some_and(|ids| ids.iter().any(|id| id == post_id))
    }

    pub fn mark_processed(&mut self, channel_id: &str, post_id: &str) {
        if self.is_processed(channel_id, post_id) {
            return;
        }
        self.state
            .processed_posts
            .entry(channel_id.to_string())
            .or_default()
            .push(post_id.to_string());
    }

    /// Record `post_ids` for the channel. The channel counts as visited
    /// afterwards even when `post_ids` is empty.
    pub fn mark_all_processed<'a>(
        &mut self,
        channel_id: &str,
        post_ids: impl IntoIterator<Item = &'a str>,
    ) {
        self.state
            .processed_posts
            .entry(channel_id.to_string())
            .or_default();
        for id in post_ids {
            self.mark_processed(channel_id, id);
        }
    }

    pub fn processed_ids(&self, channel_id: &str) -> &[String] {
        self.state
            .processed_posts
            .get(channel_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// True until the channel has been recorded, even with no posts.
    pub fn is_first_visit(&self, channel_id: &str) -> bool {
        !self.state.processed_posts.contains_key(channel_id)
    }

    pub fn last_run(&self) -> DateTime<Utc> {
        self.state.last_run
    }

    pub fn snapshot(&self) -> MonitorState {
        self.state.clone()
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fresh_store_has_nothing_processed() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path().join("test-state.json"));
        assert!(!store.is_processed("channel1", "post1"));
        assert!(store.is_first_visit("channel1"));
    }

    #[test]
    fn mark_processed_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(dir.path().join("test-state.json"));
        store.mark_processed("channel1", "post1");
        store.mark_processed("channel1", "post1");
        assert!(store.is_processed("channel1", "post1"));
        assert!(!store.is_processed("channel1", "post2"));
        assert_eq!(store.processed_ids("channel1"), ["post1".to_string()]);
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/test-state.json");

        let mut first = StateStore::open(&path);
        first.mark_all_processed("channel1", ["post1", "post2"]);
        first.save();

        let second = StateStore::open(&path);
        assert!(second.is_processed("channel1", "post1"));
        assert!(second.is_processed("channel1", "post2"));
        assert!(!second.is_first_visit("channel1"));
    }

    #[test]
    fn empty_baseline_still_counts_as_visited() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let mut first = StateStore::open(&path);
        first.mark_all_processed("channel1", std::iter::empty());
        assert!(!first.is_first_visit("channel1"));
        assert!(first.processed_ids("channel1").is_empty());
        first.save();

        let second = StateStore::open(&path);
        assert!(!second.is_first_visit("channel1"));
        assert!(second.is_first_visit("channel2"));
    }

    #[test]
    fn corrupt_file_yields_empty_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = StateStore::open(&path);
        assert!(store.snapshot().processed_posts.is_empty());
    }
}
