use crate::error::{McpError, Result};
use serde::Serialize;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_SCHEDULE: &str = "*/5 * * * *";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

/// Variable lookup. Production code passes `std::env::var`; tests pass a map.
pub trait Lookup {
    fn get(&self, key: &str) -> Option<String>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(env: &impl Lookup, key: &str) -> Option<String> {
    env.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(env: &impl Lookup, key: &str) -> Result<String> {
    non_empty(env, key).ok_or_else(|| McpError::MissingSetting(key.to_string()))
}

fn string_or(env: &impl Lookup, key: &str, default: &str) -> String {
    non_empty(env, key).unwrap_or_else(|| default.to_string())
}

fn parsed_or<T>(env: &impl Lookup, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(env, key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| McpError::InvalidSetting {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn bool_or(env: &impl Lookup, key: &str, default: bool) -> Result<bool> {
    match non_empty(env, key) {
        None => Ok(default),
        Some(raw) => parse_bool(&raw).ok_or_else(|| McpError::InvalidSetting {
            key: key.to_string(),
            reason: format!("expected a boolean, got '{raw}'"),
        }),
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Connection and server settings.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub mattermost_url: String,
    #[serde(skip_serializing)]
    pub mattermost_token: String,
    pub mattermost_team_id: String,
    pub http_port: u16,
    pub log_level: String,
    pub log_format: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(env: &impl Lookup) -> Result<Self> {
        Ok(Self {
            mattermost_url: required(env, "MATTERMOST_URL")?,
            mattermost_token: required(env, "MATTERMOST_TOKEN")?,
            mattermost_team_id: required(env, "MATTERMOST_TEAM_ID")?,
            http_port: parsed_or(env, "HTTP_PORT", DEFAULT_HTTP_PORT)?,
            log_level: string_or(env, "LOG_LEVEL", "INFO"),
            log_format: string_or(env, "LOG_FORMAT", "json"),
        })
    }

    /// The server URL without a trailing slash or `/api/v4` suffix.
    pub fn mattermost_base_url(&self) -> String {
        base_url(&self.mattermost_url)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Normalise a Mattermost URL: drop trailing slashes and an `/api/v4` suffix.
pub fn base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    url.strip_suffix("/api/v4").unwrap_or(url).to_string()
}

// ---------------------------------------------------------------------------
// MonitoringConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub schedule: String,
    pub channels: Vec<String>,
    pub topics: Vec<String>,
    pub message_limit: u32,
    pub state_path: String,
    /// Analyse the posts already in a channel the first time it is seen,
    /// instead of recording them as a baseline.
    pub process_existing_on_first_run: bool,
    pub first_run_limit: u32,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            schedule: DEFAULT_SCHEDULE.to_string(),
            channels: Vec::new(),
            topics: Vec::new(),
            message_limit: 50,
            state_path: "./monitor-state.json".to_string(),
            process_existing_on_first_run: false,
            first_run_limit: 10,
        }
    }
}

impl MonitoringConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(env: &impl Lookup) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            enabled: bool_or(env, "MONITORING_ENABLED", d.enabled)?,
            schedule: string_or(env, "MONITORING_SCHEDULE", &d.schedule),
            channels: non_empty(env, "MONITORING_CHANNELS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            topics: non_empty(env, "MONITORING_TOPICS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            message_limit: parsed_or(env, "MONITORING_MESSAGE_LIMIT", d.message_limit)?,
            state_path: string_or(env, "MONITORING_STATE_PATH", &d.state_path),
            process_existing_on_first_run: bool_or(
                env,
                "MONITORING_PROCESS_EXISTING",
                d.process_existing_on_first_run,
            )?,
            first_run_limit: parsed_or(env, "MONITORING_FIRST_RUN_LIMIT", d.first_run_limit)?,
        })
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LlmConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1000,
            base_url: DEFAULT_ANTHROPIC_URL.to_string(),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(env: &impl Lookup) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            api_key: non_empty(env, "ANTHROPIC_API_KEY").unwrap_or_default(),
            model: string_or(env, "ANTHROPIC_MODEL", &d.model),
            max_tokens: parsed_or(env, "ANTHROPIC_MAX_TOKENS", d.max_tokens)?,
            base_url: string_or(env, "ANTHROPIC_BASE_URL", &d.base_url),
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    fn required_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("MATTERMOST_URL", "https://mattermost.test.com"),
            ("MATTERMOST_TOKEN", "test-token"),
            ("MATTERMOST_TEAM_ID", "test-team-id"),
        ]
    }

    #[test]
    fn settings_from_lookup() {
        let s = Settings::from_lookup(&env(&required_env())).unwrap();
        assert_eq!(s.mattermost_url, "https://mattermost.test.com");
        assert_eq!(s.mattermost_token, "test-token");
        assert_eq!(s.mattermost_team_id, "test-team-id");
        assert_eq!(s.http_port, 8000);
        assert_eq!(s.log_level, "INFO");
        assert!(s.json_logs());
    }

    #[test]
    fn settings_missing_token_errors() {
        let err = Settings::from_lookup(&env(&[
            ("MATTERMOST_URL", "https://m.test"),
            ("MATTERMOST_TEAM_ID", "t"),
        ]))
        .unwrap_err();
        assert!(matches!(err, McpError::MissingSetting(ref k) if k == "MATTERMOST_TOKEN"));
    }

    #[test]
    fn settings_bad_port_errors() {
        let mut pairs = required_env();
        pairs.push(("HTTP_PORT", "eighty"));
        let err = Settings::from_lookup(&env(&pairs)).unwrap_err();
        assert!(matches!(err, McpError::InvalidSetting { ref key, .. } if key == "HTTP_PORT"));
    }

    #[test]
    fn base_url_strips_api_suffix() {
        assert_eq!(base_url("https://chat.example.com/api/v4/"), "https://chat.example.com");
        assert_eq!(base_url("https://chat.example.com/"), "https://chat.example.com");
        assert_eq!(base_url("chat.example.com:8065"), "chat.example.com:8065");
    }

    #[test]
    fn monitoring_defaults() {
        let cfg = MonitoringConfig::from_lookup(&env(&[])).unwrap();
        assert!(!cfg.enabled);
        assert_eq!(cfg.schedule, "*/5 * * * *");
        assert_eq!(cfg.message_limit, 50);
        assert_eq!(cfg.first_run_limit, 10);
        assert_eq!(cfg.state_path, "./monitor-state.json");
        assert!(cfg.channels.is_empty());
    }

    #[test]
    fn monitoring_lists_are_trimmed() {
        let cfg = MonitoringConfig::from_lookup(&env(&[
            ("MONITORING_ENABLED", "Yes"),
            ("MONITORING_CHANNELS", " town-square , ,dev "),
            ("MONITORING_TOPICS", "table tennis,deploys"),
            ("MONITORING_PROCESS_EXISTING", "1"),
        ]))
        .unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.channels, vec!["town-square", "dev"]);
        assert_eq!(cfg.topics, vec!["table tennis", "deploys"]);
        assert!(cfg.process_existing_on_first_run);
    }

    #[test]
    fn monitoring_rejects_bad_bool() {
        let err = MonitoringConfig::from_lookup(&env(&[("MONITORING_ENABLED", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("MONITORING_ENABLED"));
    }

    #[test]
    fn llm_defaults() {
        let cfg = LlmConfig::from_lookup(&env(&[])).unwrap();
        assert_eq!(cfg.model, "claude-sonnet-4-20250514");
        assert_eq!(cfg.max_tokens, 1000);
        assert!(!cfg.has_api_key());
    }
}
