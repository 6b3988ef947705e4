//! The deployment descriptor: one service group running one container task.
//!
//! Stored as YAML with the scheduler's key names. [`JobSpec::validate`] lints
//! the cross references the scheduler would otherwise only reject at submit
//! time, and [`hcl`] renders the native job file.

pub mod hcl;

use crate::error::{McpError, Result};
use crate::restart::{RestartMode, RestartPolicy};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Finding / FindingLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub level: FindingLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingLevel {
    Warning,
    Error,
}

impl Finding {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: FindingLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: FindingLevel::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == FindingLevel::Error
    }
}

// ---------------------------------------------------------------------------
// Descriptor schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub job: String,
    pub datacenters: Vec<String>,
    #[serde(rename = "type", default = "default_job_type")]
    pub job_type: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    pub group: Group,
}

fn default_job_type() -> String {
    "service".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Group {
    pub name: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub service: Vec<Service>,
    #[serde(default)]
    pub restart: Restart,
    #[serde(default)]
    pub volume: BTreeMap<String, Volume>,
    pub task: Task,
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Network {
    #[serde(default)]
    pub port: BTreeMap<String, Port>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Port {
    /// Container-side port. The host side is assigned dynamically unless
    /// `static` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u16>,
    #[serde(rename = "static", default, skip_serializing_if = "Option::is_none")]
    pub static_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Service {
    pub name: String,
    pub port: String,
    #[serde(default)]
    pub check: Vec<Check>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Check {
    #[serde(rename = "type")]
    pub check_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub path: String,
    #[serde(with = "duration_text")]
    pub interval: Duration,
    #[serde(with = "duration_text")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Restart {
    pub attempts: u32,
    #[serde(with = "duration_text")]
    pub interval: Duration,
    #[serde(with = "duration_text")]
    pub delay: Duration,
    pub mode: RestartMode,
}

impl Default for Restart {
    fn default() -> Self {
        let p = RestartPolicy::default();
        Self {
            attempts: p.attempts,
            interval: p.interval,
            delay: p.delay,
            mode: p.mode,
        }
    }
}

impl From<&Restart> for RestartPolicy {
    fn from(r: &Restart) -> Self {
        Self {
            attempts: r.attempts,
            interval: r.interval,
            delay: r.delay,
            mode: r.mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Volume {
    #[serde(rename = "type")]
    pub volume_type: String,
    pub source: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    pub name: String,
    pub driver: String,
    pub config: TaskConfig,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateBlock>,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_mount: Option<VolumeMount>,
    #[serde(default)]
    pub logs: Logs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub image: String,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateBlock {
    pub destination: String,
    #[serde(default)]
    pub env: bool,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resources {
    /// MHz.
    pub cpu: u32,
    /// MB.
    pub memory: u32,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            cpu: 100,
            memory: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeMount {
    pub volume: String,
    pub destination: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Logs {
    pub max_files: u32,
    /// MB per file.
    pub max_file_size: u32,
}

impl Default for Logs {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_file_size: 10,
        }
    }
}

mod duration_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(raw.trim()).map_err(|e| {
            serde::de::Error::custom(format!("invalid duration '{raw}': {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Loading and linting
// ---------------------------------------------------------------------------

impl JobSpec {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(McpError::DescriptorNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::from(&self.group.restart)
    }

    /// Lint the descriptor. An empty result means the scheduler would accept
    /// it as far as this model can tell.
    pub fn validate(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        let group = &self.group;
        let task = &group.task;

        if self.datacenters.is_empty() {
            findings.push(Finding::error("job declares no datacenters"));
        }
        if !self.meta.contains_key("version") {
            findings.push(Finding::warning("meta.version is not set"));
        }
        if group.count == 0 {
            findings.push(Finding::error(format!(
                "group '{}' has count 0 and would never run",
                group.name
            )));
        }

        // 1. Every port reference resolves to a network.port declaration.
        for port in &task.config.ports {
            if !group.network.port.contains_key(port) {
                findings.push(Finding::error(format!(
                    "task '{}' references port '{}' which is not declared in network.port",
                    task.name, port
                )));
            }
        }
        for service in &group.service {
            if !group.network.port.contains_key(&service.port) {
                findings.push(Finding::error(format!(
                    "service '{}' references port '{}' which is not declared in network.port",
                    service.name, service.port
                )));
            }
        }

        // 2. Volume mounts resolve to a volume block.
        if let Some(mount) = &task.volume_mount {
            if !group.volume.contains_key(&mount.volume) {
                findings.push(Finding::error(format!(
                    "volume_mount references volume '{}' which is not declared",
                    mount.volume
                )));
            }
        }

        // 3. Checks.
        for service in &group.service {
            if service.check.is_empty() {
                findings.push(Finding::warning(format!(
                    "service '{}' exposes port '{}' without any check",
                    service.name, service.port
                )));
            }
            for check in &service.check {
                if !check.path.starts_with('/') {
                    findings.push(Finding::error(format!(
                        "check '{}' on service '{}' must start with '/'",
                        check.path, service.name
                    )));
                }
                if check.timeout >= check.interval {
                    findings.push(Finding::error(format!(
                        "check '{}' on service '{}' has timeout {} not below interval {}",
                        check.path,
                        service.name,
                        humantime::format_duration(check.timeout),
                        humantime::format_duration(check.interval)
                    )));
                }
            }
        }

        // 4. Restart budget.
        let restart = &group.restart;
        if restart.attempts == 0 {
            findings.push(Finding::error("restart.attempts must be at least 1"));
        } else {
            match restart.delay.checked_mul(restart.attempts) {
                Some(total) if total <= restart.interval => {}
                total => findings.push(Finding::warning(format!(
                    "restart.delay × attempts ({}) exceeds restart.interval ({})",
                    total
                        .map(|t| humantime::format_duration(t).to_string())
                        .unwrap_or_else(|| "overflow".into()),
                    humantime::format_duration(restart.interval)
                ))),
            }
        }

        // 5. Task body.
        if task.config.image.trim().is_empty() {
            findings.push(Finding::error(format!(
                "task '{}' has an empty image",
                task.name
            )));
        }
        if let Some(tpl) = &task.template {
            if let Err(e) = Template::parse(&tpl.data) {
                findings.push(Finding::error(format!(
                    "template for '{}' does not parse: {e}",
                    tpl.destination
                )));
            }
        }
        if task.logs.max_files == 0 || task.logs.max_file_size == 0 {
            findings.push(Finding::error(
                "logs.max_files and logs.max_file_size must both be above 0",
            ));
        }

        findings
    }
}
