use crate::output::{print_json, print_table};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use mattermost_mcp_core::deploy::{FindingLevel, JobSpec};
use mattermost_mcp_core::io::atomic_write;
use mattermost_mcp_core::restart::{Decision, RestartTracker};
use mattermost_mcp_core::template::{self, SecretStore};
use mattermost_mcp_core::{paths, McpError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Subcommand)]
pub enum DeploySubcommand {
    /// Lint the deployment descriptor
    Validate {
        /// Descriptor path (default: deploy/mattermost-mcp.yaml)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Render the task's env template against a local secrets file
    RenderEnv {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Secrets YAML keyed by secret path (default: deploy/secrets.yaml)
        #[arg(long)]
        secrets: Option<PathBuf>,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replay task failures against the group's restart policy
    Restarts {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Failure times as offsets from the first, in order (e.g. 0s 40s 2m)
        #[arg(required = true)]
        failures: Vec<String>,
    },

    /// Print the descriptor as a scheduler job file
    Export {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: DeploySubcommand, json: bool) -> anyhow::Result<()> {
    let descriptor = |file: Option<PathBuf>| file.unwrap_or_else(|| paths::descriptor_path(root));
    match subcmd {
        DeploySubcommand::Validate { file } => validate(&descriptor(file), json),
        DeploySubcommand::RenderEnv {
            file,
            secrets,
            output,
        } => render_env(
            &descriptor(file),
            &secrets.unwrap_or_else(|| paths::secrets_path(root)),
            output.as_deref(),
        ),
        DeploySubcommand::Restarts { file, failures } => {
            restarts(&descriptor(file), &failures, json)
        }
        DeploySubcommand::Export { file, output } => export(&descriptor(file), output.as_deref()),
    }
}

fn load(path: &Path) -> anyhow::Result<JobSpec> {
    JobSpec::load(path).with_context(|| format!("failed to load {}", path.display()))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(path: &Path, json: bool) -> anyhow::Result<()> {
    let spec = load(path)?;
    let findings = spec.validate();
    let errors = findings.iter().filter(|f| f.is_error()).count();

    if json {
        print_json(&serde_json::json!({
            "file": path.display().to_string(),
            "valid": errors == 0,
            "findings": findings,
        }))?;
    } else {
        for f in &findings {
            let tag = match f.level {
                FindingLevel::Error => "error",
                FindingLevel::Warning => "warning",
            };
            println!("{tag}: {}", f.message);
        }
        if errors == 0 {
            println!(
                "{}: ok ({} warning(s))",
                path.display(),
                findings.len()
            );
        }
    }

    if errors > 0 {
        bail!("{}: {errors} error(s)", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// render-env
// ---------------------------------------------------------------------------

fn render_env(path: &Path, secrets: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let spec = load(path)?;
    let Some(tpl) = &spec.group.task.template else {
        bail!("task '{}' declares no template", spec.group.task.name);
    };
    let store = SecretStore::load(secrets)?;
    let rendered = template::render(&tpl.data, &store)
        .with_context(|| format!("rendering template for {}", tpl.destination))?;

    match output {
        Some(out) => {
            atomic_write(out, rendered.as_bytes())?;
            eprintln!("wrote {}", out.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// restarts
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Step {
    at: String,
    decision: Decision,
    in_window: usize,
}

pub(crate) fn parse_offsets(raw: &[String]) -> anyhow::Result<Vec<Duration>> {
    let mut offsets = Vec::with_capacity(raw.len());
    for value in raw {
        let d = humantime::parse_duration(value).map_err(|e| McpError::InvalidDuration {
            value: value.clone(),
            reason: e.to_string(),
        })?;
        if offsets.last().is_some_and(|prev| d < *prev) {
            bail!("failure offsets must be in order: '{value}' comes before an earlier one");
        }
        offsets.push(d);
    }
    Ok(offsets)
}

fn restarts(path: &Path, failures: &[String], json: bool) -> anyhow::Result<()> {
    let spec = load(path)?;
    let offsets = parse_offsets(failures)?;
    let mut tracker = RestartTracker::new(spec.restart_policy());
    let start = Utc::now();

    let mut steps = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        let at = start + chrono::Duration::from_std(*offset)?;
        let decision = tracker.record_failure(at);
        steps.push(Step {
            at: humantime::format_duration(*offset).to_string(),
            in_window: tracker.restarts_in_window(at),
            decision,
        });
    }

    if json {
        return print_json(&serde_json::json!({
            "policy": {
                "attempts": tracker.policy().attempts,
                "interval": humantime::format_duration(tracker.policy().interval).to_string(),
                "delay": humantime::format_duration(tracker.policy().delay).to_string(),
                "mode": tracker.policy().mode,
            },
            "steps": steps,
            "failed": tracker.is_failed(),
        }));
    }

    let rows: Vec<Vec<String>> = steps
        .iter()
        .map(|s| {
            vec![
                format!("+{}", s.at),
                describe(&s.decision, start),
                s.in_window.to_string(),
            ]
        })
        .collect();
    print_table(&["FAILURE", "DECISION", "RESTARTS IN WINDOW"], &rows);
    if tracker.is_failed() {
        println!("group failed: restart budget exhausted");
    }
    Ok(())
}

fn describe(decision: &Decision, start: DateTime<Utc>) -> String {
    match decision {
        Decision::Wait { until } => {
            let offset = (*until - start).to_std().unwrap_or_default();
            format!("wait until +{}", humantime::format_duration(offset))
        }
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// export
// ---------------------------------------------------------------------------

fn export(path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let spec = load(path)?;
    let findings = spec.validate();
    if let Some(first) = findings.iter().find(|f| f.is_error()) {
        bail!("refusing to export an invalid descriptor: {}", first.message);
    }
    let hcl = spec.to_hcl();
    match output {
        Some(out) => {
            atomic_write(out, hcl.as_bytes())?;
            eprintln!("wrote {}", out.display());
        }
        None => print!("{hcl}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn offsets_parse_in_order() {
        let offsets = parse_offsets(&strings(&["0s", "90s", "2m"])).unwrap();
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_secs(90),
                Duration::from_secs(120)
            ]
        );
    }

    #[test]
    fn bad_offset_is_invalid_duration() {
        let err = parse_offsets(&strings(&["0s", "soon"])).unwrap_err();
        assert!(err.to_string().contains("invalid duration 'soon'"));
    }

    #[test]
    fn offsets_out_of_order_rejected() {
        assert!(parse_offsets(&strings(&["2m", "1m"])).is_err());
    }
}
