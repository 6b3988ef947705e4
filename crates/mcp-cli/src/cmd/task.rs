use crate::output::{print_json, print_table};
use anyhow::{bail, Context};
use clap::ValueEnum;
use mattermost_mcp_core::paths;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::process::Command;

/// The fixed menu of build, test and container targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    Install,
    Dev,
    Run,
    Lint,
    Format,
    TypeCheck,
    Test,
    Build,
    DockerBuild,
    DockerRun,
    Clean,
}

/// One external program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: &'static str,
    pub args: &'static [&'static str],
    pub env: &'static [(&'static str, &'static str)],
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.env {
            write!(f, "{k}={v} ")?;
        }
        write!(f, "{}", self.program)?;
        for arg in self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

const fn cargo(args: &'static [&'static str]) -> Invocation {
    Invocation {
        program: "cargo",
        args,
        env: &[],
    }
}

impl Target {
    pub const ALL: [Target; 11] = [
        Target::Install,
        Target::Dev,
        Target::Run,
        Target::Lint,
        Target::Format,
        Target::TypeCheck,
        Target::Test,
        Target::Build,
        Target::DockerBuild,
        Target::DockerRun,
        Target::Clean,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Target::Install => "install",
            Target::Dev => "dev",
            Target::Run => "run",
            Target::Lint => "lint",
            Target::Format => "format",
            Target::TypeCheck => "type-check",
            Target::Test => "test",
            Target::Build => "build",
            Target::DockerBuild => "docker-build",
            Target::DockerRun => "docker-run",
            Target::Clean => "clean",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Target::Install => "Fetch dependencies",
            Target::Dev => "Run the server with debug text logging",
            Target::Run => "Run the release server",
            Target::Lint => "Lint the workspace, warnings are errors",
            Target::Format => "Format all crates",
            Target::TypeCheck => "Type-check every target",
            Target::Test => "Run the test suite",
            Target::Build => "Build release binaries",
            Target::DockerBuild => "Build the container image",
            Target::DockerRun => "Run the container image with .env",
            Target::Clean => "Remove build artifacts",
        }
    }

    pub fn invocation(self) -> Invocation {
        match self {
            Target::Install => cargo(&["fetch"]),
            Target::Dev => Invocation {
                program: "cargo",
                args: &["run", "-p", "mattermost-mcp", "--", "serve"],
                env: &[("LOG_FORMAT", "text"), ("LOG_LEVEL", "DEBUG")],
            },
            Target::Run => cargo(&["run", "--release", "-p", "mattermost-mcp", "--", "serve"]),
            Target::Lint => cargo(&[
                "clippy",
                "--workspace",
                "--all-targets",
                "--",
                "-D",
                "warnings",
            ]),
            Target::Format => cargo(&["fmt", "--all"]),
            Target::TypeCheck => cargo(&["check", "--workspace", "--all-targets"]),
            Target::Test => cargo(&["test", "--workspace"]),
            Target::Build => cargo(&["build", "--release", "--workspace"]),
            Target::DockerBuild => Invocation {
                program: "docker",
                args: &["build", "-t", "mattermost-mcp:latest", "."],
                env: &[],
            },
            Target::DockerRun => Invocation {
                program: "docker",
                args: &[
                    "run",
                    "--rm",
                    "-p",
                    "8000:8000",
                    "--env-file",
                    ".env",
                    "mattermost-mcp:latest",
                ],
                env: &[],
            },
            Target::Clean => cargo(&["clean"]),
        }
    }
}

/// Print the target menu.
pub fn list(json: bool) -> anyhow::Result<()> {
    if json {
        let items: Vec<serde_json::Value> = Target::ALL
            .iter()
            .map(|t| {
                serde_json::json!({
                    "target": t,
                    "description": t.description(),
                    "command": t.invocation().to_string(),
                })
            })
            .collect();
        return print_json(&items);
    }
    let rows: Vec<Vec<String>> = Target::ALL
        .iter()
        .map(|t| {
            vec![
                t.name().to_string(),
                t.description().to_string(),
                t.invocation().to_string(),
            ]
        })
        .collect();
    print_table(&["TARGET", "DESCRIPTION", "COMMAND"], &rows);
    Ok(())
}

/// Run one target in `root` and return the tool's exit code.
///
/// Nothing is retried. A program missing from `PATH` or a missing `.env`
/// for `docker-run` is an error before anything is launched.
pub fn run(target: Target, root: &Path, dry_run: bool) -> anyhow::Result<i32> {
    let inv = target.invocation();

    if target == Target::DockerRun {
        let env_file = paths::env_file_path(root);
        if !env_file.is_file() {
            bail!(
                "{} not found; docker-run needs it for the container environment (start from .env.example)",
                env_file.display()
            );
        }
    }

    if dry_run {
        println!("{inv}");
        return Ok(0);
    }

    let program = which::which(inv.program)
        .with_context(|| format!("'{}' not found on PATH (needed by '{}')", inv.program, target.name()))?;

    eprintln!("$ {inv}");
    tracing::debug!(target = target.name(), program = %program.display(), "running task");
    let status = Command::new(&program)
        .args(inv.args)
        .envs(inv.env.iter().copied())
        .current_dir(root)
        .status()
        .with_context(|| format!("failed to launch {}", program.display()))?;

    let code = status.code().unwrap_or(1);
    if code != 0 {
        tracing::debug!(target = target.name(), code, "task failed");
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_value_enum() {
        for t in Target::ALL {
            let parsed = Target::from_str(t.name(), false).unwrap();
            assert_eq!(parsed, t);
        }
    }

    #[test]
    fn dev_sets_debug_logging() {
        assert_eq!(
            Target::Dev.invocation().to_string(),
            "LOG_FORMAT=text LOG_LEVEL=DEBUG cargo run -p mattermost-mcp -- serve"
        );
    }

    #[test]
    fn docker_run_uses_env_file() {
        let inv = Target::DockerRun.invocation();
        assert_eq!(inv.program, "docker");
        assert!(inv.args.windows(2).any(|w| w == ["--env-file", ".env"]));
    }

    #[test]
    fn docker_run_without_env_file_fails_fast() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = run(Target::DockerRun, dir.path(), true).unwrap_err();
        assert!(err.to_string().contains(".env"));
    }
}
