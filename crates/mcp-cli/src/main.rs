mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::deploy::DeploySubcommand;
use cmd::task::Target;
use mattermost_mcp_core::{envfile, paths};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mattermost-mcp",
    about = "Mattermost MCP server, deployment descriptor tooling and task dispatcher",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root for deploy files and tasks (default: current directory)
    #[arg(long, global = true, env = "MATTERMOST_MCP_ROOT")]
    root: Option<PathBuf>,

    /// Env file loaded before anything else; never overrides set variables
    #[arg(long, global = true, env = "MATTERMOST_MCP_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP MCP server (and the topic monitor when enabled)
    Serve {
        /// Port to listen on (default: HTTP_PORT or 8000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run as an MCP stdio server
    Mcp,

    /// Lint, render and export the deployment descriptor
    Deploy {
        #[command(subcommand)]
        subcommand: DeploySubcommand,
    },

    /// Run a build, test or container target
    Task {
        /// Target to run (omit to list targets)
        target: Option<Target>,

        /// Print the command instead of running it
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let root = cli
        .root
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let env_loaded = load_env_file(&root, cli.env_file.as_deref());

    let server = matches!(cli.command, Commands::Serve { .. } | Commands::Mcp);
    init_logging(server);

    let env_loaded = match env_loaded {
        Ok(Some((path, count))) => {
            tracing::debug!(path = %path.display(), count, "loaded env file");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };

    let result = env_loaded.and_then(|()| match cli.command {
        Commands::Serve { port } => cmd::serve::run(port),
        Commands::Mcp => cmd::mcp::run(),
        Commands::Deploy { subcommand } => cmd::deploy::run(&root, subcommand, cli.json),
        Commands::Task { target: None, .. } => cmd::task::list(cli.json),
        Commands::Task {
            target: Some(target),
            dry_run,
        } => match cmd::task::run(target, &root, dry_run) {
            Ok(0) => Ok(()),
            // Mirror the tool's own exit status.
            Ok(code) => std::process::exit(code),
            Err(e) => Err(e),
        },
    });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

/// Load `--env-file`, or `.env` under the root when present. An explicitly
/// named file that does not exist is an error.
fn load_env_file(root: &Path, explicit: Option<&Path>) -> anyhow::Result<Option<(PathBuf, usize)>> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let default = paths::env_file_path(root);
            if !default.is_file() {
                return Ok(None);
            }
            default
        }
    };
    let count = envfile::load_into_process(&path)?;
    Ok(Some((path, count)))
}

/// `LOG_LEVEL` sets the default directive and `RUST_LOG` overrides it.
/// `LOG_FORMAT=json` selects JSON lines, anything else plain text. Server
/// commands default to INFO and JSON, the rest to WARN and text. Logs always
/// go to stderr so the stdio transport keeps stdout for protocol traffic.
fn init_logging(server: bool) {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
    let (default_level, default_format) = if server {
        ("info", "json")
    } else {
        ("warn", "text")
    };
    let level = env("LOG_LEVEL")
        .map(|l| l.trim().to_lowercase())
        .unwrap_or_else(|| default_level.to_string());
    let json = env("LOG_FORMAT")
        .map(|f| f.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(default_format == "json");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}
