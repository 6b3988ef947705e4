//! `KEY=VALUE` env files: the local `.env` and the file rendered from the
//! secret template.

use crate::error::{McpError, Result};
use std::path::Path;

/// Parse KEY=VALUE env content. Comments and blank lines are skipped, an
/// optional `export ` prefix is dropped and matching outer quotes are removed.
pub fn parse_env(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .filter_map(|l| {
            let l = l.strip_prefix("export ").unwrap_or(l);
            let (k, v) = l.split_once('=')?;
            let key = k.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(v.trim()).to_string()))
        })
        .collect()
}

fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

/// Read an env file from disk.
pub fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.exists() {
        return Err(McpError::EnvFileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_env(&content))
}

/// Export the pairs of an env file into the process environment.
///
/// Variables already present in the environment win. Returns the number of
/// variables that were set.
pub fn load_into_process(path: &Path) -> Result<usize> {
    let mut applied = 0;
    for (key, value) in read_env_file(path)? {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            applied += 1;
        }
    }
    Ok(applied)
}
