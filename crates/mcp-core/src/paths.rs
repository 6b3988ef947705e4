use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File constants
// ---------------------------------------------------------------------------

pub const DESCRIPTOR_FILE: &str = "deploy/mattermost-mcp.yaml";
pub const SECRETS_FILE: &str = "deploy/secrets.yaml";
pub const ENV_FILE: &str = ".env";
pub const DOCKERFILE: &str = "Dockerfile";

/// Secret store path the descriptor's template reads from.
pub const SECRET_PATH: &str = "secret/data/mattermost-mcp";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn descriptor_path(root: &Path) -> PathBuf {
    root.join(DESCRIPTOR_FILE)
}

pub fn env_file_path(root: &Path) -> PathBuf {
    root.join(ENV_FILE)
}

pub fn secrets_path(root: &Path) -> PathBuf {
    root.join(SECRETS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted() {
        let root = Path::new("/srv/app");
        assert_eq!(
            descriptor_path(root),
            PathBuf::from("/srv/app/deploy/mattermost-mcp.yaml")
        );
        assert_eq!(env_file_path(root), PathBuf::from("/srv/app/.env"));
        assert_eq!(secrets_path(root), PathBuf::from("/srv/app/deploy/secrets.yaml"));
    }
}
