use crate::error::Result;
use std::io::Write;
use std::path::Path;

/// Replace `path` with `data` in one rename. Readers see the old file or the
/// new one, never a partial write; missing parent directories are created.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".mattermost-mcp-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    staged.write_all(data)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_into_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data/monitor/state.json");
        atomic_write(&path, br#"{"processed_posts":{}}"#).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"processed_posts":{}}"#
        );
    }

    #[test]
    fn overwrite_leaves_no_staging_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        atomic_write(&path, b"HTTP_PORT=8000\n").unwrap();
        atomic_write(&path, b"HTTP_PORT=9000\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "HTTP_PORT=9000\n");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(".env")]);
    }
}
