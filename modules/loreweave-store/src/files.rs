use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;

/// Workspace-scoped file storage on local disk.
///
/// Keys are relative paths `{workspace_id}/{timestamp_millis}-{file_name}`,
/// which makes them effectively unique per call without any locking.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write `bytes` under a fresh key and return the key.
    pub async fn put(&self, workspace_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<String> {
        let key = format!(
            "{}/{}-{}",
            workspace_id,
            Utc::now().timestamp_millis(),
            sanitize_file_name(file_name)
        );
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(key)
    }

    /// Absolute path for a stored key.
    pub fn absolute(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Reduce a file name to a safe single path segment. Anything outside
/// alphanumerics, dot, dash, and underscore becomes an underscore, and
/// leading dots are dropped so keys can't be hidden files or `..`.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_plain_names() {
        assert_eq!(sanitize_file_name("Example.jpg"), "Example.jpg");
    }

    #[test]
    fn test_sanitize_replaces_separators() {
        assert_eq!(sanitize_file_name("a b/c\\d.png"), "a_b_c_d.png");
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_file_name("..."), "file");
    }

    #[tokio::test]
    async fn test_put_writes_bytes_under_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let workspace_id = Uuid::new_v4();

        let key = store
            .put(workspace_id, "Map of Everywhere.png", b"pngbytes")
            .await
            .unwrap();

        assert!(key.starts_with(&format!("{workspace_id}/")));
        assert!(key.ends_with("-Map_of_Everywhere.png"));

        let written = std::fs::read(store.absolute(&key)).unwrap();
        assert_eq!(written, b"pngbytes");
    }

    #[tokio::test]
    async fn test_put_twice_yields_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let workspace_id = Uuid::new_v4();

        let first = store.put(workspace_id, "x.ogg", b"a").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.put(workspace_id, "x.ogg", b"b").await.unwrap();

        assert_ne!(first, second);
    }
}
