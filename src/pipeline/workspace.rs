//! Per-document working directories.
//!
//! A [`Workspace`] owns every intermediate file of one document. It is named
//! `<unix-seconds>_<base>_<random>` under the configured work root: the
//! timestamp and base name make directories recognisable when debugging, the
//! random suffix keeps two same-second uploads of the same file apart.
//!
//! The directory is removed exactly once: by [`Workspace::close`] or, on any
//! early return or panic, when the value is dropped. Because `close` consumes
//! the workspace, nothing can read from it afterwards.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Uniquely named temporary directory for one document.
#[derive(Debug)]
pub struct Workspace {
    id: String,
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `root` for a document with `base_name`.
    pub fn create(root: &Path, base_name: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let prefix = format!("{}_{}_", ts, sanitize(base_name));

        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .rand_bytes(8)
            .tempdir_in(root)?;

        let id = dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(prefix);

        debug!("Created workspace {}", dir.path().display());
        Ok(Self { id, dir })
    }

    /// Directory name, unique among live workspaces.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Recursively delete the workspace.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed workspace {}", path.display()),
            Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
        }
    }
}

/// Keep names filesystem-safe and short enough for any platform.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_instant_same_name_do_not_collide() {
        let root = tempfile::tempdir().expect("tempdir");
        let a = Workspace::create(root.path(), "invoice").expect("create a");
        let b = Workspace::create(root.path(), "invoice").expect("create b");

        assert_ne!(a.id(), b.id());
        assert_ne!(a.path(), b.path());
        assert!(a.id().contains("_invoice_"), "got: {}", a.id());
    }

    #[test]
    fn close_removes_directory_and_contents() {
        let root = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::create(root.path(), "scan").expect("create");
        std::fs::write(ws.file("page-0001.png"), b"x").expect("write");
        let path = ws.path().to_path_buf();

        ws.close();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = {
            let ws = Workspace::create(root.path(), "scan").expect("create");
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn creates_missing_root() {
        let root = tempfile::tempdir().expect("tempdir");
        let nested = root.path().join("a/b");
        let ws = Workspace::create(&nested, "x").expect("create");
        assert!(ws.path().starts_with(&nested));
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize("my scan (1)"), "my_scan__1_");
        assert_eq!(sanitize(""), "document");
        assert_eq!(sanitize(&"a".repeat(100)).len(), 64);
    }
}
