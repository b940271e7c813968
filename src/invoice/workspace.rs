//! Per-request temporary workspace.
//!
//! A `Workspace` owns one directory holding the downloaded template, the
//! filled document, the PDF and LibreOffice's private profile. Dropping it
//! deletes the directory exactly once. Deletion errors are logged, never
//! returned.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "invoice-";

pub const TEMPLATE_FILE: &str = "template.docx";
pub const RENDERED_FILE: &str = "output.docx";
/// LibreOffice user profile, private to the workspace so parallel conversions don't share a lock.
pub const PROFILE_DIR: &str = "lo-profile";

#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        log::debug!("Created workspace {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn template_path(&self) -> PathBuf {
        self.path.join(TEMPLATE_FILE)
    }

    pub fn rendered_path(&self) -> PathBuf {
        self.path.join(RENDERED_FILE)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_workspace(dir));
            }
            Err(_) => remove_workspace(dir),
        }
    }
}

fn remove_workspace(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => log::debug!("Removed workspace {}", path.display()),
        Err(e) => log::warn!("Failed to remove workspace {}: {}", path.display(), e),
    }
}
