//! Corpus management: promoting new captures to references and cleaning up.
//!
//! - `accept` copies every file under `new` into `reference`, keeping
//!   relative paths and overwriting existing files
//! - `clean` removes `new` and `different`, treating missing directories as done

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::paths::CorpusPaths;
use crate::report::Outcome;

/// Message returned by a successful accept
pub const ACCEPT_MESSAGE: &str = "Images accepted as reference shots";

/// Message returned by clean
pub const CLEAN_MESSAGE: &str = "New and different images removed";

/// Errors raised while accepting new captures
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("nothing to accept: {} does not exist", .0.display())]
    MissingSource(PathBuf),

    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("accept task failed: {0}")]
    Task(String),
}

/// Owns the file operations on the `new`, `different` and `reference` corpora
#[derive(Debug, Clone)]
pub struct CorpusManager {
    paths: CorpusPaths,
}

impl CorpusManager {
    pub fn new(config: &Config) -> Self {
        Self {
            paths: CorpusPaths::from_config(config),
        }
    }

    pub fn paths(&self) -> &CorpusPaths {
        &self.paths
    }

    /// Copy the `new` corpus over the `reference` corpus
    pub async fn accept(&self) -> Result<Outcome, CorpusError> {
        let from = self.paths.new.clone();
        let to = self.paths.reference.clone();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .map_err(|e| CorpusError::Task(e.to_string()))??;

        info!(files = copied, "accepted new images as references");
        Ok(Outcome::new(ACCEPT_MESSAGE))
    }

    /// Delete the `new` and `different` corpora. Always succeeds.
    pub async fn clean(&self) -> Outcome {
        for dir in [&self.paths.new, &self.paths.different] {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => debug!(dir = %dir.display(), "removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(dir = %dir.display(), "failed to remove: {}", e),
            }
        }
        info!("cleaned new and different images");
        Outcome::new(CLEAN_MESSAGE)
    }
}

/// Recursively copy files from `from` into `to`, returning the number copied
fn copy_tree(from: &Path, to: &Path) -> Result<usize, CorpusError> {
    if !from.is_dir() {
        return Err(CorpusError::MissingSource(from.to_path_buf()));
    }

    let mut copied = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|source| CorpusError::Walk {
            path: from.to_path_buf(),
            source,
        })?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        let copy_err = |source: io::Error| CorpusError::Copy {
            from: entry.path().to_path_buf(),
            to: target.clone(),
            source,
        };

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(copy_err)?;
        } else {
            fs::copy(entry.path(), &target).map_err(copy_err)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manager() -> (tempfile::TempDir, CorpusManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = CorpusManager::new(&Config::new(dir.path()));
        (dir, manager)
    }

    #[tokio::test]
    async fn test_accept_copies_tree_and_overwrites() {
        let (_dir, manager) = manager();
        let paths = manager.paths().clone();
        fs::create_dir_all(paths.new.join("pages")).unwrap();
        fs::write(paths.new.join("home.png"), "new-home").unwrap();
        fs::write(paths.new.join("pages/about.png"), "new-about").unwrap();
        fs::create_dir_all(&paths.reference).unwrap();
        fs::write(paths.reference.join("home.png"), "old-home").unwrap();
        fs::write(paths.reference.join("kept.png"), "kept").unwrap();

        let outcome = manager.accept().await.unwrap();
        assert_eq!(outcome.message, ACCEPT_MESSAGE);
        assert_eq!(fs::read_to_string(paths.reference.join("home.png")).unwrap(), "new-home");
        assert_eq!(
            fs::read_to_string(paths.reference.join("pages/about.png")).unwrap(),
            "new-about"
        );
        assert_eq!(fs::read_to_string(paths.reference.join("kept.png")).unwrap(), "kept");

        // accepting again is a re-copy
        manager.accept().await.unwrap();
        assert_eq!(fs::read_to_string(paths.reference.join("home.png")).unwrap(), "new-home");
    }

    #[tokio::test]
    async fn test_accept_without_new_fails() {
        let (_dir, manager) = manager();
        let err = manager.accept().await.unwrap_err();
        assert!(matches!(err, CorpusError::MissingSource(_)));
    }

    #[tokio::test]
    async fn test_clean_removes_new_and_different_only() {
        let (_dir, manager) = manager();
        let paths = manager.paths().clone();
        for dir in [&paths.new, &paths.different, &paths.reference] {
            fs::create_dir_all(dir).unwrap();
            fs::write(dir.join("a.png"), "x").unwrap();
        }

        let outcome = manager.clean().await;
        assert_eq!(outcome.message, CLEAN_MESSAGE);
        assert!(!paths.new.exists());
        assert!(!paths.different.exists());
        assert!(paths.reference.join("a.png").exists());
    }

    #[tokio::test]
    async fn test_clean_is_idempotent() {
        let (_dir, manager) = manager();
        assert_eq!(manager.clean().await.message, CLEAN_MESSAGE);
        assert_eq!(manager.clean().await.message, CLEAN_MESSAGE);
    }
}
