//! Corpus directory layout under the configured screenshots root.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// One of the three corpora kept under the screenshots root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Corpus {
    /// Most recent capture run, awaiting comparison
    New,
    /// Generated diff artifacts for pairs that failed classification
    Different,
    /// Accepted baseline
    Reference,
}

impl Corpus {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Corpus::New => "new",
            Corpus::Different => "different",
            Corpus::Reference => "reference",
        }
    }
}

/// Resolved `new`, `different` and `reference` directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusPaths {
    pub new: PathBuf,
    pub different: PathBuf,
    pub reference: PathBuf,
}

impl CorpusPaths {
    /// Derive the corpus directories from a screenshots root
    pub fn new(screenshots: impl AsRef<Path>) -> Self {
        let root = screenshots.as_ref();
        Self {
            new: root.join(Corpus::New.dir_name()),
            different: root.join(Corpus::Different.dir_name()),
            reference: root.join(Corpus::Reference.dir_name()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.screenshots)
    }

    pub fn dir(&self, corpus: Corpus) -> &Path {
        match corpus {
            Corpus::New => &self.new,
            Corpus::Different => &self.different,
            Corpus::Reference => &self.reference,
        }
    }

    /// Map a file under `reference` to the same relative path in `corpus`.
    ///
    /// Returns `None` when `reference_file` does not live under the
    /// reference directory.
    pub fn counterpart(&self, reference_file: &Path, corpus: Corpus) -> Option<PathBuf> {
        let relative = reference_file.strip_prefix(&self.reference).ok()?;
        Some(self.dir(corpus).join(relative))
    }
}
