//! Batch comparison of the `new` corpus against the `reference` corpus.
//!
//! Every reference image becomes one task. Tasks run concurrently, gated by a
//! semaphore, and each one goes through the same steps: read both images,
//! run the comparator, classify, write the diff overlay when flagged.
//! All pair failures are collected; the batch succeeds only if none failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::comparator::{ImageComparator, PixelComparator};
use super::policy::{Thresholds, classify};
use super::types::{CompareError, ComparisonResult, PairError, PairFailure};
use crate::config::Config;
use crate::paths::{Corpus, CorpusPaths};
use crate::report::{BatchReport, Outcome, PairReport, PairStatus};

/// Message returned when every pair matches
pub const MATCH_MESSAGE: &str = "New images match reference shots";

/// Everything a finished batch produced
#[derive(Debug)]
pub struct BatchOutcome {
    pub report: BatchReport,
    /// Failed pairs in reference listing order
    pub failures: Vec<PairFailure>,
}

/// Drives an [`ImageComparator`] over the reference corpus
pub struct ComparisonEngine {
    paths: CorpusPaths,
    thresholds: Thresholds,
    comparator: Arc<dyn ImageComparator>,
    max_concurrency: usize,
}

impl ComparisonEngine {
    /// Engine using the built-in [`PixelComparator`]
    pub fn new(config: &Config) -> Self {
        let comparator = PixelComparator::new().tolerance(config.pixel_tolerance);
        Self::with_comparator(config, Arc::new(comparator))
    }

    pub fn with_comparator(config: &Config, comparator: Arc<dyn ImageComparator>) -> Self {
        Self {
            paths: CorpusPaths::from_config(config),
            thresholds: config.thresholds,
            comparator,
            max_concurrency: config.concurrency_limit(),
        }
    }

    pub fn paths(&self) -> &CorpusPaths {
        &self.paths
    }

    /// Recursively list reference images, sorted, skipping hidden entries.
    ///
    /// A missing reference directory lists as empty.
    pub fn list_references(&self) -> Result<Vec<PathBuf>, CompareError> {
        let root = &self.paths.reference;
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));
        for entry in walker {
            let entry = entry.map_err(|source| CompareError::Listing {
                path: root.clone(),
                source,
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Compare every reference image and report each pair.
    ///
    /// Fails with [`CompareError::NoReferences`] before invoking the
    /// comparator when the reference corpus is empty.
    pub async fn run(&self) -> Result<BatchOutcome, CompareError> {
        let started_at = chrono::Utc::now();
        let jobs: Vec<PairJob> = self
            .list_references()?
            .into_iter()
            .filter_map(|reference| PairJob::new(&self.paths, reference))
            .collect();

        if jobs.is_empty() {
            return Err(CompareError::NoReferences(self.paths.reference.clone()));
        }

        info!(
            pairs = jobs.len(),
            max_concurrency = self.max_concurrency,
            "comparing new images against references"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let handles: Vec<_> = jobs
            .iter()
            .cloned()
            .map(|job| {
                let semaphore = Arc::clone(&semaphore);
                let comparator = Arc::clone(&self.comparator);
                let thresholds = self.thresholds;
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    compare_pair(&job, &thresholds, comparator).await
                })
            })
            .collect();

        let mut pairs = Vec::with_capacity(jobs.len());
        let mut failures = Vec::new();
        for (job, handle) in jobs.into_iter().zip(handles) {
            let run = handle.await.unwrap_or_else(|e| PairRun {
                mis_match_percentage: None,
                diff_written: false,
                result: Err(PairError::Task(e.to_string())),
            });

            let (status, messages) = match &run.result {
                Ok(()) => (PairStatus::Matching, Vec::new()),
                Err(PairError::DiffExceeded { messages, .. }) => {
                    (PairStatus::Different, messages.clone())
                }
                Err(e) => (PairStatus::Error, vec![e.to_string()]),
            };
            pairs.push(PairReport {
                reference: job.reference.clone(),
                new: job.new,
                diff: run.diff_written.then_some(job.diff),
                status,
                mis_match_percentage: run.mis_match_percentage,
                messages,
            });
            if let Err(error) = run.result {
                failures.push(PairFailure {
                    reference: job.reference,
                    error,
                });
            }
        }

        let report = BatchReport {
            started_at,
            finished_at: chrono::Utc::now(),
            pairs,
        };
        info!(
            matching = report.count(PairStatus::Matching),
            different = report.count(PairStatus::Different),
            errors = report.count(PairStatus::Error),
            "comparison finished"
        );
        Ok(BatchOutcome { report, failures })
    }

    /// Resolve with a success message only if every pair matches
    pub async fn compare(&self) -> Result<Outcome, CompareError> {
        let outcome = self.run().await?;
        if outcome.failures.is_empty() {
            Ok(Outcome::new(MATCH_MESSAGE))
        } else {
            Err(CompareError::Batch(outcome.failures))
        }
    }
}

/// Paths involved in one comparison
#[derive(Debug, Clone)]
struct PairJob {
    reference: PathBuf,
    new: PathBuf,
    diff: PathBuf,
}

impl PairJob {
    fn new(paths: &CorpusPaths, reference: PathBuf) -> Option<Self> {
        Some(Self {
            new: paths.counterpart(&reference, Corpus::New)?,
            diff: paths.counterpart(&reference, Corpus::Different)?,
            reference,
        })
    }
}

struct PairRun {
    mis_match_percentage: Option<f64>,
    diff_written: bool,
    result: Result<(), PairError>,
}

async fn compare_pair(
    job: &PairJob,
    thresholds: &Thresholds,
    comparator: Arc<dyn ImageComparator>,
) -> PairRun {
    let result = match evaluate(job, comparator).await {
        Ok(result) => result,
        Err(e) => {
            warn!(reference = %job.reference.display(), "comparison failed: {}", e);
            return PairRun {
                mis_match_percentage: None,
                diff_written: false,
                result: Err(e),
            };
        }
    };

    let mis_match_percentage = Some(result.mis_match_percentage);
    let messages = classify(&result, thresholds, &job.diff);
    if messages.is_empty() {
        debug!(reference = %job.reference.display(), "images match");
        return PairRun {
            mis_match_percentage,
            diff_written: false,
            result: Ok(()),
        };
    }

    warn!(
        reference = %job.reference.display(),
        mis_match = result.mis_match_percentage,
        "images differ"
    );
    let diff_written = match save_difference(&job.diff, &result).await {
        Ok(written) => written,
        Err(e) => {
            return PairRun {
                mis_match_percentage,
                diff_written: false,
                result: Err(e),
            };
        }
    };

    PairRun {
        mis_match_percentage,
        diff_written,
        result: Err(PairError::DiffExceeded {
            messages,
            diff: job.diff.clone(),
        }),
    }
}

/// Read both images and run the comparator off the async workers
async fn evaluate(
    job: &PairJob,
    comparator: Arc<dyn ImageComparator>,
) -> Result<ComparisonResult, PairError> {
    let reference = read(&job.reference).await?;
    let new = read(&job.new).await?;

    tokio::task::spawn_blocking(move || comparator.compare(&new, &reference))
        .await
        .map_err(|e| PairError::Task(e.to_string()))?
        .map_err(PairError::from)
}

/// Write the comparator's diff overlay to `diff`, creating parents.
/// Returns whether anything was written.
async fn save_difference(diff: &Path, result: &ComparisonResult) -> Result<bool, PairError> {
    let Some(png) = result
        .diff_image_png()
        .map_err(|e| PairError::Comparator(e.into()))?
    else {
        warn!(diff = %diff.display(), "comparator returned no diff image");
        return Ok(false);
    };

    if let Some(parent) = diff.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PairError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(diff, png)
        .await
        .map_err(|source| PairError::Io {
            path: diff.to_path_buf(),
            source,
        })?;
    debug!(diff = %diff.display(), "diff image written");
    Ok(true)
}

async fn read(path: &Path) -> Result<Vec<u8>, PairError> {
    tokio::fs::read(path).await.map_err(|source| PairError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
