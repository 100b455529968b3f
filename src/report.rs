//! Types for operation and comparison results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Status message returned by every successful operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub message: String,
}

impl Outcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Terminal state of a single reference/new pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    /// Within all thresholds
    Matching,
    /// Flagged by classification; a diff artifact was written
    Different,
    /// The pair could not be compared (missing file, undecodable image, ...)
    Error,
}

/// Result of comparing one reference image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    /// Reference image path
    pub reference: PathBuf,

    /// New image the reference was compared with
    pub new: PathBuf,

    /// Diff artifact, only for `Different` pairs
    pub diff: Option<PathBuf>,

    pub status: PairStatus,

    /// Mismatch percentage reported by the comparator, if it ran
    pub mis_match_percentage: Option<f64>,

    /// Classification messages or the error description
    pub messages: Vec<String>,
}

/// Result of a complete comparison batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub started_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub finished_at: DateTime<Utc>,

    /// One entry per reference image, in listing order
    pub pairs: Vec<PairReport>,
}

impl BatchReport {
    /// True when every pair matched
    pub fn success(&self) -> bool {
        self.pairs.iter().all(|p| p.status == PairStatus::Matching)
    }

    pub fn count(&self, status: PairStatus) -> usize {
        self.pairs.iter().filter(|p| p.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(status: PairStatus) -> PairReport {
        PairReport {
            reference: PathBuf::from("reference/a.png"),
            new: PathBuf::from("new/a.png"),
            diff: None,
            status,
            mis_match_percentage: None,
            messages: Vec::new(),
        }
    }

    #[test]
    fn test_success_requires_all_matching() {
        let now = Utc::now();
        let mut report = BatchReport {
            started_at: now,
            finished_at: now,
            pairs: vec![pair(PairStatus::Matching), pair(PairStatus::Matching)],
        };
        assert!(report.success());

        report.pairs.push(pair(PairStatus::Error));
        assert!(!report.success());
        assert_eq!(report.count(PairStatus::Matching), 2);
        assert_eq!(report.count(PairStatus::Error), 1);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_value(pair(PairStatus::Different)).unwrap();
        assert_eq!(json["status"], "different");
    }
}
