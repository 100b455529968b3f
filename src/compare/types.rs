// Core types for image pair comparison

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix of the data URL carrying a comparator's diff overlay
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Signed size delta between the new and the reference image (new minus reference)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDifference {
    pub width: i64,
    pub height: i64,
}

/// Output of an [`ImageComparator`](super::ImageComparator) for one image pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// Whether both images have identical width and height
    pub is_same_dimensions: bool,

    pub dimension_difference: DimensionDifference,

    /// Share of mismatched pixels, 0.0 to 100.0
    pub mis_match_percentage: f64,

    /// Diff overlay as a `data:image/png;base64,` URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_image_url: Option<String>,
}

impl ComparisonResult {
    /// Decode the diff overlay into PNG bytes.
    ///
    /// A URL without the PNG data prefix is treated as a bare base64 payload.
    pub fn diff_image_png(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
        let Some(url) = &self.diff_image_url else {
            return Ok(None);
        };
        let payload = url.strip_prefix(PNG_DATA_URL_PREFIX).unwrap_or(url);
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map(Some)
    }
}

/// Errors reported by an image comparator
#[derive(Debug, thiserror::Error)]
pub enum ComparatorError {
    #[error("failed to decode {which} image: {message}")]
    Decode { which: &'static str, message: String },

    #[error("failed to encode diff image: {0}")]
    Encode(String),

    #[error("diff image payload is not valid base64: {0}")]
    DiffPayload(#[from] base64::DecodeError),
}

/// Why a single reference/new pair did not match
#[derive(Debug, thiserror::Error)]
pub enum PairError {
    /// Classification flagged the pair; an expected outcome, not a fault
    #[error("{}", .messages.join("\n"))]
    DiffExceeded {
        messages: Vec<String>,
        diff: PathBuf,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Comparator(#[from] ComparatorError),

    #[error("comparison task failed: {0}")]
    Task(String),
}

impl PairError {
    /// Whether a stack trace would help the user; false for data-driven failures
    pub fn show_stack(&self) -> bool {
        !matches!(self, PairError::DiffExceeded { .. })
    }
}

/// A failed pair together with the reference file it was derived from
#[derive(Debug)]
pub struct PairFailure {
    pub reference: PathBuf,
    pub error: PairError,
}

/// Errors for a whole comparison batch
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    /// Nothing to compare against; run accept first
    #[error("no reference images found in {}", .0.display())]
    NoReferences(PathBuf),

    #[error("failed to list {}: {source}", .path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// One or more pairs failed; every failure is collected
    #[error("{}", batch_message(.0))]
    Batch(Vec<PairFailure>),
}

impl CompareError {
    pub fn show_stack(&self) -> bool {
        match self {
            CompareError::Batch(failures) => failures.iter().any(|f| f.error.show_stack()),
            _ => true,
        }
    }
}

fn batch_message(failures: &[PairFailure]) -> String {
    failures
        .iter()
        .map(|f| f.error.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result_with_url(url: Option<&str>) -> ComparisonResult {
        ComparisonResult {
            is_same_dimensions: true,
            dimension_difference: DimensionDifference::default(),
            mis_match_percentage: 0.0,
            diff_image_url: url.map(str::to_string),
        }
    }

    #[test]
    fn test_diff_image_png_strips_prefix() {
        let result = result_with_url(Some("data:image/png;base64,aGVsbG8="));
        assert_eq!(result.diff_image_png().unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_diff_image_png_accepts_bare_payload() {
        let result = result_with_url(Some("aGVsbG8="));
        assert_eq!(result.diff_image_png().unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_diff_image_png_absent() {
        assert_eq!(result_with_url(None).diff_image_png().unwrap(), None);
    }

    #[test]
    fn test_result_uses_comparator_field_names() {
        let json = serde_json::to_value(result_with_url(None)).unwrap();
        assert!(json.get("isSameDimensions").is_some());
        assert!(json.get("misMatchPercentage").is_some());
        assert_eq!(json["dimensionDifference"]["width"], 0);
    }

    #[test]
    fn test_diff_exceeded_joins_messages_without_stack() {
        let err = PairError::DiffExceeded {
            messages: vec!["first".to_string(), "second".to_string()],
            diff: PathBuf::from("d.png"),
        };
        assert_eq!(err.to_string(), "first\nsecond");
        assert!(!err.show_stack());
    }

    #[test]
    fn test_batch_message_lists_every_failure() {
        let err = CompareError::Batch(vec![
            PairFailure {
                reference: PathBuf::from("a.png"),
                error: PairError::DiffExceeded {
                    messages: vec!["a changed".to_string()],
                    diff: PathBuf::from("da.png"),
                },
            },
            PairFailure {
                reference: PathBuf::from("b.png"),
                error: PairError::Task("panicked".to_string()),
            },
        ]);
        assert_eq!(err.to_string(), "a changed\ncomparison task failed: panicked");
        assert!(err.show_stack());
    }
}
