//! Threshold policy deciding whether an image pair is "matching" or "different".

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use super::types::ComparisonResult;

/// How a dimension delta is checked against its configured threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DimensionPolicy {
    /// Only a delta exactly equal to the threshold is excused on that axis,
    /// and a size change always flags the pair. Smaller deltas are reported.
    #[default]
    ExactThreshold,

    /// Deltas whose magnitude is at most the threshold are tolerated; the
    /// pair is flagged only when an axis exceeds it.
    WithinThreshold,
}

impl DimensionPolicy {
    fn excuses(&self, delta: i64, threshold: i64) -> bool {
        match self {
            DimensionPolicy::ExactThreshold => delta == threshold,
            DimensionPolicy::WithinThreshold => delta.abs() <= threshold.abs(),
        }
    }
}

/// Maximum tolerated deviation before a pair is flagged. Zero tolerance by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Thresholds {
    /// Width delta in pixels
    #[serde(deserialize_with = "whole_pixels")]
    pub width: i64,
    /// Height delta in pixels
    #[serde(deserialize_with = "whole_pixels")]
    pub height: i64,
    /// Mismatch percentage; the pair is flagged when strictly greater
    pub mis_match_percentage: f64,
    pub dimension_policy: DimensionPolicy,
}

impl Thresholds {
    pub fn new(width: i64, height: i64, mis_match_percentage: f64) -> Self {
        Self {
            width,
            height,
            mis_match_percentage,
            dimension_policy: DimensionPolicy::default(),
        }
    }

    pub fn dimension_policy(mut self, policy: DimensionPolicy) -> Self {
        self.dimension_policy = policy;
        self
    }
}

/// Accept any JSON number for a pixel threshold as long as it is whole (`2` or `2.0`)
fn whole_pixels<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return Err(D::Error::custom(format!(
            "pixel threshold must be a whole number, got {}",
            value
        )));
    }
    Ok(value as i64)
}

/// Classify a comparator result, returning human readable problems.
///
/// An empty list means the pair matches. `diff_path` is where the diff
/// overlay for this pair is written and is included in the messages.
pub fn classify(result: &ComparisonResult, thresholds: &Thresholds, diff_path: &Path) -> Vec<String> {
    let mut errors = Vec::new();
    let policy = thresholds.dimension_policy;

    if !result.is_same_dimensions {
        let delta = result.dimension_difference;
        let mut flagged = false;
        if !policy.excuses(delta.width, thresholds.width) {
            errors.push(format!(
                "the new image is wider/smaller: {}px different",
                delta.width
            ));
            flagged = true;
        }
        if !policy.excuses(delta.height, thresholds.height) {
            errors.push(format!(
                "the new image is taller/smaller: {}px different",
                delta.height
            ));
            flagged = true;
        }
        if flagged || policy == DimensionPolicy::ExactThreshold {
            errors.push(diff_path.display().to_string());
        }
    }

    if result.mis_match_percentage > thresholds.mis_match_percentage {
        errors.push(format!(
            "The new image content has changed: {}% different",
            result.mis_match_percentage
        ));
        errors.push(diff_path.display().to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::types::DimensionDifference;
    use pretty_assertions::assert_eq;

    fn result(width: i64, height: i64, mis_match: f64) -> ComparisonResult {
        ComparisonResult {
            is_same_dimensions: width == 0 && height == 0,
            dimension_difference: DimensionDifference { width, height },
            mis_match_percentage: mis_match,
            diff_image_url: None,
        }
    }

    fn diff() -> &'static Path {
        Path::new("shots/different/home.png")
    }

    #[test]
    fn test_identical_pair_matches() {
        assert!(classify(&result(0, 0, 0.0), &Thresholds::default(), diff()).is_empty());
    }

    #[test]
    fn test_mismatch_is_strictly_greater() {
        let thresholds = Thresholds::new(0, 0, 2.0);
        assert!(classify(&result(0, 0, 2.0), &thresholds, diff()).is_empty());

        let errors = classify(&result(0, 0, 2.01), &thresholds, diff());
        assert_eq!(
            errors,
            vec![
                "The new image content has changed: 2.01% different".to_string(),
                "shots/different/home.png".to_string(),
            ]
        );
    }

    #[test]
    fn test_width_delta_exact_threshold_edges() {
        let thresholds = Thresholds::new(5, 0, 100.0);
        let width_message = |d: i64| format!("the new image is wider/smaller: {}px different", d);

        for delta in [4, 6] {
            let errors = classify(&result(delta, 0, 0.0), &thresholds, diff());
            assert!(errors.contains(&width_message(delta)), "delta {} should flag width", delta);
        }

        // exactly the threshold: no width message, pair still flagged by the size change
        let errors = classify(&result(5, 0, 0.0), &thresholds, diff());
        assert_eq!(errors, vec!["shots/different/home.png".to_string()]);

        // zero delta on width while height changed is excused only if the threshold is zero
        let errors = classify(&result(0, 1, 0.0), &thresholds, diff());
        assert!(errors.contains(&width_message(0)));
    }

    #[test]
    fn test_height_delta_reports_both_axes() {
        let errors = classify(&result(-3, 7, 0.0), &Thresholds::default(), diff());
        assert_eq!(
            errors,
            vec![
                "the new image is wider/smaller: -3px different".to_string(),
                "the new image is taller/smaller: 7px different".to_string(),
                "shots/different/home.png".to_string(),
            ]
        );
    }

    #[test]
    fn test_size_and_content_change_both_reported() {
        let errors = classify(&result(0, 2, 12.5), &Thresholds::default(), diff());
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[1], "shots/different/home.png");
        assert_eq!(errors[2], "The new image content has changed: 12.5% different");
    }

    #[test]
    fn test_within_threshold_policy_tolerates_small_deltas() {
        let thresholds = Thresholds::new(5, 5, 0.0).dimension_policy(DimensionPolicy::WithinThreshold);
        assert!(classify(&result(-4, 5, 0.0), &thresholds, diff()).is_empty());

        let errors = classify(&result(6, 0, 0.0), &thresholds, diff());
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_empty_iff_same_dimensions_and_within_mismatch() {
        let thresholds = Thresholds::new(1, 1, 3.0);
        let cases = [
            (0, 0, 0.0, true),
            (0, 0, 3.0, true),
            (0, 0, 3.5, false),
            (1, 1, 0.0, false),
            (2, 0, 1.0, false),
        ];
        for (w, h, m, matching) in cases {
            let r = result(w, h, m);
            assert_eq!(
                classify(&r, &thresholds, diff()).is_empty(),
                matching,
                "case {}x{} {}%",
                w,
                h,
                m
            );
        }
    }

    #[test]
    fn test_thresholds_deserialize_with_defaults() {
        let t: Thresholds = serde_json::from_str(r#"{ "misMatchPercentage": 1.5 }"#).unwrap();
        assert_eq!(t, Thresholds::new(0, 0, 1.5));

        let t: Thresholds =
            serde_json::from_str(r#"{ "width": 2, "dimensionPolicy": "withinThreshold" }"#).unwrap();
        assert_eq!(t.dimension_policy, DimensionPolicy::WithinThreshold);

        let t: Thresholds =
            serde_json::from_str(r#"{ "width": 2.0, "height": -3, "misMatchPercentage": 1 }"#)
                .unwrap();
        assert_eq!(t, Thresholds::new(2, -3, 1.0));

        let err = serde_json::from_str::<Thresholds>(r#"{ "width": 2.5 }"#).unwrap_err();
        assert!(err.to_string().contains("whole number"), "{}", err);
    }
}
