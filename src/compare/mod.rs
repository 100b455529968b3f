pub mod comparator;
pub mod engine;
pub mod policy;
pub mod types;

pub use comparator::{ImageComparator, PixelComparator};
pub use engine::{BatchOutcome, ComparisonEngine, MATCH_MESSAGE};
pub use policy::{DimensionPolicy, Thresholds, classify};
pub use types::{
    CompareError, ComparatorError, ComparisonResult, DimensionDifference, PairError, PairFailure,
};
