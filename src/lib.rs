//! Refshot - visual regression testing against an accepted reference set.
//!
//! This crate provides:
//! - Capture orchestration around an external capture engine, with an
//!   optional static server for the pages under test
//! - Batch comparison of new screenshots against references with
//!   configurable dimension and mismatch thresholds
//! - Accept (promote new screenshots to references) and clean operations
//!
//! Screenshots live in three corpora under the configured root:
//! `new`, `different` (generated diff overlays) and `reference`.
//!
//! # Example
//!
//! ```rust,no_run
//! use refshot::{Config, ComparisonEngine};
//!
//! # async fn run() -> refshot::Result<()> {
//! let config = Config::load("refshot.config.json")?;
//! let outcome = ComparisonEngine::new(&config).compare().await?;
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod compare;
pub mod config;
pub mod corpus;
pub mod error;
pub mod paths;
pub mod report;
pub mod server;

pub use capture::{CaptureError, CaptureProvider, Capturer, EngineCapture};
pub use compare::{
    BatchOutcome, CompareError, ComparisonEngine, ComparisonResult, DimensionPolicy,
    ImageComparator, PairError, PixelComparator, Thresholds, classify,
};
pub use config::{Config, ConfigError, ServerConfig};
pub use corpus::{CorpusError, CorpusManager};
pub use error::{Error, Result};
pub use paths::{Corpus, CorpusPaths};
pub use report::{BatchReport, Outcome, PairReport, PairStatus};
pub use server::{ServerError, StaticServer};

/// Capture screenshots with the engine from the environment
pub async fn capture(config: &Config) -> Result<Outcome> {
    Ok(Capturer::new(config.clone()).capture().await?)
}

/// Promote the `new` corpus to `reference`
pub async fn accept(config: &Config) -> Result<Outcome> {
    Ok(CorpusManager::new(config).accept().await?)
}

/// Compare `new` against `reference` with the built-in pixel comparator
pub async fn compare(config: &Config) -> Result<Outcome> {
    Ok(ComparisonEngine::new(config).compare().await?)
}

/// Remove the `new` and `different` corpora
pub async fn clean(config: &Config) -> Result<Outcome> {
    Ok(CorpusManager::new(config).clean().await)
}
