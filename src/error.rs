use crate::capture::CaptureError;
use crate::compare::CompareError;
use crate::config::ConfigError;
use crate::corpus::CorpusError;

/// Result type for refshot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure of a refshot operation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Compare(#[from] CompareError),
}

impl Error {
    /// False when the failure comes from the images themselves rather than a fault
    pub fn show_stack(&self) -> bool {
        match self {
            Error::Compare(e) => e.show_stack(),
            _ => true,
        }
    }
}
