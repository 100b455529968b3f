//! Configuration loading with environment variable support.
//!
//! A run is driven by a JSON configuration file (`refshot.config.json`):
//!
//! ```json
//! {
//!   "screenshots": "./screenshots",
//!   "server": { "dir": "./site", "port": 8080 },
//!   "thresholds": { "width": 0, "height": 0, "misMatchPercentage": 0.5 },
//!   "maxConcurrency": 8,
//!   "pixelTolerance": 2
//! }
//! ```
//!
//! Relative paths resolve against the directory holding the file. When no
//! explicit path is given the file is searched upward from the working
//! directory.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `REFSHOT_CONFIG` | Path to the configuration file | search upward for `refshot.config.json` |
//! | `REFSHOT_CAPTURE_ENGINE` | Capture engine executable | `refshot-capture` |
//! | `REFSHOT_MAX_CONCURRENCY` | Maximum comparisons in flight | `16` |

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compare::Thresholds;

// ============================================================================
// Default Values
// ============================================================================

/// File name searched for when no configuration path is given
pub const CONFIG_FILE_NAME: &str = "refshot.config.json";

/// Default capture engine executable
pub const DEFAULT_CAPTURE_ENGINE: &str = "refshot-capture";

/// Default cap on concurrently running comparisons
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the configuration file path
pub const ENV_CONFIG: &str = "REFSHOT_CONFIG";

/// Environment variable for the capture engine executable
pub const ENV_CAPTURE_ENGINE: &str = "REFSHOT_CAPTURE_ENGINE";

/// Environment variable for the comparison concurrency cap
pub const ENV_MAX_CONCURRENCY: &str = "REFSHOT_MAX_CONCURRENCY";

/// Errors raised while locating or parsing the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no refshot.config.json found from {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Static server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Directory served as the document root
    pub dir: PathBuf,
    /// Port bound on 127.0.0.1
    pub port: u16,
}

/// A loaded configuration. Immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Root of the `new` / `different` / `reference` corpora
    pub screenshots: PathBuf,

    /// Optional static server started around capture
    #[serde(default)]
    pub server: Option<ServerConfig>,

    /// Tolerances applied when classifying an image pair
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Cap on concurrently running comparisons (falls back to the environment)
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Per-channel difference the built-in comparator still counts as equal
    #[serde(default)]
    pub pixel_tolerance: u8,

    /// File this configuration was read from
    #[serde(skip)]
    pub path: PathBuf,
}

impl Config {
    /// Build a configuration in memory, rooted at `screenshots`
    pub fn new(screenshots: impl Into<PathBuf>) -> Self {
        Self {
            screenshots: screenshots.into(),
            server: None,
            thresholds: Thresholds::default(),
            max_concurrency: None,
            pixel_tolerance: 0,
            path: PathBuf::new(),
        }
    }

    pub fn server(mut self, dir: impl Into<PathBuf>, port: u16) -> Self {
        self.server = Some(ServerConfig {
            dir: dir.into(),
            port,
        });
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Read and parse the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let mut config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.screenshots = resolve(base, &config.screenshots);
        if let Some(server) = config.server.as_mut() {
            server.dir = resolve(base, &server.dir);
        }
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Parse configuration JSON without touching the file system
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Locate the configuration file (explicit path, `REFSHOT_CONFIG`, then
    /// upward search from `start`) and load it
    pub fn discover(explicit: Option<&Path>, start: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = env::var(ENV_CONFIG) {
            return Self::load(path);
        }
        let path = find_up(CONFIG_FILE_NAME, start)
            .ok_or_else(|| ConfigError::NotFound(start.to_path_buf()))?;
        Self::load(path)
    }

    /// Effective comparison concurrency cap (never zero)
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrency
            .unwrap_or_else(default_max_concurrency)
            .max(1)
    }
}

/// Search `start` and each of its ancestors for `name`
pub fn find_up(name: &str, start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Capture engine executable (convenience function)
pub fn capture_engine() -> String {
    env::var(ENV_CAPTURE_ENGINE).unwrap_or_else(|_| DEFAULT_CAPTURE_ENGINE.to_string())
}

/// Default comparison concurrency cap (convenience function)
pub fn default_max_concurrency() -> usize {
    env::var(ENV_MAX_CONCURRENCY)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_CONCURRENCY)
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
