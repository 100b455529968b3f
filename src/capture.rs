//! Capture orchestration.
//!
//! Rendering screenshots is delegated to a [`CaptureProvider`]. The default
//! provider, [`EngineCapture`], runs an external capture engine as a
//! subprocess and expects it to populate the `new` corpus. When the
//! configuration names a static server it is started before capture and
//! closed once capture settles, whether it succeeded or not.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{self, Config};
use crate::report::Outcome;
use crate::server::{ServerError, StaticServer};

/// Message returned by a successful capture
pub const CAPTURE_MESSAGE: &str = "Images captured";

/// Errors raised during capture
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to start static server: {0}")]
    Server(#[from] ServerError),

    #[error("failed to launch capture engine {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("capture engine {} failed with {status}", .program.display())]
    EngineFailed { program: PathBuf, status: ExitStatus },

    #[error("capture engine needs a configuration file path; load the configuration from a file")]
    NoConfigPath,

    #[error("capture failed: {0}")]
    Provider(String),
}

/// Trait for capture providers
///
/// A provider renders the pages under test and writes the screenshots into
/// the `new` corpus of the given configuration.
pub trait CaptureProvider: Send + Sync {
    fn capture(&self, config: &Config) -> impl Future<Output = Result<(), CaptureError>> + Send;
}

/// Capture provider shelling out to an external engine.
///
/// The engine is invoked as `<program> [args...] --configPath=<config file>`.
#[derive(Debug, Clone)]
pub struct EngineCapture {
    program: PathBuf,
    args: Vec<String>,
}

impl EngineCapture {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Provider for the engine named by `REFSHOT_CAPTURE_ENGINE` (or the default)
    pub fn from_env() -> Self {
        Self::new(config::capture_engine())
    }

    /// Add an argument placed before `--configPath`
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl CaptureProvider for EngineCapture {
    async fn capture(&self, config: &Config) -> Result<(), CaptureError> {
        if config.path.as_os_str().is_empty() {
            return Err(CaptureError::NoConfigPath);
        }
        let config_arg = format!("--configPath={}", config.path.display());
        debug!(program = %self.program.display(), %config_arg, "launching capture engine");

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&config_arg)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| CaptureError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(CaptureError::EngineFailed {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// Runs a capture provider inside the optional static server lifecycle
pub struct Capturer<P = EngineCapture> {
    config: Config,
    provider: P,
}

impl Capturer<EngineCapture> {
    pub fn new(config: Config) -> Self {
        Self::with_provider(config, EngineCapture::from_env())
    }
}

impl<P: CaptureProvider> Capturer<P> {
    pub fn with_provider(config: Config, provider: P) -> Self {
        Self { config, provider }
    }

    pub async fn capture(&self) -> Result<Outcome, CaptureError> {
        let server = match &self.config.server {
            Some(settings) => Some(StaticServer::start(&settings.dir, settings.port)?),
            None => None,
        };

        let result = self.provider.capture(&self.config).await;

        if let Some(mut server) = server {
            // joining the accept thread blocks
            if let Err(e) = tokio::task::spawn_blocking(move || server.close()).await {
                warn!("failed to stop static server: {}", e);
            }
        }

        result?;
        info!("capture finished");
        Ok(Outcome::new(CAPTURE_MESSAGE))
    }
}
