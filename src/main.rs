use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use refshot::compare::CompareError;
use refshot::config::{self, Config, ConfigError};
use refshot::{Capturer, ComparisonEngine, CorpusManager, EngineCapture, Error, Outcome};

/// Refshot - visual regression testing against accepted reference screenshots
#[derive(Parser, Debug)]
#[command(
    name = "refshot",
    about = "Capture screenshots, compare them with accepted references, accept or clean",
    after_help = "ENVIRONMENT VARIABLES:\n\
        REFSHOT_CONFIG             Path to refshot.config.json\n\
        REFSHOT_CAPTURE_ENGINE     Capture engine executable\n\
        REFSHOT_MAX_CONCURRENCY    Maximum comparisons in flight\n\
        RUST_LOG                   Log filter (default: info)"
)]
struct Args {
    /// Configuration file (default: search upward for refshot.config.json)
    #[arg(long, short = 'c', global = true, env = config::ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the capture engine, populating the `new` screenshots
    Capture {
        /// Capture engine executable
        #[arg(long, env = config::ENV_CAPTURE_ENGINE, default_value = config::DEFAULT_CAPTURE_ENGINE)]
        engine: PathBuf,
    },

    /// Accept the `new` screenshots as references
    Accept,

    /// Compare the `new` screenshots against the references
    Compare,

    /// Remove the `new` and `different` screenshots
    Clean,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = match Config::discover(args.config.as_deref(), &cwd) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => {
            eprintln!("Please add a {} file in your root.", config::CONFIG_FILE_NAME);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args, config).await {
        Ok(Some(outcome)) => {
            if args.json {
                match serde_json::to_string_pretty(&outcome) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("{}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!("{}", outcome.message);
            }
            ExitCode::SUCCESS
        }
        // JSON compare report already printed
        Ok(None) => ExitCode::SUCCESS,
        Err(Error::Compare(CompareError::NoReferences(_))) => {
            eprintln!(
                "No references were found to compare the new screenshots to. \
                 Please accept the previously generated screenshots with `refshot accept`"
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            if e.show_stack() {
                error!("{:?}", e);
            }
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command. `Ok(None)` means output was already written.
async fn run(args: &Args, config: Config) -> Result<Option<Outcome>, Error> {
    match &args.command {
        Commands::Capture { engine } => {
            let capturer = Capturer::with_provider(config, EngineCapture::new(engine));
            Ok(Some(capturer.capture().await?))
        }
        Commands::Accept => Ok(Some(CorpusManager::new(&config).accept().await?)),
        Commands::Clean => Ok(Some(CorpusManager::new(&config).clean().await)),
        Commands::Compare if args.json => {
            let outcome = ComparisonEngine::new(&config).run().await?;
            match serde_json::to_string_pretty(&outcome.report) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("failed to serialize report: {}", e),
            }
            if outcome.report.success() {
                Ok(None)
            } else {
                Err(CompareError::Batch(outcome.failures).into())
            }
        }
        Commands::Compare => Ok(Some(ComparisonEngine::new(&config).compare().await?)),
    }
}
