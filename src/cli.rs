use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, instrument, warn};

use crate::config::SystemConfig;
use crate::deployment::DeploymentService;
use crate::execution::ScriptDeployAction;
use crate::http::AppState;
use crate::types::Result;
use crate::webhook::{EventFilter, SignatureVerifier};

/// Config file read when `--config` is not given; optional
pub const DEFAULT_CONFIG_PATH: &str = "/etc/releasehook/config.toml";

#[derive(Parser)]
#[command(name = "releasehook")]
#[command(about = "GitHub release webhook receiver")]
#[command(long_about = "
Receives GitHub release webhooks, verifies their signature, and runs a
deploy script for each published release, one deployment at a time.
")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path (defaults to /etc/releasehook/config.toml
    /// when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Also append logs to this file (overrides `logging.file`)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run the webhook receiver (default if no subcommand given)
    Run(RunArgs),
    /// Validate the configuration and exit
    Validate,
    /// Show version information
    Version,
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Override listen address (format: "host:port")
    #[arg(long)]
    pub listen: Option<String>,

    /// Set log format
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Get effective log level considering verbose/quiet flags
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Error
        } else {
            self.log_level.clone().unwrap_or(LogLevel::Info)
        }
    }

    /// Log level from the command line, if any flag sets one
    pub fn log_level_override(&self) -> Option<&'static str> {
        if self.log_level.is_none() && !self.verbose && !self.quiet {
            return None;
        }
        Some(match self.effective_log_level() {
            LogLevel::Trace => crate::logging::level::TRACE,
            LogLevel::Debug => crate::logging::level::DEBUG,
            LogLevel::Info => crate::logging::level::INFO,
            LogLevel::Warn => crate::logging::level::WARN,
            LogLevel::Error => crate::logging::level::ERROR,
        })
    }

    /// Get log format override from CLI arguments
    pub fn log_format_override(&self) -> Option<&'static str> {
        match &self.command {
            Some(Commands::Run(args)) => args.log_format.as_ref().map(|fmt| match fmt {
                LogFormat::Json => crate::logging::format::JSON,
                LogFormat::Pretty => crate::logging::format::PRETTY,
                LogFormat::Compact => crate::logging::format::COMPACT,
            }),
            _ => None,
        }
    }

    pub fn config_path(&self) -> &Path {
        self.config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load the configuration plus environment overrides. An explicit
    /// `--config` must exist; the default path may be absent.
    pub fn load_config(&self) -> Result<SystemConfig> {
        SystemConfig::load(self.config_path(), self.config.is_some())
    }
}

/// Run the webhook receiver until a shutdown signal arrives
#[instrument(skip_all)]
pub async fn run_server(
    cli: Cli,
    args: RunArgs,
    system_config: Option<SystemConfig>,
) -> Result<()> {
    let mut config = match system_config {
        Some(config) => config,
        None => cli.load_config()?,
    };
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    config.validate().await?;

    log_config_summary(cli.config_path(), &config);

    let dispatcher = config.dispatcher();
    let action = ScriptDeployAction::new(config.deploy.script.clone())
        .with_args(config.deploy.script_args.clone())
        .with_working_dir(config.deploy.working_dir.as_ref().map(PathBuf::from));

    let service = Arc::new(DeploymentService::new(&dispatcher, Arc::new(action)));
    service.start()?;

    let filter = EventFilter::new(SignatureVerifier::new(dispatcher.secret.clone()));
    info!(
        signature_verification = filter.verifier().is_enabled(),
        queue_capacity = service.capacity(),
        "Webhook intake ready"
    );
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let app_state = Arc::new(AppState::new(config, filter, Arc::clone(&service)));

    let served = crate::http::start_server(app_state, setup_shutdown_signal()).await;

    info!("Stopping deployment service");
    if let Err(e) = service.stop(shutdown_timeout).await {
        error!(error = %e, "Deployment service did not stop cleanly");
    }

    served
}

fn log_config_summary(path: &Path, config: &SystemConfig) {
    info!(
        config_path = %path.display(),
        listen = %config.server.listen,
        script = %config.deploy.script,
        environment = %config.deploy.environment,
        queue_capacity = config.deploy.queue_capacity,
        deploy_timeout = config.deploy.timeout,
        secret_configured = !config.webhook.secret.is_empty(),
        log_file = config.logging.file.as_deref().unwrap_or("-"),
        "Configuration loaded"
    );

    if config.webhook.secret.is_empty() {
        warn!("No webhook secret configured, signature verification is DISABLED");
    }
    if !Path::new(&config.deploy.script).exists() {
        warn!(
            script = %config.deploy.script,
            "Deploy script not found, deployments will fail until it exists"
        );
    }
}

/// Validate the configuration
#[instrument(skip_all)]
pub async fn validate_config(cli: Cli, system_config: Option<SystemConfig>) -> Result<()> {
    info!("Validating configuration...");

    let config = match system_config {
        Some(config) => config,
        None => cli.load_config()?,
    };

    match config.validate().await {
        Ok(()) => {
            log_config_summary(cli.config_path(), &config);
            info!(
                config_path = %cli.config_path().display(),
                "Configuration is valid"
            );
            Ok(())
        }
        Err(e) => {
            error!(
                config_path = %cli.config_path().display(),
                error = %e,
                "Configuration validation failed"
            );
            Err(e)
        }
    }
}

/// Show version and build information
pub async fn show_version() -> Result<()> {
    println!("releasehook {}", env!("CARGO_PKG_VERSION"));
    println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();

    println!("Build Information:");
    println!(
        "  Build Profile: {}",
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        }
    );
    println!();

    println!("Runtime Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Architecture: {}", std::env::consts::ARCH);

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
