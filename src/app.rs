//! Main application orchestration and execution

use crate::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, ValidationLevel},
    defaults,
    engine::ProgressEvent,
    error::{AppError, Result},
    executor::{RunConfig, SpeedTestRunner},
    logging::LoggerFactory,
    models::Config,
    output::{OutputCoordinator, OutputFormatterFactory},
    types::Phase,
};
use tokio::sync::mpsc;

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::config)?;
        Ok(Self { cli })
    }

    /// Run the application
    pub async fn run(self) -> Result<()> {
        let config = load_config(self.cli.clone())?;
        let warnings = validate_config(&config)?;

        if config.debug {
            eprintln!(
                "{} v{} ({} {}, built {})",
                crate::PKG_NAME,
                crate::VERSION,
                crate::GIT_COMMIT,
                crate::TARGET_TRIPLE,
                crate::BUILD_TIME
            );
            eprintln!("\nConfiguration Summary:");
            eprintln!("{}\n", display_config_summary(&config));
        }

        if let Some(error) = warnings.iter().find(|w| w.level == ValidationLevel::Error) {
            return Err(AppError::config(error.message.clone()));
        }
        for warning in &warnings {
            eprintln!("{}", warning.format(config.enable_color));
        }

        let loggers = LoggerFactory::new(config.clone());
        let logger = loggers.create_logger("APP").await;
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(
            config.enable_color,
            config.verbose,
        ))
        .json(config.json);

        let mut run_config = RunConfig::from(&config);
        bridge_ctrl_c(&run_config);

        if self.cli.list {
            let runner = SpeedTestRunner::new(run_config, logger)?;
            let servers = runner.available_servers(defaults::SERVER_LIST_LIMIT).await?;
            println!("{}", coordinator.display_server_list(&servers)?);
            return Ok(());
        }

        let progress = if show_progress(&config) {
            let (tx, rx) = mpsc::unbounded_channel();
            run_config.events = Some(tx);
            Some(tokio::spawn(print_progress(rx, config.enable_color)))
        } else {
            None
        };

        let runner = SpeedTestRunner::new(run_config, logger)?;
        let result = runner.run().await;
        // Closes the progress channel
        drop(runner);
        if let Some(task) = progress {
            let _ = task.await;
        }
        let report = result?;

        println!("{}", coordinator.display_report(&report)?);

        if report.cancelled {
            let phase = if report.download.cancelled {
                Phase::Download
            } else {
                Phase::Upload
            };
            return Err(AppError::cancelled(phase));
        }

        Ok(())
    }
}

fn show_progress(config: &Config) -> bool {
    config.verbose && !config.json
}

/// Cancel the run on the first Ctrl+C
fn bridge_ctrl_c(run_config: &RunConfig) {
    let token = run_config.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            token.cancel();
        }
    });
}

async fn print_progress(mut events: mpsc::UnboundedReceiver<ProgressEvent>, enable_color: bool) {
    let formatter = OutputFormatterFactory::create_formatter(enable_color, true);
    while let Some(event) = events.recv().await {
        if let Ok(line) = formatter.format_progress(&event) {
            println!("{}", line);
        }
    }
}
