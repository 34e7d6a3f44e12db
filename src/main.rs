//! QuickPing - Main CLI Application
//!
//! Measures download and upload throughput plus latency against the best
//! nearby measurement server.

use clap::Parser;
use quickping::{
    app::App,
    cli::Cli,
    error::{ErrorReporter, Result},
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue with the command line you used.");
        process::exit(1);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}

async fn run_application(cli: Cli) -> Result<()> {
    App::new(cli)?.run().await
}
