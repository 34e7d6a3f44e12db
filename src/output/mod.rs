//! Output formatting and display system
//!
//! Terminal rendering of reports, server listings and live progress, in
//! colored or plain text, plus the JSON form of a report.

mod colored;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter, PerformanceLevel};
pub use formatter::{Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData, TableFormat};

use crate::{
    engine::ProgressEvent,
    error::Result,
    models::{ServerRecord, SpeedTestReport},
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            table_borders: true,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }
}

/// Pretty-printed JSON form of a report
pub fn report_to_json(report: &SpeedTestReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
    json: bool,
}

impl OutputCoordinator {
    /// Create a new output coordinator with the specified formatter
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter, json: false }
    }

    /// Render reports as JSON instead of a table
    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn display_report(&self, report: &SpeedTestReport) -> Result<String> {
        if self.json {
            return report_to_json(report);
        }

        let mut output = self.formatter.format_header("Speed Test Results")?;
        output.push_str("\n\n");
        output.push_str(&self.formatter.format_report(report)?);
        Ok(output)
    }

    pub fn display_server_list(&self, servers: &[ServerRecord]) -> Result<String> {
        self.formatter.format_server_list(servers)
    }

    pub fn display_progress(&self, event: &ProgressEvent) -> Result<String> {
        self.formatter.format_progress(event)
    }

    pub fn display_warning(&self, warning: &str) -> Result<String> {
        self.formatter.format_warning(warning)
    }
}
