//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    engine::ProgressEvent,
    error::{AppError, Result},
    models::{HumanSpeed, ServerRecord, SpeedTestReport, TransferResult},
    types::Direction,
};
use chrono::Local;
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format a finished speed test
    fn format_report(&self, report: &SpeedTestReport) -> Result<String>;

    /// Format the `--list` server listing
    fn format_server_list(&self, servers: &[ServerRecord]) -> Result<String>;

    /// Format a live progress line
    fn format_progress(&self, event: &ProgressEvent) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Add stream and stop details to the report
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width: header.len(),
            max_width: 60,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Label/value rows of a report, in display order
pub(crate) fn report_rows(report: &SpeedTestReport, verbose: bool) -> Vec<RowData> {
    let mut rows = vec![
        vec!["Download".to_string(), report.download_speed.display.clone()],
        vec!["Upload".to_string(), report.upload_speed.display.clone()],
        vec!["Ping".to_string(), report.ping_display()],
        vec![
            "Jitter".to_string(),
            report.jitter_display().unwrap_or_else(|| "n/a".to_string()),
        ],
        vec!["Server".to_string(), report.server.label()],
        vec!["Host".to_string(), report.server.address()],
        vec![
            "Time".to_string(),
            report.timestamp.with_timezone(&Local).format(TIME_FORMAT).to_string(),
        ],
    ];

    if verbose {
        for transfer in [&report.download, &report.upload] {
            rows.push(vec![
                format!("{} streams", capitalize(transfer.direction)),
                format!(
                    "{}/{} ok, {} failed",
                    transfer.streams.successful, transfer.streams.requested, transfer.streams.failed
                ),
            ]);
            rows.push(vec![
                format!("{} detail", capitalize(transfer.direction)),
                transfer_detail(transfer),
            ]);
        }
    }

    rows
}

/// Warning lines shown under the report table
pub(crate) fn report_warnings(report: &SpeedTestReport) -> Vec<String> {
    let mut warnings = Vec::new();
    if report.cancelled {
        warnings.push("Test was cancelled; figures cover only the completed part".to_string());
    }
    if report.partial_failure {
        warnings.push("Some streams failed mid-transfer; speed reflects the remaining streams".to_string());
    }
    warnings
}

/// `<id> - <name> (<country>)`
pub(crate) fn server_line(server: &ServerRecord) -> String {
    format!("{} - {} ({})", server.id, server.name, server.country)
}

pub(crate) fn server_list_hint(servers: &[ServerRecord]) -> Option<String> {
    servers
        .first()
        .map(|server| format!("Run a test against one of them with: quickping --server-id {}", server.id))
}

pub(crate) fn progress_line(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Sample { direction, sample, total_bytes } => format!(
            "{:>8} {:>6.1}s  {:>14}  {:>10.2} MB total",
            capitalize(*direction),
            sample.timestamp.as_secs_f64(),
            HumanSpeed::from_bytes_per_sec(sample.rate_bps()).display,
            *total_bytes as f64 / (1024.0 * 1024.0)
        ),
        ProgressEvent::Finished { direction, speed_bps, stop_reason } => format!(
            "{} finished: {} ({})",
            capitalize(*direction),
            HumanSpeed::from_bytes_per_sec(*speed_bps).display,
            stop_reason
        ),
    }
}

fn transfer_detail(transfer: &TransferResult) -> String {
    format!(
        "{:.2} MB in {:.1}s, {} samples, stopped by {}",
        transfer.total_bytes as f64 / (1024.0 * 1024.0),
        transfer.duration.as_secs_f64(),
        transfer.samples.len(),
        transfer.stop_reason
    )
}

fn capitalize(direction: Direction) -> &'static str {
    match direction {
        Direction::Download => "Download",
        Direction::Upload => "Upload",
    }
}

fn fmt_error(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Create a table with the given format and data
    pub(crate) fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let column_widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }

            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &column_widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&column_widths));
            output.push('\n');
        }

        for row in rows {
            output.push_str(&self.create_row(row, &column_widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&column_widths));
        }

        output
    }

    /// Calculate optimal column widths
    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        let num_columns = format
            .columns
            .len()
            .max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

        (0..num_columns)
            .map(|col_idx| {
                let column = format.columns.get(col_idx);
                let floor = column.map(|c| c.min_width.max(c.header.len())).unwrap_or(0);
                let content = rows
                    .iter()
                    .filter_map(|row| row.get(col_idx))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0);
                let width = floor.max(content);
                column.map(|c| width.min(c.max_width)).unwrap_or(width)
            })
            .collect()
    }

    /// Create a table row
    fn create_row(&self, data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();

        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format
                .columns
                .get(idx)
                .map(|c| &c.alignment)
                .unwrap_or(&Alignment::Left);

            if format.show_borders {
                row.push(' ');
            }
            row.push_str(&self.align_text(cell, width, alignment));
            if format.show_borders {
                row.push_str(" |");
            } else {
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    /// Create horizontal border for table
    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::new();

        if !widths.is_empty() {
            border.push('+');
            for &width in widths {
                border.push_str(&"-".repeat(width + 2));
                border.push('+');
            }
        }

        border
    }

    /// Align text within specified width
    fn align_text(&self, text: &str, width: usize, alignment: &Alignment) -> String {
        let len = text.chars().count();
        if len >= width {
            return text.chars().take(width).collect();
        }

        let padding = " ".repeat(width - len);
        match alignment {
            Alignment::Left => format!("{}{}", text, padding),
            Alignment::Right => format!("{}{}", padding, text),
        }
    }

    pub(crate) fn report_table_format(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("Metric", Alignment::Left),
                Column::new("Value", Alignment::Right),
            ],
            show_borders: self.options.table_borders,
            show_header: false,
        }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(fmt_error)?;
        writeln!(output, "  {}", title).map_err(fmt_error)?;
        write!(output, "{}", border).map_err(fmt_error)?;

        Ok(output)
    }

    fn format_report(&self, report: &SpeedTestReport) -> Result<String> {
        let mut output = self.create_table(
            &self.report_table_format(),
            &report_rows(report, self.options.verbose_mode),
        );

        for warning in report_warnings(report) {
            output.push('\n');
            output.push_str(&self.format_warning(&warning)?);
        }

        Ok(output)
    }

    fn format_server_list(&self, servers: &[ServerRecord]) -> Result<String> {
        if servers.is_empty() {
            return self.format_warning("No servers available");
        }

        let mut output = String::new();
        for server in servers {
            writeln!(output, "{}", server_line(server)).map_err(fmt_error)?;
        }
        if let Some(hint) = server_list_hint(servers) {
            write!(output, "\n{}", hint).map_err(fmt_error)?;
        }

        Ok(output)
    }

    fn format_progress(&self, event: &ProgressEvent) -> Result<String> {
        Ok(progress_line(event))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("OK: {}", message))
    }
}
