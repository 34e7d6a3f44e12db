//! Colored formatter implementation with terminal color support
//!
//! Same layout as the plain formatter, with speeds and latency tinted by
//! how good they are.

use super::formatter::{
    progress_line, report_rows, report_warnings, server_line, server_list_hint, FormattingOptions,
    OutputFormatter, PlainFormatter,
};
use crate::{
    engine::ProgressEvent,
    error::Result,
    models::{ServerRecord, SpeedTestReport},
};
use colored::*;

/// Performance level classification for color coding
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl PerformanceLevel {
    /// Classify a round trip in milliseconds
    pub fn from_latency(ms: f64) -> Self {
        if ms < 20.0 {
            Self::Excellent
        } else if ms < 50.0 {
            Self::Good
        } else if ms < 150.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    /// Classify a throughput in bytes per second
    pub fn from_speed(bytes_per_sec: f64) -> Self {
        let mbit = bytes_per_sec * 8.0 / 1_000_000.0;
        if mbit >= 100.0 {
            Self::Excellent
        } else if mbit >= 25.0 {
            Self::Good
        } else if mbit >= 5.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    /// Get color for this performance level
    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Red,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub label: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            label: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(FormattingOptions {
                table_borders: false,
                ..options.clone()
            }),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    /// Bold and colored, or untouched when colors are off
    fn emphasize(&self, text: &str, color: Color) -> String {
        if self.options.enable_color {
            text.color(color).bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn value_color(&self, report: &SpeedTestReport, label: &str) -> Option<Color> {
        match label {
            "Download" => Some(PerformanceLevel::from_speed(report.download_speed.bytes_per_sec).color()),
            "Upload" => Some(PerformanceLevel::from_speed(report.upload_speed.bytes_per_sec).color()),
            "Ping" => Some(PerformanceLevel::from_latency(report.ping_ms).color()),
            _ => None,
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let plain = self.plain_formatter.format_header(title)?;
        Ok(self.emphasize(&plain, self.color_scheme.header))
    }

    fn format_report(&self, report: &SpeedTestReport) -> Result<String> {
        let rows = report_rows(report, self.options.verbose_mode);
        let label_width = rows.iter().map(|row| row[0].len()).max().unwrap_or(0);

        // Pad before coloring so escape codes do not skew alignment
        let mut lines: Vec<String> = rows
            .iter()
            .map(|row| {
                let label = self.colorize(&format!("{:<width$}", row[0], width = label_width), self.color_scheme.label);
                let value = match self.value_color(report, &row[0]) {
                    Some(color) => self.emphasize(&row[1], color),
                    None => row[1].clone(),
                };
                format!("  {}  {}", label, value)
            })
            .collect();

        for warning in report_warnings(report) {
            lines.push(self.format_warning(&warning)?);
        }

        Ok(lines.join("\n"))
    }

    fn format_server_list(&self, servers: &[ServerRecord]) -> Result<String> {
        if servers.is_empty() {
            return self.format_warning("No servers available");
        }

        let mut lines: Vec<String> = servers
            .iter()
            .map(|server| {
                let line = server_line(server);
                match line.split_once(" - ") {
                    Some((id, rest)) => format!("{} - {}", self.bold(id), rest),
                    None => line,
                }
            })
            .collect();

        if let Some(hint) = server_list_hint(servers) {
            lines.push(String::new());
            lines.push(self.colorize(&hint, self.color_scheme.muted).to_string());
        }

        Ok(lines.join("\n"))
    }

    fn format_progress(&self, event: &ProgressEvent) -> Result<String> {
        let line = progress_line(event);
        Ok(match event {
            ProgressEvent::Sample { .. } => self.colorize(&line, self.color_scheme.muted).to_string(),
            ProgressEvent::Finished { .. } => self.colorize(&line, self.color_scheme.success).to_string(),
        })
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("❌ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("⚠️  {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✅ {}", self.colorize(message, self.color_scheme.success)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::tests::sample_report;

    fn formatter(enable_color: bool) -> ColoredFormatter {
        ColoredFormatter::new(FormattingOptions {
            enable_color,
            verbose_mode: false,
            table_borders: true,
        })
    }

    #[test]
    fn test_performance_levels() {
        assert_eq!(PerformanceLevel::from_latency(5.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_latency(49.9), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_latency(200.0), PerformanceLevel::Poor);

        assert_eq!(PerformanceLevel::from_speed(12_500_000.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_speed(1_000_000.0), PerformanceLevel::Fair);
        assert_eq!(PerformanceLevel::from_speed(100_000.0), PerformanceLevel::Poor);
        assert_eq!(PerformanceLevel::Poor.color(), Color::Red);
    }

    #[test]
    fn test_report_without_color_codes() {
        let output = formatter(false).format_report(&sample_report(true, false)).unwrap();

        assert!(!output.contains('\u{1b}'));
        assert!(output.contains("Download  12.00 MB/s"));
        assert!(output.contains("Ping      12.35 ms"));
        assert!(output.contains("Test was cancelled"));
    }

    #[test]
    fn test_report_with_color_codes() {
        colored::control::set_override(true);
        let output = formatter(true).format_report(&sample_report(false, false)).unwrap();
        colored::control::unset_override();

        assert!(output.contains('\u{1b}'));
        assert!(output.contains("12.00 MB/s"));
    }

    #[test]
    fn test_server_list_keeps_line_format() {
        let output = formatter(false)
            .format_server_list(&[crate::models::server::sample_server(7, 1.0)])
            .unwrap();
        assert!(output.starts_with("7 - City 7 (Testland)"));
        assert!(output.contains("--server-id 7"));
    }
}
