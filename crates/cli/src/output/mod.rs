//! Report output formatting
//!
//! Four formatters over the same `ReportData` envelope: human-readable
//! text, the spectre/v1 JSON envelope, SARIF 2.1.0, and the SpectreHub
//! upload envelope.

mod json;
mod sarif;
mod spectrehub;
mod text;

use std::io::Write;

use clap::ValueEnum;
use colored::Colorize;

use spectre_lib::ReportData;

use crate::errors::CliError;

/// Output format for scan reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output (default)
    #[default]
    Text,
    /// spectre/v1 JSON envelope
    Json,
    /// SARIF 2.1.0
    Sarif,
    /// SpectreHub upload envelope
    Spectrehub,
}

impl OutputFormat {
    /// Parse the `format:` value from the config file.
    pub fn from_config(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            "sarif" => Some(Self::Sarif),
            "spectrehub" => Some(Self::Spectrehub),
            _ => None,
        }
    }
}

/// Render a report to the writer in the requested format.
pub fn write_report<W: Write>(
    data: &ReportData,
    format: OutputFormat,
    writer: W,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => text::write(data, writer).map_err(CliError::Io),
        OutputFormat::Json => json::write(data, writer),
        OutputFormat::Sarif => sarif::write(data, writer),
        OutputFormat::Spectrehub => spectrehub::write(data, writer),
    }
}

/// Print a success message to stdout.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message to stderr.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Format a dollar amount per month.
pub fn format_currency(amount: f64) -> String {
    format!("${amount:.2}/mo")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        assert_eq!(OutputFormat::from_config("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::from_config("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_config("sarif"), Some(OutputFormat::Sarif));
        assert_eq!(
            OutputFormat::from_config("spectrehub"),
            Some(OutputFormat::Spectrehub)
        );
        assert_eq!(OutputFormat::from_config("xml"), None);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(24.455), "$24.46/mo");
        assert_eq!(format_currency(0.0), "$0.00/mo");
    }
}
