//! Report envelope assembly
//!
//! Builds the `ReportData` record the output formatters consume: tool
//! identity, a hashed target descriptor, the echoed scan configuration,
//! filtered findings, the summary, and structured scan errors.

mod exit;

pub use exit::{compute_exit_code, count_at_or_above, EXIT_OK, EXIT_THRESHOLD_EXCEEDED};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analyzer::{AnalysisResult, Summary};
use crate::models::Finding;

/// Identifies the set of projects a report covers without embedding them in
/// external systems verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: String,
    pub uri_hash: String,
}

/// The scan configuration echoed into the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub projects: Vec<String>,
    pub idle_days: u32,
    pub stale_days: u32,
    pub min_monthly_cost: f64,
}

/// A structured, recoverable scanner error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub scanner: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_kind: Option<String>,
    pub recoverable: bool,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_kind {
            Some(kind) => write!(f, "{} ({}): {}", self.scanner, kind, self.message),
            None => write!(f, "{}: {}", self.scanner, self.message),
        }
    }
}

/// Everything an output formatter needs to render a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub tool: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub target: Target,
    pub config: ReportConfig,
    pub findings: Vec<Finding>,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ScanError>,
}

impl ReportData {
    /// Assemble the envelope from an analysis result.
    pub fn build(
        tool: &str,
        version: &str,
        projects: &[String],
        idle_days: u32,
        stale_days: u32,
        min_monthly_cost: f64,
        analysis: AnalysisResult,
    ) -> Self {
        Self {
            tool: tool.to_string(),
            version: version.to_string(),
            timestamp: Utc::now(),
            target: Target {
                kind: "gcp-projects".to_string(),
                uri_hash: target_hash(projects),
            },
            config: ReportConfig {
                projects: projects.to_vec(),
                idle_days,
                stale_days,
                min_monthly_cost,
            },
            findings: analysis.findings,
            summary: analysis.summary,
            errors: structured_errors(&analysis.errors),
        }
    }
}

/// SHA-256 of `"projects:" + comma-joined project list`, rendered as
/// `"sha256:<lowercase hex>"`.
pub fn target_hash(projects: &[String]) -> String {
    let input = format!("projects:{}", projects.join(","));
    let digest = Sha256::digest(input.as_bytes());
    format!("sha256:{digest:x}")
}

/// Parse raw scanner error strings into structured errors.
///
/// Raw entries follow `"<project>/<resource_kind>: <message>"` or
/// `"<project>: <message>"`; anything else is preserved under the scanner
/// name "unknown". Every scan-phase error is recoverable by construction.
pub fn structured_errors(raw: &[String]) -> Vec<ScanError> {
    raw.iter()
        .map(|entry| match entry.split_once(": ") {
            Some((scope, message)) => {
                let (scanner, resource_kind) = match scope.split_once('/') {
                    Some((project, kind)) => (project.to_string(), Some(kind.to_string())),
                    None => (scope.to_string(), None),
                };
                ScanError {
                    scanner,
                    message: message.to_string(),
                    resource_kind,
                    recoverable: true,
                }
            }
            None => ScanError {
                scanner: "unknown".to_string(),
                message: entry.clone(),
                resource_kind: None,
                recoverable: true,
            },
        })
        .collect()
}
