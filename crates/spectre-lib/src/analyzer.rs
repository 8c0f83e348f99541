//! Post-scan analysis: cost filtering and summary aggregation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Finding, ScanResult};

/// Controls analysis behavior.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    /// Findings below this estimated monthly cost are dropped.
    pub min_monthly_cost: f64,
}

/// Aggregated statistics over the filtered findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_resources_scanned: usize,
    pub total_findings: usize,
    pub total_monthly_waste: f64,
    pub by_severity: BTreeMap<String, usize>,
    pub by_resource_kind: BTreeMap<String, usize>,
    pub projects_scanned: usize,
}

/// Filtered findings plus computed summary; scan errors pass through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub findings: Vec<Finding>,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Filter findings by minimum monthly cost and compute summary histograms.
pub fn analyze(result: &ScanResult, cfg: &AnalyzerConfig) -> AnalysisResult {
    let findings: Vec<Finding> = result
        .findings
        .iter()
        .filter(|f| f.estimated_monthly_waste >= cfg.min_monthly_cost)
        .cloned()
        .collect();

    let mut summary = Summary {
        total_resources_scanned: result.resources_scanned,
        total_findings: findings.len(),
        projects_scanned: result.projects_scanned,
        ..Default::default()
    };

    for finding in &findings {
        summary.total_monthly_waste += finding.estimated_monthly_waste;
        *summary
            .by_severity
            .entry(finding.severity.to_string())
            .or_insert(0) += 1;
        *summary
            .by_resource_kind
            .entry(finding.resource_kind.to_string())
            .or_insert(0) += 1;
    }

    AnalysisResult {
        findings,
        summary,
        errors: result.errors.clone(),
    }
}
