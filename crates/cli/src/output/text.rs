//! Human-readable text report

use std::io::Write;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use spectre_lib::ReportData;

use super::format_currency;

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Finding")]
    kind: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Est. Waste")]
    waste: String,
}

pub fn write<W: Write>(data: &ReportData, mut w: W) -> std::io::Result<()> {
    writeln!(w, "{} {} - GCP waste report", data.tool, data.version)?;
    writeln!(
        w,
        "Scanned {} resources across {} projects ({})",
        data.summary.total_resources_scanned,
        data.summary.projects_scanned,
        data.config.projects.join(", ")
    )?;
    writeln!(
        w,
        "Settings: idle window {}d, stale threshold {}d, min cost {}",
        data.config.idle_days,
        data.config.stale_days,
        format_currency(data.config.min_monthly_cost)
    )?;
    writeln!(w)?;

    if data.findings.is_empty() {
        writeln!(w, "No waste found above the cost threshold.")?;
    } else {
        let rows: Vec<FindingRow> = data
            .findings
            .iter()
            .map(|f| FindingRow {
                severity: f.severity.to_string(),
                kind: f.kind.to_string(),
                resource: f
                    .resource_name
                    .clone()
                    .unwrap_or_else(|| f.resource_id.clone()),
                project: f.project.clone(),
                location: f.zone.clone().unwrap_or_else(|| "-".to_string()),
                waste: format_currency(f.estimated_monthly_waste),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        writeln!(w, "{table}")?;
        writeln!(w)?;

        for finding in &data.findings {
            writeln!(
                w,
                "  [{}] {}: {}",
                finding.severity,
                finding
                    .resource_name
                    .as_deref()
                    .unwrap_or(&finding.resource_id),
                finding.message
            )?;
        }
        writeln!(w)?;
    }

    writeln!(
        w,
        "Total findings: {}   Estimated monthly waste: {}",
        data.summary.total_findings,
        format_currency(data.summary.total_monthly_waste)
    )?;

    if !data.summary.by_severity.is_empty() {
        let severities: Vec<String> = data
            .summary
            .by_severity
            .iter()
            .map(|(severity, count)| format!("{severity}={count}"))
            .collect();
        writeln!(w, "By severity: {}", severities.join(", "))?;
    }

    if !data.errors.is_empty() {
        writeln!(w)?;
        writeln!(w, "Scan errors ({} recoverable):", data.errors.len())?;
        for err in &data.errors {
            writeln!(w, "  - {err}")?;
        }
    }

    Ok(())
}
