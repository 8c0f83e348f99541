//! Dry-run scan planning: show what a scan would do without touching GCP.

use std::path::PathBuf;

use serde::Serialize;

use crate::errors::CliError;
use crate::output::OutputFormat;

use super::scan::Settings;

/// Resource classes in the order the orchestrator builds their scanners.
const SCANNER_NAMES: &[&str] = &[
    "compute_instance",
    "persistent_disk",
    "static_ip",
    "snapshot",
    "instance_group",
    "cloud_sql",
    "firewall_rule",
    "cloud_nat",
    "cloud_function",
    "load_balancer",
    "pubsub",
];

#[derive(Serialize)]
struct DryRunPlan {
    projects: Vec<String>,
    scanners: Vec<String>,
    idle_days: u32,
    stale_days: u32,
    min_monthly_cost: f64,
    exclusions: DryRunExclusions,
    config_path: String,
}

#[derive(Serialize)]
struct DryRunExclusions {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    resource_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    labels: Vec<String>,
}

pub(crate) fn print_plan(
    settings: &Settings,
    config_path: Option<PathBuf>,
) -> Result<(), CliError> {
    let mut resource_ids: Vec<String> = settings.exclude_ids.iter().cloned().collect();
    resource_ids.sort();

    let plan = DryRunPlan {
        projects: settings.projects.clone(),
        scanners: SCANNER_NAMES.iter().map(|s| s.to_string()).collect(),
        idle_days: settings.idle_days,
        stale_days: settings.stale_days,
        min_monthly_cost: settings.min_monthly_cost,
        exclusions: DryRunExclusions {
            resource_ids,
            labels: settings.exclude_label_entries.clone(),
        },
        config_path: config_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
    };

    if settings.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Scan Plan (dry-run)\n");
    println!("Projects:");
    for project in &plan.projects {
        println!("  - {project}");
    }
    println!("\nScanners:");
    for scanner in &plan.scanners {
        println!("  - {scanner}");
    }
    println!("\nSettings:");
    println!("  idle-days:        {}", plan.idle_days);
    println!("  stale-days:       {}", plan.stale_days);
    println!("  min-monthly-cost: {:.2}", plan.min_monthly_cost);
    if !plan.exclusions.resource_ids.is_empty() || !plan.exclusions.labels.is_empty() {
        println!("\nExclusions:");
        for id in &plan.exclusions.resource_ids {
            println!("  resource-id: {id}");
        }
        for label in &plan.exclusions.labels {
            println!("  label: {label}");
        }
    }
    println!("\nConfig: {}", plan.config_path);
    Ok(())
}
