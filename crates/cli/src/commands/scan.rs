//! The `scan` subcommand: wire up ports, orchestrate the scan, analyze,
//! render the report, and apply the exit-code policy.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Args;
use tracing::{info, warn};

use spectre_lib::gcp::{
    GcpCloudSqlClient, GcpComputeClient, GcpFunctionsClient, GcpMonitoringClient, GcpPubSubClient,
    TokenProvider,
};
use spectre_lib::report::{compute_exit_code, count_at_or_above, EXIT_OK};
use spectre_lib::{
    analyze, AnalyzerConfig, ExcludeConfig, MultiProjectScanner, ReportData, ScanConfig,
};

use crate::config::{self, FileConfig};
use crate::errors::{enhance, CliError};
use crate::output::{self, OutputFormat};

use super::dry_run;

const TOOL_NAME: &str = "gcpspectre";
const PROJECT_CONCURRENCY: usize = 4;

const DEFAULT_IDLE_DAYS: u32 = 7;
const DEFAULT_STALE_DAYS: u32 = 90;
const DEFAULT_MIN_MONTHLY_COST: f64 = 1.0;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Lookback window for utilization metrics (days)
    #[arg(long)]
    pub idle_days: Option<u32>,

    /// Age threshold for stale snapshots (days)
    #[arg(long)]
    pub stale_days: Option<u32>,

    /// Minimum monthly cost to report ($)
    #[arg(long)]
    pub min_monthly_cost: Option<f64>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Output file path (default: stdout)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Scan timeout (e.g. 10m, 90s)
    #[arg(long)]
    pub timeout: Option<String>,

    /// Exclude resources by label (key=value or key-only, repeatable)
    #[arg(long = "exclude-label")]
    pub exclude_labels: Vec<String>,

    /// Exit non-zero when findings meet severity (high, medium, low)
    #[arg(long, value_parser = ["high", "medium", "low"])]
    pub fail_on: Option<String>,

    /// Minimum finding count to trigger non-zero exit (requires --fail-on)
    #[arg(long, default_value_t = 1)]
    pub threshold: usize,

    /// Print scan plan without executing
    #[arg(long)]
    pub dry_run: bool,
}

/// Effective scan settings after applying flag > file > default precedence.
#[derive(Debug)]
pub(crate) struct Settings {
    pub projects: Vec<String>,
    pub idle_days: u32,
    pub stale_days: u32,
    pub min_monthly_cost: f64,
    pub format: OutputFormat,
    pub timeout: Duration,
    pub exclude_ids: HashSet<String>,
    pub exclude_labels: HashMap<String, String>,
    pub exclude_label_entries: Vec<String>,
}

impl Settings {
    pub(crate) fn resolve(
        args: &ScanArgs,
        file: &FileConfig,
        cli_projects: Vec<String>,
    ) -> Result<Self, CliError> {
        let projects = if cli_projects.is_empty() {
            file.projects.clone()
        } else {
            cli_projects
        };

        let format = match (args.format, file.format.as_deref()) {
            (Some(format), _) => format,
            (None, Some(value)) => OutputFormat::from_config(value).ok_or_else(|| {
                CliError::Config(format!(
                    "unsupported format: {value} (use text, json, sarif, or spectrehub)"
                ))
            })?,
            (None, None) => OutputFormat::Text,
        };

        let timeout = match args.timeout.as_deref().or(file.timeout.as_deref()) {
            Some(raw) => config::parse_duration(raw)
                .map_err(|err| CliError::Config(format!("{err:#}")))?,
            None => DEFAULT_TIMEOUT,
        };

        // Label exclusions combine the config file and the repeatable flag.
        let mut label_entries = file.exclude.labels.clone();
        label_entries.extend(args.exclude_labels.iter().cloned());
        label_entries.dedup();

        Ok(Self {
            projects,
            idle_days: args.idle_days.or(file.idle_days).unwrap_or(DEFAULT_IDLE_DAYS),
            stale_days: args
                .stale_days
                .or(file.stale_days)
                .unwrap_or(DEFAULT_STALE_DAYS),
            min_monthly_cost: args
                .min_monthly_cost
                .or(file.min_monthly_cost)
                .unwrap_or(DEFAULT_MIN_MONTHLY_COST),
            format,
            timeout,
            exclude_ids: file.exclude.resource_ids.iter().cloned().collect(),
            exclude_labels: config::parse_labels(&label_entries),
            exclude_label_entries: label_entries,
        })
    }
}

pub async fn run_scan(
    args: ScanArgs,
    cli_projects: Vec<String>,
    verbose: bool,
) -> Result<(), CliError> {
    let (file_cfg, config_path) = config::load(Path::new("."))
        .map_err(|err| CliError::Config(format!("{err:#}")))?;

    let settings = Settings::resolve(&args, &file_cfg, cli_projects)?;
    if settings.projects.is_empty() {
        return Err(CliError::Config(
            "no projects specified; use --project or set projects in .gcpspectre.yaml".to_string(),
        ));
    }

    info!(
        count = settings.projects.len(),
        projects = ?settings.projects,
        "Scanning projects"
    );

    if args.dry_run {
        return dry_run::print_plan(&settings, config_path);
    }

    let auth = Arc::new(TokenProvider::new());
    auth.token()
        .await
        .map_err(|err| CliError::Command(enhance("initialize GCP credentials", err)))?;

    let compute = GcpComputeClient::new(Arc::clone(&auth))
        .map_err(|err| CliError::Command(enhance("initialize GCP Compute client", err)))?;
    let monitoring = GcpMonitoringClient::new(Arc::clone(&auth))
        .map_err(|err| CliError::Command(enhance("initialize GCP Monitoring client", err)))?;

    let scan_config = ScanConfig {
        idle_days: settings.idle_days,
        stale_days: settings.stale_days,
        min_monthly_cost: settings.min_monthly_cost,
        exclude: ExcludeConfig {
            resource_ids: settings.exclude_ids.clone(),
            labels: settings.exclude_labels.clone(),
        },
    };

    let mut scanner = MultiProjectScanner::new(
        Arc::new(compute),
        Arc::new(monitoring),
        settings.projects.clone(),
        PROJECT_CONCURRENCY,
        scan_config,
    );

    // The optional capabilities degrade to no-op scanners when unavailable.
    match GcpCloudSqlClient::new(Arc::clone(&auth)) {
        Ok(client) => scanner = scanner.with_cloud_sql(Arc::new(client)),
        Err(err) => warn!(error = %err, "Cloud SQL client unavailable, skipping SQL scans"),
    }
    match GcpFunctionsClient::new(Arc::clone(&auth)) {
        Ok(client) => scanner = scanner.with_functions(Arc::new(client)),
        Err(err) => warn!(error = %err, "Cloud Functions client unavailable, skipping function scans"),
    }
    match GcpPubSubClient::new(Arc::clone(&auth)) {
        Ok(client) => scanner = scanner.with_pubsub(Arc::new(client)),
        Err(err) => warn!(error = %err, "Pub/Sub client unavailable, skipping Pub/Sub scans"),
    }

    if verbose {
        scanner = scanner.with_progress(Arc::new(|progress| {
            info!(
                project = %progress.project,
                scanner = %progress.scanner,
                "Scanner started"
            );
        }));
    }

    let result = match tokio::time::timeout(settings.timeout, scanner.scan_all()).await {
        Ok(result) => {
            result.map_err(|err| CliError::Command(enhance("scan resources", err)))?
        }
        Err(_) => {
            return Err(CliError::Command(anyhow!(
                "scan timed out after {:?}",
                settings.timeout
            )));
        }
    };

    let analysis = analyze(
        &result,
        &AnalyzerConfig {
            min_monthly_cost: settings.min_monthly_cost,
        },
    );

    let data = ReportData::build(
        TOOL_NAME,
        env!("CARGO_PKG_VERSION"),
        &settings.projects,
        settings.idle_days,
        settings.stale_days,
        settings.min_monthly_cost,
        analysis,
    );

    match &args.output {
        Some(path) => {
            let file = File::create(path)?;
            output::write_report(&data, settings.format, file)?;
        }
        None => {
            let stdout = io::stdout();
            output::write_report(&data, settings.format, stdout.lock())?;
        }
    }

    if let Some(fail_on) = &args.fail_on {
        if compute_exit_code(&data.findings, fail_on, args.threshold) != EXIT_OK {
            return Err(CliError::ThresholdExceeded {
                severity: fail_on.clone(),
                count: count_at_or_above(&data.findings, fail_on),
            });
        }
    }

    Ok(())
}
