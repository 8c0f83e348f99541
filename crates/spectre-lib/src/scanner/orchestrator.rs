//! Multi-project scan orchestration
//!
//! Projects fan out up to the configured concurrency; within each project
//! the eleven scanners fan out up to [`SCANNER_CONCURRENCY`]. Both levels
//! run under the caller's future, so dropping the `scan_all` future (for
//! example from a `tokio::time::timeout`) cancels every in-flight task.
//!
//! Failures are recoverable at both levels: a scanner error becomes one
//! `"<project>/<resource_kind>: <message>"` entry, a project-level abort
//! becomes `"<project>: <message>"`, and sibling scanners keep their
//! findings. Accumulators are guarded by a mutex that is never held across
//! an await point.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::gcp::{CloudSqlLister, ComputeLister, FunctionsLister, MetricSource, PubSubLister};
use crate::models::{ScanConfig, ScanProgress, ScanResult};

use super::{
    AddressScanner, CloudSqlScanner, DiskScanner, FirewallScanner, FunctionsScanner,
    InstanceGroupScanner, InstanceScanner, LoadBalancerScanner, NatScanner, PubSubScanner,
    ResourceScanner, SnapshotScanner,
};

const DEFAULT_CONCURRENCY: usize = 4;
/// Per-project cap on concurrently running scanners.
const SCANNER_CONCURRENCY: usize = 10;

/// Progress callback, invoked once per (project, scanner) start.
/// Called from worker tasks, so implementations must be thread-safe.
pub type ProgressFn = Arc<dyn Fn(ScanProgress) + Send + Sync>;

/// Runs every resource scanner across a set of projects with bounded
/// two-level concurrency and merges the partial results.
#[derive(Clone)]
pub struct MultiProjectScanner {
    compute: Arc<dyn ComputeLister>,
    monitoring: Arc<dyn MetricSource>,
    cloud_sql: Option<Arc<dyn CloudSqlLister>>,
    functions: Option<Arc<dyn FunctionsLister>>,
    pubsub: Option<Arc<dyn PubSubLister>>,
    projects: Vec<String>,
    concurrency: usize,
    config: ScanConfig,
    progress: Option<ProgressFn>,
}

impl MultiProjectScanner {
    pub fn new(
        compute: Arc<dyn ComputeLister>,
        monitoring: Arc<dyn MetricSource>,
        projects: Vec<String>,
        concurrency: usize,
        config: ScanConfig,
    ) -> Self {
        let concurrency = if concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            concurrency
        };
        Self {
            compute,
            monitoring,
            cloud_sql: None,
            functions: None,
            pubsub: None,
            projects,
            concurrency,
            config,
            progress: None,
        }
    }

    /// Attach the optional Cloud SQL capability.
    pub fn with_cloud_sql(mut self, cloud_sql: Arc<dyn CloudSqlLister>) -> Self {
        self.cloud_sql = Some(cloud_sql);
        self
    }

    /// Attach the optional Cloud Functions capability.
    pub fn with_functions(mut self, functions: Arc<dyn FunctionsLister>) -> Self {
        self.functions = Some(functions);
        self
    }

    /// Attach the optional Pub/Sub capability.
    pub fn with_pubsub(mut self, pubsub: Arc<dyn PubSubLister>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run all scanners across all configured projects.
    ///
    /// Findings carry no ordering guarantee across scanners or projects;
    /// within one scanner they follow its listing order.
    pub async fn scan_all(&self) -> Result<ScanResult> {
        let combined = Arc::new(Mutex::new(ScanResult::default()));
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        for project in self.projects.clone() {
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let combined = Arc::clone(&combined);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("project semaphore closed")?;
                info!(project = %project, "Scanning project");

                match this.scan_project(&project).await {
                    Ok(result) => {
                        let mut guard = combined.lock().expect("combined result lock poisoned");
                        guard.merge(result);
                    }
                    Err(err) => {
                        warn!(project = %project, error = %err, "Project scan failed");
                        let mut guard = combined.lock().expect("combined result lock poisoned");
                        guard.errors.push(format!("{project}: {err:#}"));
                    }
                }
                Ok(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.context("project scan task aborted")??;
        }

        let mut combined = combined.lock().expect("combined result lock poisoned").clone();
        combined.projects_scanned = self.projects.len();
        Ok(combined)
    }

    async fn scan_project(&self, project: &str) -> Result<ScanResult> {
        let scanners = self.build_scanners(project);

        let accumulated = Arc::new(Mutex::new(ScanResult::default()));
        let semaphore = Arc::new(Semaphore::new(SCANNER_CONCURRENCY));
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        for scanner in scanners {
            let project = project.to_string();
            let config = self.config.clone();
            let progress = self.progress.clone();
            let semaphore = Arc::clone(&semaphore);
            let accumulated = Arc::clone(&accumulated);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("scanner semaphore closed")?;
                let kind = scanner.kind();
                debug!(scanner = %kind, project = %project, "Running scanner");

                if let Some(progress) = &progress {
                    progress(ScanProgress {
                        project: project.clone(),
                        scanner: kind.to_string(),
                        message: format!("scanning {kind}"),
                        timestamp: Utc::now(),
                    });
                }

                match scanner.scan(&config).await {
                    Ok(result) => {
                        let mut guard = accumulated.lock().expect("project result lock poisoned");
                        guard.findings.extend(result.findings);
                        guard.resources_scanned += result.resources_scanned;
                    }
                    Err(err) => {
                        warn!(scanner = %kind, project = %project, error = %err, "Scanner failed");
                        let mut guard = accumulated.lock().expect("project result lock poisoned");
                        guard.errors.push(format!("{project}/{kind}: {err:#}"));
                    }
                }
                Ok(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.context("scanner task aborted")??;
        }

        let result = accumulated.lock().expect("project result lock poisoned").clone();
        Ok(result)
    }

    fn build_scanners(&self, project: &str) -> Vec<Arc<dyn ResourceScanner>> {
        vec![
            Arc::new(InstanceScanner::new(
                Arc::clone(&self.compute),
                Arc::clone(&self.monitoring),
                project,
            )),
            Arc::new(DiskScanner::new(Arc::clone(&self.compute), project)),
            Arc::new(AddressScanner::new(Arc::clone(&self.compute), project)),
            Arc::new(SnapshotScanner::new(Arc::clone(&self.compute), project)),
            Arc::new(InstanceGroupScanner::new(Arc::clone(&self.compute), project)),
            Arc::new(CloudSqlScanner::new(
                self.cloud_sql.clone(),
                Arc::clone(&self.monitoring),
                project,
            )),
            Arc::new(FirewallScanner::new(Arc::clone(&self.compute), project)),
            Arc::new(NatScanner::new(
                Arc::clone(&self.compute),
                Arc::clone(&self.monitoring),
                project,
            )),
            Arc::new(FunctionsScanner::new(
                self.functions.clone(),
                Arc::clone(&self.monitoring),
                project,
            )),
            Arc::new(LoadBalancerScanner::new(
                Arc::clone(&self.compute),
                Arc::clone(&self.monitoring),
                project,
            )),
            Arc::new(PubSubScanner::new(
                self.pubsub.clone(),
                Arc::clone(&self.monitoring),
                project,
            )),
        ]
    }
}
