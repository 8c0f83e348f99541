//! Idle Cloud SQL instance detection

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::gcp::{CloudSqlLister, MetricSource};
use crate::models::{Finding, FindingKind, ResourceKind, ScanConfig, ScanResult, Severity};
use crate::pricing;

use super::exclude::excluded_by_labels;
use super::ResourceScanner;

const SQL_CPU_METRIC: &str = "cloudsql.googleapis.com/database/cpu/utilization";
const IDLE_CPU_THRESHOLD: f64 = 5.0;

/// Detects RUNNABLE Cloud SQL instances running below the CPU idle threshold.
///
/// The lister is optional; when the Cloud SQL Admin API was unavailable at
/// startup this scanner reports an empty result.
pub struct CloudSqlScanner {
    cloud_sql: Option<Arc<dyn CloudSqlLister>>,
    monitoring: Arc<dyn MetricSource>,
    project: String,
}

impl CloudSqlScanner {
    pub fn new(
        cloud_sql: Option<Arc<dyn CloudSqlLister>>,
        monitoring: Arc<dyn MetricSource>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            cloud_sql,
            monitoring,
            project: project.into(),
        }
    }
}

#[async_trait]
impl ResourceScanner for CloudSqlScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CloudSql
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let Some(cloud_sql) = &self.cloud_sql else {
            return Ok(ScanResult::default());
        };

        let instances = cloud_sql
            .list_sql_instances(&self.project)
            .await
            .context("list Cloud SQL instances")?;

        let mut result = ScanResult {
            resources_scanned: instances.len(),
            ..Default::default()
        };
        if instances.is_empty() {
            return Ok(result);
        }

        let mut runnable = Vec::new();
        for inst in &instances {
            if cfg.exclude.resource_ids.contains(&inst.name) {
                continue;
            }
            if excluded_by_labels(&inst.labels, &cfg.exclude.labels) {
                continue;
            }
            if inst.state == "RUNNABLE" {
                runnable.push(inst);
            }
        }

        if runnable.is_empty() {
            return Ok(result);
        }

        let names: Vec<String> = runnable.iter().map(|i| i.name.clone()).collect();
        let cpu_map = match self
            .monitoring
            .fetch_metric_mean(
                &self.project,
                SQL_CPU_METRIC,
                "database_id",
                &names,
                cfg.idle_days,
            )
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to fetch Cloud SQL CPU metrics");
                return Ok(result);
            }
        };

        for inst in runnable {
            let Some(avg_cpu) = cpu_map.get(&inst.name) else {
                continue;
            };
            let cpu_percent = avg_cpu * 100.0;
            if cpu_percent < IDLE_CPU_THRESHOLD {
                let cost = pricing::monthly_cloud_sql_cost(&inst.tier, &inst.region);
                result.findings.push(Finding {
                    kind: FindingKind::IdleCloudSql,
                    severity: Severity::High,
                    resource_kind: ResourceKind::CloudSql,
                    resource_id: inst.name.clone(),
                    resource_name: Some(inst.name.clone()),
                    project: self.project.clone(),
                    zone: Some(inst.region.clone()),
                    message: format!("CPU {cpu_percent:.1}% over {} days", cfg.idle_days),
                    estimated_monthly_waste: cost,
                    metadata: BTreeMap::from([
                        ("tier".to_string(), inst.tier.as_str().into()),
                        (
                            "database_version".to_string(),
                            inst.database_version.as_str().into(),
                        ),
                        ("avg_cpu_percent".to_string(), cpu_percent.into()),
                    ]),
                });
            }
        }

        Ok(result)
    }
}
