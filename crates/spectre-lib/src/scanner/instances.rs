//! Idle and long-stopped compute instance detection

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::gcp::{ComputeLister, MetricSource};
use crate::models::{Finding, FindingKind, ResourceKind, ScanConfig, ScanResult, Severity};
use crate::pricing;

use super::exclude::excluded_by_labels;
use super::ResourceScanner;

const CPU_UTILIZATION_METRIC: &str = "compute.googleapis.com/instance/cpu/utilization";
const STOPPED_THRESHOLD_DAYS: i64 = 30;
const IDLE_CPU_THRESHOLD: f64 = 5.0;

/// Detects instances that are stopped long-term or running far below the CPU
/// idle threshold.
pub struct InstanceScanner {
    compute: Arc<dyn ComputeLister>,
    monitoring: Arc<dyn MetricSource>,
    project: String,
}

impl InstanceScanner {
    pub fn new(
        compute: Arc<dyn ComputeLister>,
        monitoring: Arc<dyn MetricSource>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            compute,
            monitoring,
            project: project.into(),
        }
    }
}

#[async_trait]
impl ResourceScanner for InstanceScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ComputeInstance
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let instances = self
            .compute
            .list_instances(&self.project)
            .await
            .context("list instances")?;

        let mut result = ScanResult {
            resources_scanned: instances.len(),
            ..Default::default()
        };
        if instances.is_empty() {
            return Ok(result);
        }

        let now = Utc::now();
        let mut running = Vec::new();

        for inst in &instances {
            let id = inst.id.to_string();
            if cfg.exclude.resource_ids.contains(&id) {
                continue;
            }
            if excluded_by_labels(&inst.labels, &cfg.exclude.labels) {
                continue;
            }

            match inst.status.as_str() {
                "STOPPED" => {
                    let stopped_since = inst.last_started.or(inst.create_time);
                    let Some(stopped_since) = stopped_since else {
                        continue;
                    };
                    let days_stopped = (now - stopped_since).num_days();
                    if days_stopped >= STOPPED_THRESHOLD_DAYS {
                        let cost = pricing::monthly_instance_cost(&inst.machine_type, &inst.zone);
                        result.findings.push(Finding {
                            kind: FindingKind::StoppedInstance,
                            severity: Severity::High,
                            resource_kind: ResourceKind::ComputeInstance,
                            resource_id: id,
                            resource_name: Some(inst.name.clone()),
                            project: self.project.clone(),
                            zone: Some(inst.zone.clone()),
                            message: format!("Stopped for {days_stopped} days"),
                            estimated_monthly_waste: cost,
                            metadata: BTreeMap::from([
                                ("machine_type".to_string(), inst.machine_type.as_str().into()),
                                ("days_stopped".to_string(), days_stopped.into()),
                                ("state".to_string(), "stopped".into()),
                            ]),
                        });
                    }
                }
                "RUNNING" => running.push((id, inst)),
                _ => {}
            }
        }

        if running.is_empty() {
            return Ok(result);
        }

        let running_ids: Vec<String> = running.iter().map(|(id, _)| id.clone()).collect();
        let cpu_map = match self
            .monitoring
            .fetch_metric_mean(
                &self.project,
                CPU_UTILIZATION_METRIC,
                "instance_id",
                &running_ids,
                cfg.idle_days,
            )
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to fetch CPU metrics");
                return Ok(result);
            }
        };

        for (id, inst) in running {
            let Some(avg_cpu) = cpu_map.get(&id) else {
                continue;
            };
            // The metric is a 0.0-1.0 fraction; thresholds are in percent.
            let cpu_percent = avg_cpu * 100.0;
            if cpu_percent < IDLE_CPU_THRESHOLD {
                let cost = pricing::monthly_instance_cost(&inst.machine_type, &inst.zone);
                result.findings.push(Finding {
                    kind: FindingKind::IdleInstance,
                    severity: Severity::High,
                    resource_kind: ResourceKind::ComputeInstance,
                    resource_id: id,
                    resource_name: Some(inst.name.clone()),
                    project: self.project.clone(),
                    zone: Some(inst.zone.clone()),
                    message: format!("CPU {cpu_percent:.1}% over {} days", cfg.idle_days),
                    estimated_monthly_waste: cost,
                    metadata: BTreeMap::from([
                        ("machine_type".to_string(), inst.machine_type.as_str().into()),
                        ("avg_cpu_percent".to_string(), cpu_percent.into()),
                        ("state".to_string(), "running".into()),
                    ]),
                });
            }
        }

        Ok(result)
    }
}
