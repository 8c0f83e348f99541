//! Idle and low-traffic Cloud NAT detection

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::gcp::{ComputeLister, MetricSource};
use crate::models::{Finding, FindingKind, ResourceKind, ScanConfig, ScanResult, Severity};
use crate::pricing;

use super::ResourceScanner;

const NAT_SENT_BYTES_METRIC: &str = "router.googleapis.com/nat/sent_bytes_count";
/// Bytes/sec below which an active NAT counts as low traffic.
const LOW_TRAFFIC_THRESHOLD: f64 = 1024.0;

struct NatEntry {
    router_id: u64,
    router_name: String,
    nat_name: String,
    region: String,
}

/// Detects NAT gateways with no traffic at all (`NAT_IDLE`) or averaging
/// under the low-traffic threshold (`NAT_LOW_TRAFFIC`).
///
/// The sent-bytes series is keyed by router, so the metric lookup is issued
/// per router name and read back per NAT entry. `resources_scanned` counts
/// NAT gateways, not routers.
pub struct NatScanner {
    compute: Arc<dyn ComputeLister>,
    monitoring: Arc<dyn MetricSource>,
    project: String,
}

impl NatScanner {
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
impl ResourceScanner for NatScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CloudNat
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let routers = self
            .compute
            .list_routers(&self.project)
            .await
            .context("list routers")?;

        let mut entries = Vec::new();
        let mut router_names = Vec::new();
        for router in &routers {
            for nat in &router.nats {
                // Compound exclusion key: a NAT has no identity of its own.
                let exclude_id = format!("{}/{}", router.id, nat.name);
                if cfg.exclude.resource_ids.contains(&exclude_id) {
                    continue;
                }
                entries.push(NatEntry {
                    router_id: router.id,
                    router_name: router.name.clone(),
                    nat_name: nat.name.clone(),
                    region: router.region.clone(),
                });
                router_names.push(router.name.clone());
            }
        }

        let mut result = ScanResult {
            resources_scanned: entries.len(),
            ..Default::default()
        };
        if entries.is_empty() {
            return Ok(result);
        }

        let bytes_map = match self
            .monitoring
            .fetch_metric_mean(
                &self.project,
                NAT_SENT_BYTES_METRIC,
                "router_id",
                &router_names,
                cfg.idle_days,
            )
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to fetch NAT metrics");
                return Ok(result);
            }
        };

        for entry in entries {
            match bytes_map.get(&entry.router_name) {
                None => {
                    // No datapoints at all: the gateway moved nothing.
                    let cost = pricing::monthly_nat_cost(&entry.region);
                    result.findings.push(Finding {
                        kind: FindingKind::NatIdle,
                        severity: Severity::Medium,
                        resource_kind: ResourceKind::CloudNat,
                        resource_id: entry.router_id.to_string(),
                        resource_name: Some(format!("{}/{}", entry.router_name, entry.nat_name)),
                        project: self.project.clone(),
                        zone: Some(entry.region.clone()),
                        message: format!(
                            "Cloud NAT {} on router {} has no traffic over {} days",
                            entry.nat_name, entry.router_name, cfg.idle_days
                        ),
                        estimated_monthly_waste: cost,
                        metadata: BTreeMap::from([
                            ("router".to_string(), entry.router_name.as_str().into()),
                            ("nat_name".to_string(), entry.nat_name.as_str().into()),
                        ]),
                    });
                }
                Some(avg_bytes) if *avg_bytes < LOW_TRAFFIC_THRESHOLD => {
                    let cost = pricing::monthly_nat_cost(&entry.region);
                    result.findings.push(Finding {
                        kind: FindingKind::NatLowTraffic,
                        severity: Severity::Low,
                        resource_kind: ResourceKind::CloudNat,
                        resource_id: entry.router_id.to_string(),
                        resource_name: Some(format!("{}/{}", entry.router_name, entry.nat_name)),
                        project: self.project.clone(),
                        zone: Some(entry.region.clone()),
                        message: format!(
                            "Cloud NAT {} avg {avg_bytes:.0} bytes/sec over {} days",
                            entry.nat_name, cfg.idle_days
                        ),
                        estimated_monthly_waste: cost,
                        metadata: BTreeMap::from([
                            ("router".to_string(), entry.router_name.as_str().into()),
                            ("nat_name".to_string(), entry.nat_name.as_str().into()),
                            ("avg_bytes_sec".to_string(), (*avg_bytes).into()),
                        ]),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(result)
    }
}
