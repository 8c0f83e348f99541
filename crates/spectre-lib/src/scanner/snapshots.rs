//! Stale disk snapshot detection

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::gcp::ComputeLister;
use crate::models::{Finding, FindingKind, ResourceKind, ScanConfig, ScanResult, Severity};
use crate::pricing;

use super::exclude::excluded_by_labels;
use super::ResourceScanner;

const GIB: i64 = 1024 * 1024 * 1024;
const DEFAULT_REGION: &str = "us-central1";

/// Detects snapshots older than the configured staleness threshold.
pub struct SnapshotScanner {
    compute: Arc<dyn ComputeLister>,
    project: String,
}

impl SnapshotScanner {
    pub fn new(compute: Arc<dyn ComputeLister>, project: impl Into<String>) -> Self {
        Self {
            compute,
            project: project.into(),
        }
    }
}

#[async_trait]
impl ResourceScanner for SnapshotScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Snapshot
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let snapshots = self
            .compute
            .list_snapshots(&self.project)
            .await
            .context("list snapshots")?;

        let mut result = ScanResult {
            resources_scanned: snapshots.len(),
            ..Default::default()
        };
        let now = Utc::now();

        for snap in &snapshots {
            let id = snap.id.to_string();
            if cfg.exclude.resource_ids.contains(&id) {
                continue;
            }
            if excluded_by_labels(&snap.labels, &cfg.exclude.labels) {
                continue;
            }

            let Some(create_time) = snap.create_time else {
                continue;
            };
            let age_days = (now - create_time).num_days();
            if age_days < i64::from(cfg.stale_days) {
                continue;
            }

            // Billed bytes when reported, rounded up to whole GiB; otherwise
            // fall back to the source disk size.
            let size_gib = if snap.storage_bytes > 0 {
                snap.storage_bytes / GIB + i64::from(snap.storage_bytes % GIB > 0)
            } else {
                snap.disk_size_gib
            };

            let region = snap
                .storage_locations
                .first()
                .map(String::as_str)
                .unwrap_or(DEFAULT_REGION);

            let cost = pricing::monthly_snapshot_cost(size_gib, region);
            result.findings.push(Finding {
                kind: FindingKind::StaleSnapshot,
                severity: Severity::Medium,
                resource_kind: ResourceKind::Snapshot,
                resource_id: id,
                resource_name: Some(snap.name.clone()),
                project: self.project.clone(),
                zone: None,
                message: format!("Snapshot {age_days} days old, {size_gib} GiB"),
                estimated_monthly_waste: cost,
                metadata: BTreeMap::from([
                    ("age_days".to_string(), age_days.into()),
                    ("size_gib".to_string(), size_gib.into()),
                    ("source_disk".to_string(), snap.source_disk.as_str().into()),
                ]),
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::DiskSnapshot;
    use crate::scanner::mocks::MockCompute;
    use chrono::Duration;

    fn old_snapshot(id: u64, age_days: i64) -> DiskSnapshot {
        DiskSnapshot {
            id,
            name: format!("snap-{id}"),
            source_disk: "data-disk".to_string(),
            disk_size_gib: 200,
            create_time: Some(Utc::now() - Duration::days(age_days)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stale_snapshot_detected() {
        let compute = Arc::new(MockCompute {
            snapshots: vec![old_snapshot(30, 120)],
            ..Default::default()
        });
        let scanner = SnapshotScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();

        assert_eq!(result.findings.len(), 1);
        let finding = &result.findings[0];
        assert_eq!(finding.kind, FindingKind::StaleSnapshot);
        assert_eq!(finding.severity, Severity::Medium);
        // 200 GiB from the source disk size at the default region rate.
        assert!((finding.estimated_monthly_waste - 0.026 * 200.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_fresh_snapshot_skipped() {
        let compute = Arc::new(MockCompute {
            snapshots: vec![old_snapshot(31, 30)],
            ..Default::default()
        });
        let scanner = SnapshotScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn test_storage_bytes_round_up() {
        // 10 GiB plus one byte bills as 11 GiB.
        let mut snap = old_snapshot(32, 120);
        snap.storage_bytes = 10 * GIB + 1;
        let compute = Arc::new(MockCompute {
            snapshots: vec![snap],
            ..Default::default()
        });
        let scanner = SnapshotScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();

        assert_eq!(result.findings.len(), 1);
        assert!(result.findings[0].message.contains("11 GiB"));
    }

    #[tokio::test]
    async fn test_storage_bytes_exact_gib_no_round_up() {
        let mut snap = old_snapshot(33, 120);
        snap.storage_bytes = 10 * GIB;
        let compute = Arc::new(MockCompute {
            snapshots: vec![snap],
            ..Default::default()
        });
        let scanner = SnapshotScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();
        assert!(result.findings[0].message.contains("10 GiB"));
    }

    #[tokio::test]
    async fn test_storage_location_used_for_pricing_region() {
        let mut snap = old_snapshot(34, 120);
        snap.storage_locations = vec!["europe-west1".to_string()];
        let compute = Arc::new(MockCompute {
            snapshots: vec![snap],
            ..Default::default()
        });
        let scanner = SnapshotScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();
        assert_eq!(result.findings.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_without_create_time_skipped() {
        let mut snap = old_snapshot(35, 120);
        snap.create_time = None;
        let compute = Arc::new(MockCompute {
            snapshots: vec![snap],
            ..Default::default()
        });
        let scanner = SnapshotScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();
        assert!(result.findings.is_empty());
        assert_eq!(result.resources_scanned, 1);
    }

    #[tokio::test]
    async fn test_custom_stale_days_threshold() {
        let compute = Arc::new(MockCompute {
            snapshots: vec![old_snapshot(36, 45)],
            ..Default::default()
        });
        let cfg = ScanConfig {
            stale_days: 30,
            ..Default::default()
        };
        let scanner = SnapshotScanner::new(compute, "test-project");
        let result = scanner.scan(&cfg).await.unwrap();
        assert_eq!(result.findings.len(), 1);
    }
}
