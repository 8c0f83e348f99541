//! Detached persistent disk detection

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

const DETACHED_THRESHOLD_DAYS: i64 = 7;

/// Detects disks that have had no attached users for at least a week.
pub struct DiskScanner {
    compute: Arc<dyn ComputeLister>,
    project: String,
}

impl DiskScanner {
    pub fn new(compute: Arc<dyn ComputeLister>, project: impl Into<String>) -> Self {
        Self {
            compute,
            project: project.into(),
        }
    }
}

#[async_trait]
impl ResourceScanner for DiskScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PersistentDisk
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let disks = self
            .compute
            .list_disks(&self.project)
            .await
            .context("list disks")?;

        let mut result = ScanResult {
            resources_scanned: disks.len(),
            ..Default::default()
        };
        let now = Utc::now();

        for disk in &disks {
            let id = disk.id.to_string();
            if cfg.exclude.resource_ids.contains(&id) {
                continue;
            }
            if excluded_by_labels(&disk.labels, &cfg.exclude.labels) {
                continue;
            }

            if !disk.users.is_empty() {
                continue;
            }

            let Some(detached_since) = disk.last_attach.or(disk.create_time) else {
                continue;
            };
            let days_detached = (now - detached_since).num_days();
            if days_detached < DETACHED_THRESHOLD_DAYS {
                continue;
            }

            let cost = pricing::monthly_disk_cost(&disk.disk_type, disk.size_gib, &disk.zone);
            result.findings.push(Finding {
                kind: FindingKind::DetachedDisk,
                severity: Severity::High,
                resource_kind: ResourceKind::PersistentDisk,
                resource_id: id,
                resource_name: Some(disk.name.clone()),
                project: self.project.clone(),
                zone: Some(disk.zone.clone()),
                message: format!(
                    "Detached {days_detached} days, {} {} GiB",
                    disk.disk_type, disk.size_gib
                ),
                estimated_monthly_waste: cost,
                metadata: BTreeMap::from([
                    ("disk_type".to_string(), disk.disk_type.as_str().into()),
                    ("size_gib".to_string(), disk.size_gib.into()),
                    ("days_detached".to_string(), days_detached.into()),
                ]),
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::PersistentDisk;
    use crate::models::ExcludeConfig;
    use crate::scanner::mocks::MockCompute;
    use chrono::Duration;

    fn detached_disk(id: u64, days_old: i64) -> PersistentDisk {
        PersistentDisk {
            id,
            name: format!("disk-{id}"),
            zone: "us-central1-a".to_string(),
            disk_type: "pd-ssd".to_string(),
            size_gib: 100,
            status: "READY".to_string(),
            users: Vec::new(),
            create_time: Some(Utc::now() - Duration::days(days_old)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_detached_disk_detected() {
        let compute = Arc::new(MockCompute {
            disks: vec![detached_disk(10, 30)],
            ..Default::default()
        });
        let scanner = DiskScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();

        assert_eq!(result.findings.len(), 1);
        let finding = &result.findings[0];
        assert_eq!(finding.kind, FindingKind::DetachedDisk);
        assert_eq!(finding.severity, Severity::High);
        assert!((finding.estimated_monthly_waste - 17.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_attached_disk_skipped() {
        let mut disk = detached_disk(11, 30);
        disk.users = vec!["instances/web-1".to_string()];
        let compute = Arc::new(MockCompute {
            disks: vec![disk],
            ..Default::default()
        });
        let scanner = DiskScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();
        assert!(result.findings.is_empty());
        assert_eq!(result.resources_scanned, 1);
    }

    #[tokio::test]
    async fn test_recently_detached_skipped() {
        let compute = Arc::new(MockCompute {
            disks: vec![detached_disk(12, 3)],
            ..Default::default()
        });
        let scanner = DiskScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn test_last_attach_preferred_over_create_time() {
        let mut disk = detached_disk(13, 120);
        disk.last_attach = Some(Utc::now() - Duration::days(2));
        let compute = Arc::new(MockCompute {
            disks: vec![disk],
            ..Default::default()
        });
        let scanner = DiskScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn test_disk_without_timestamps_skipped() {
        let mut disk = detached_disk(14, 30);
        disk.create_time = None;
        disk.last_attach = None;
        let compute = Arc::new(MockCompute {
            disks: vec![disk],
            ..Default::default()
        });
        let scanner = DiskScanner::new(compute, "test-project");
        let result = scanner.scan(&ScanConfig::default()).await.unwrap();
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn test_excluded_disk_skipped() {
        let compute = Arc::new(MockCompute {
            disks: vec![detached_disk(15, 30)],
            ..Default::default()
        });
        let cfg = ScanConfig {
            exclude: ExcludeConfig {
                resource_ids: ["15".to_string()].into_iter().collect(),
                ..Default::default()
            },
            ..Default::default()
        };
        let scanner = DiskScanner::new(compute, "test-project");
        let result = scanner.scan(&cfg).await.unwrap();
        assert!(result.findings.is_empty());
    }
}
