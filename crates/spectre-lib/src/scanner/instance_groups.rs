//! Empty instance group detection

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::gcp::ComputeLister;
use crate::models::{Finding, FindingKind, MetadataValue, ResourceKind, ScanConfig, ScanResult, Severity};

use super::ResourceScanner;

/// Detects instance groups with zero members. No cost is attributed; an
/// empty group is free but usually forgotten wiring.
pub struct InstanceGroupScanner {
    compute: Arc<dyn ComputeLister>,
    project: String,
}

impl InstanceGroupScanner {
    pub fn new(compute: Arc<dyn ComputeLister>, project: impl Into<String>) -> Self {
        Self {
            compute,
            project: project.into(),
        }
    }
}

#[async_trait]
impl ResourceScanner for InstanceGroupScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::InstanceGroup
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let groups = self
            .compute
            .list_instance_groups(&self.project)
            .await
            .context("list instance groups")?;

        let mut result = ScanResult {
            resources_scanned: groups.len(),
            ..Default::default()
        };

        for group in &groups {
            let id = group.id.to_string();
            if cfg.exclude.resource_ids.contains(&id) {
                continue;
            }

            if group.size == 0 {
                result.findings.push(Finding {
                    kind: FindingKind::EmptyInstanceGroup,
                    severity: Severity::Medium,
                    resource_kind: ResourceKind::InstanceGroup,
                    resource_id: id,
                    resource_name: Some(group.name.clone()),
                    project: self.project.clone(),
                    zone: Some(group.zone.clone()),
                    message: "Instance group has 0 instances".to_string(),
                    estimated_monthly_waste: 0.0,
                    metadata: BTreeMap::from([(
                        "is_managed".to_string(),
                        MetadataValue::Text(group.is_managed.to_string()),
                    )]),
                });
            }
        }

        Ok(result)
    }
}
