//! Unused firewall rule detection

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::gcp::ComputeLister;
use crate::models::{Finding, FindingKind, ResourceKind, ScanConfig, ScanResult, Severity};

use super::ResourceScanner;

/// Detects enabled firewall rules whose target tags match no running
/// instance. Rules without target tags apply to the whole network and are
/// never flagged.
pub struct FirewallScanner {
    compute: Arc<dyn ComputeLister>,
    project: String,
}

impl FirewallScanner {
    pub fn new(compute: Arc<dyn ComputeLister>, project: impl Into<String>) -> Self {
        Self {
            compute,
            project: project.into(),
        }
    }

    /// Union of network tags across running instances in the project.
    async fn collect_running_tags(&self) -> Result<HashSet<String>> {
        let instances = self.compute.list_instances(&self.project).await?;
        let mut tags = HashSet::new();
        for inst in instances {
            if inst.status != "RUNNING" {
                continue;
            }
            tags.extend(inst.tags);
        }
        Ok(tags)
    }
}

#[async_trait]
impl ResourceScanner for FirewallScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::FirewallRule
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let rules = self
            .compute
            .list_firewalls(&self.project)
            .await
            .context("list firewalls")?;

        let mut result = ScanResult {
            resources_scanned: rules.len(),
            ..Default::default()
        };
        if rules.is_empty() {
            return Ok(result);
        }

        let used_tags = match self.collect_running_tags().await {
            Ok(tags) => tags,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to list instances for tag check");
                return Ok(result);
            }
        };

        for rule in &rules {
            let id = rule.id.to_string();
            if cfg.exclude.resource_ids.contains(&id) {
                continue;
            }
            if rule.disabled {
                continue;
            }
            if rule.target_tags.is_empty() {
                continue;
            }

            let any_used = rule.target_tags.iter().any(|t| used_tags.contains(t));
            if !any_used {
                result.findings.push(Finding {
                    kind: FindingKind::UnusedFirewall,
                    severity: Severity::Low,
                    resource_kind: ResourceKind::FirewallRule,
                    resource_id: id,
                    resource_name: Some(rule.name.clone()),
                    project: self.project.clone(),
                    zone: None,
                    message: format!(
                        "Firewall rule targets tags {:?} but no instances use them",
                        rule.target_tags
                    ),
                    estimated_monthly_waste: 0.0,
                    metadata: BTreeMap::from([
                        ("network".to_string(), rule.network.as_str().into()),
                        ("direction".to_string(), rule.direction.as_str().into()),
                        ("target_tags".to_string(), rule.target_tags.clone().into()),
                    ]),
                });
            }
        }

        Ok(result)
    }
}
