//! Unused static IP address detection

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::gcp::ComputeLister;
use crate::models::{Finding, FindingKind, ResourceKind, ScanConfig, ScanResult, Severity};
use crate::pricing;

use super::ResourceScanner;

/// Detects reserved static IPs that are not bound to any resource.
pub struct AddressScanner {
    compute: Arc<dyn ComputeLister>,
    project: String,
}

impl AddressScanner {
    pub fn new(compute: Arc<dyn ComputeLister>, project: impl Into<String>) -> Self {
        Self {
            compute,
            project: project.into(),
        }
    }
}

#[async_trait]
impl ResourceScanner for AddressScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::StaticIp
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let addresses = self
            .compute
            .list_addresses(&self.project)
            .await
            .context("list addresses")?;

        let mut result = ScanResult {
            resources_scanned: addresses.len(),
            ..Default::default()
        };

        for addr in &addresses {
            let id = addr.id.to_string();
            if cfg.exclude.resource_ids.contains(&id) {
                continue;
            }

            if addr.status != "RESERVED" {
                continue;
            }

            let cost = pricing::monthly_address_cost(&addr.region);
            result.findings.push(Finding {
                kind: FindingKind::UnusedAddress,
                severity: Severity::Medium,
                resource_kind: ResourceKind::StaticIp,
                resource_id: id,
                resource_name: Some(addr.name.clone()),
                project: self.project.clone(),
                zone: Some(addr.region.clone()),
                message: format!("Static IP {} not associated with any resource", addr.address),
                estimated_monthly_waste: cost,
                metadata: BTreeMap::from([
                    ("address".to_string(), addr.address.as_str().into()),
                    ("address_type".to_string(), addr.address_type.as_str().into()),
                    ("region".to_string(), addr.region.as_str().into()),
                ]),
            });
        }

        Ok(result)
    }
}
