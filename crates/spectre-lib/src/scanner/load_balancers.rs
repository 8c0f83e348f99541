//! Load balancer waste detection
//!
//! Three conditions: backend services with no backends, backend services
//! with configured but unhealthy backends, and forwarding rules with no
//! request traffic. `resources_scanned` counts forwarding rules and backend
//! services combined.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::gcp::{ComputeLister, ForwardingRuleInfo, MetricSource};
use crate::models::{Finding, FindingKind, ResourceKind, ScanConfig, ScanResult, Severity};
use crate::pricing;

use super::ResourceScanner;

const REQUEST_COUNT_METRIC: &str = "loadbalancing.googleapis.com/https/request_count";
const DEFAULT_REGION: &str = "us-central1";

pub struct LoadBalancerScanner {
    compute: Arc<dyn ComputeLister>,
    monitoring: Arc<dyn MetricSource>,
    project: String,
}

impl LoadBalancerScanner {
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

    /// Backend services are global; price them at a representative region
    /// taken from the forwarding rules when one is available.
    fn representative_region(rules: &[ForwardingRuleInfo]) -> &str {
        rules
            .iter()
            .map(|r| r.region.as_str())
            .find(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REGION)
    }
}

#[async_trait]
impl ResourceScanner for LoadBalancerScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::LoadBalancer
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let forwarding_rules = self
            .compute
            .list_forwarding_rules(&self.project)
            .await
            .context("list forwarding rules")?;

        let backend_services = self
            .compute
            .list_backend_services(&self.project)
            .await
            .context("list backend services")?;

        let mut result = ScanResult {
            resources_scanned: forwarding_rules.len() + backend_services.len(),
            ..Default::default()
        };

        for bs in &backend_services {
            let id = bs.id.to_string();
            if cfg.exclude.resource_ids.contains(&id) {
                continue;
            }

            if bs.backends == 0 {
                let region = Self::representative_region(&forwarding_rules);
                let cost = pricing::monthly_lb_cost(region);
                result.findings.push(Finding {
                    kind: FindingKind::LbNoBackends,
                    severity: Severity::High,
                    resource_kind: ResourceKind::LoadBalancer,
                    resource_id: id.clone(),
                    resource_name: Some(bs.name.clone()),
                    project: self.project.clone(),
                    zone: None,
                    message: format!("Backend service {} has no backends configured", bs.name),
                    estimated_monthly_waste: cost,
                    metadata: BTreeMap::from([(
                        "protocol".to_string(),
                        bs.protocol.as_str().into(),
                    )]),
                });
            }

            if bs.backends > 0 && !bs.health_ok {
                result.findings.push(Finding {
                    kind: FindingKind::LbUnhealthy,
                    severity: Severity::High,
                    resource_kind: ResourceKind::LoadBalancer,
                    resource_id: id,
                    resource_name: Some(bs.name.clone()),
                    project: self.project.clone(),
                    zone: None,
                    message: format!("Backend service {} has unhealthy backends", bs.name),
                    estimated_monthly_waste: 0.0,
                    metadata: BTreeMap::from([
                        ("protocol".to_string(), bs.protocol.as_str().into()),
                        ("backends".to_string(), (bs.backends as i64).into()),
                    ]),
                });
            }
        }

        if forwarding_rules.is_empty() {
            return Ok(result);
        }

        let mut candidates = Vec::new();
        for rule in &forwarding_rules {
            let id = rule.id.to_string();
            if cfg.exclude.resource_ids.contains(&id) {
                continue;
            }
            candidates.push(rule);
        }
        if candidates.is_empty() {
            return Ok(result);
        }

        let names: Vec<String> = candidates.iter().map(|r| r.name.clone()).collect();
        let req_map = match self
            .monitoring
            .fetch_metric_mean(
                &self.project,
                REQUEST_COUNT_METRIC,
                "forwarding_rule_name",
                &names,
                cfg.idle_days,
            )
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to fetch LB request metrics");
                return Ok(result);
            }
        };

        for rule in candidates {
            let requests = req_map.get(&rule.name).copied();
            if requests.is_none() || requests == Some(0.0) {
                let cost = pricing::monthly_lb_cost(&rule.region);
                result.findings.push(Finding {
                    kind: FindingKind::LbIdle,
                    severity: Severity::Medium,
                    resource_kind: ResourceKind::LoadBalancer,
                    resource_id: rule.id.to_string(),
                    resource_name: Some(rule.name.clone()),
                    project: self.project.clone(),
                    zone: Some(rule.region.clone()),
                    message: format!(
                        "Forwarding rule {} has 0 requests over {} days",
                        rule.name, cfg.idle_days
                    ),
                    estimated_monthly_waste: cost,
                    metadata: BTreeMap::from([
                        ("ip_address".to_string(), rule.ip_address.as_str().into()),
                        (
                            "load_balancing_scheme".to_string(),
                            rule.load_balancing_scheme.as_str().into(),
                        ),
                    ]),
                });
            }
        }

        Ok(result)
    }
}
