//! Idle Cloud Function detection

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::gcp::{FunctionsLister, MetricSource};
use crate::models::{Finding, FindingKind, ResourceKind, ScanConfig, ScanResult, Severity};
use crate::pricing;

use super::exclude::excluded_by_labels;
use super::ResourceScanner;

const EXECUTION_COUNT_METRIC: &str = "cloudfunctions.googleapis.com/function/execution_count";

/// Detects ACTIVE functions with zero executions over the lookback window.
/// A function absent from the metric result counts as never invoked.
pub struct FunctionsScanner {
    functions: Option<Arc<dyn FunctionsLister>>,
    monitoring: Arc<dyn MetricSource>,
    project: String,
}

impl FunctionsScanner {
    pub fn new(
        functions: Option<Arc<dyn FunctionsLister>>,
        monitoring: Arc<dyn MetricSource>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            functions,
            monitoring,
            project: project.into(),
        }
    }
}

#[async_trait]
impl ResourceScanner for FunctionsScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CloudFunction
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let Some(functions) = &self.functions else {
            return Ok(ScanResult::default());
        };

        let fns = functions
            .list_functions(&self.project)
            .await
            .context("list functions")?;

        let mut result = ScanResult {
            resources_scanned: fns.len(),
            ..Default::default()
        };
        if fns.is_empty() {
            return Ok(result);
        }

        let mut active = Vec::new();
        for func in &fns {
            if cfg.exclude.resource_ids.contains(&func.name) {
                continue;
            }
            if excluded_by_labels(&func.labels, &cfg.exclude.labels) {
                continue;
            }
            if func.state == "ACTIVE" {
                active.push(func);
            }
        }

        if active.is_empty() {
            return Ok(result);
        }

        let names: Vec<String> = active.iter().map(|f| f.name.clone()).collect();
        let exec_map = match self
            .monitoring
            .fetch_metric_mean(
                &self.project,
                EXECUTION_COUNT_METRIC,
                "function_name",
                &names,
                cfg.idle_days,
            )
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to fetch function execution metrics");
                return Ok(result);
            }
        };

        for func in active {
            let executions = exec_map.get(&func.name).copied();
            if executions.is_none() || executions == Some(0.0) {
                let cost = pricing::monthly_function_cost(&func.region);
                result.findings.push(Finding {
                    kind: FindingKind::FunctionIdle,
                    severity: Severity::Medium,
                    resource_kind: ResourceKind::CloudFunction,
                    resource_id: func.name.clone(),
                    resource_name: Some(func.name.clone()),
                    project: self.project.clone(),
                    zone: Some(func.region.clone()),
                    message: format!(
                        "Cloud Function {} has 0 executions over {} days",
                        func.name, cfg.idle_days
                    ),
                    estimated_monthly_waste: cost,
                    metadata: BTreeMap::from([
                        ("runtime".to_string(), func.runtime.as_str().into()),
                        ("state".to_string(), func.state.as_str().into()),
                    ]),
                });
            }
        }

        Ok(result)
    }
}
