//! End-to-end scan scenarios through the orchestrator, analyzer, and
//! report envelope, using in-memory port implementations.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use spectre_lib::analyzer::{analyze, AnalyzerConfig};
use spectre_lib::gcp::{
    BackendServiceInfo, CloudFunction, CloudSqlInstance, CloudSqlLister, ComputeInstance,
    ComputeLister, DiskSnapshot, FirewallRule, ForwardingRuleInfo, FunctionsLister,
    InstanceGroupInfo, MetricSource, NatConfig, PersistentDisk, PubSubLister, PubSubSubscription,
    PubSubTopic, RouterInfo, StaticAddress,
};
use spectre_lib::report::ReportData;
use spectre_lib::{FindingKind, MultiProjectScanner, ScanConfig, Severity};

#[derive(Default)]
struct FakeCompute {
    instances: Vec<ComputeInstance>,
    disks: Vec<PersistentDisk>,
    addresses: Vec<StaticAddress>,
    snapshots: Vec<DiskSnapshot>,
    routers: Vec<RouterInfo>,
    fail_disks: bool,
}

#[async_trait]
impl ComputeLister for FakeCompute {
    async fn list_instances(&self, _project: &str) -> Result<Vec<ComputeInstance>> {
        Ok(self.instances.clone())
    }

    async fn list_disks(&self, _project: &str) -> Result<Vec<PersistentDisk>> {
        if self.fail_disks {
            bail!("429 RESOURCE_EXHAUSTED");
        }
        Ok(self.disks.clone())
    }

    async fn list_addresses(&self, _project: &str) -> Result<Vec<StaticAddress>> {
        Ok(self.addresses.clone())
    }

    async fn list_snapshots(&self, _project: &str) -> Result<Vec<DiskSnapshot>> {
        Ok(self.snapshots.clone())
    }

    async fn list_instance_groups(&self, _project: &str) -> Result<Vec<InstanceGroupInfo>> {
        Ok(Vec::new())
    }

    async fn list_firewalls(&self, _project: &str) -> Result<Vec<FirewallRule>> {
        Ok(Vec::new())
    }

    async fn list_routers(&self, _project: &str) -> Result<Vec<RouterInfo>> {
        Ok(self.routers.clone())
    }

    async fn list_forwarding_rules(&self, _project: &str) -> Result<Vec<ForwardingRuleInfo>> {
        Ok(Vec::new())
    }

    async fn list_backend_services(&self, _project: &str) -> Result<Vec<BackendServiceInfo>> {
        Ok(Vec::new())
    }
}

/// Metric source keyed by metric type.
#[derive(Default)]
struct FakeMetrics {
    results: HashMap<String, HashMap<String, f64>>,
}

impl FakeMetrics {
    fn insert(&mut self, metric: &str, values: &[(&str, f64)]) {
        self.results.insert(
            metric.to_string(),
            values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        );
    }
}

#[async_trait]
impl MetricSource for FakeMetrics {
    async fn fetch_metric_mean(
        &self,
        _project: &str,
        metric_type: &str,
        _resource_label: &str,
        resource_ids: &[String],
        _lookback_days: u32,
    ) -> Result<HashMap<String, f64>> {
        if resource_ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self.results.get(metric_type).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct FakePubSub {
    subscriptions: Vec<PubSubSubscription>,
}

#[async_trait]
impl PubSubLister for FakePubSub {
    async fn list_topics(&self, _project: &str) -> Result<Vec<PubSubTopic>> {
        Ok(Vec::new())
    }

    async fn list_subscriptions(&self, _project: &str) -> Result<Vec<PubSubSubscription>> {
        Ok(self.subscriptions.clone())
    }
}

#[derive(Default)]
struct FakeCloudSql {
    instances: Vec<CloudSqlInstance>,
}

#[async_trait]
impl CloudSqlLister for FakeCloudSql {
    async fn list_sql_instances(&self, _project: &str) -> Result<Vec<CloudSqlInstance>> {
        Ok(self.instances.clone())
    }
}

#[derive(Default)]
struct FakeFunctions;

#[async_trait]
impl FunctionsLister for FakeFunctions {
    async fn list_functions(&self, _project: &str) -> Result<Vec<CloudFunction>> {
        Ok(Vec::new())
    }
}

fn scanner_for(
    compute: FakeCompute,
    metrics: FakeMetrics,
    projects: &[&str],
) -> MultiProjectScanner {
    MultiProjectScanner::new(
        Arc::new(compute),
        Arc::new(metrics),
        projects.iter().map(|p| p.to_string()).collect(),
        2,
        ScanConfig::default(),
    )
}

#[tokio::test]
async fn idle_instance_scenario() {
    let compute = FakeCompute {
        instances: vec![ComputeInstance {
            id: 1,
            name: "web-1".to_string(),
            zone: "us-central1-a".to_string(),
            machine_type: "e2-medium".to_string(),
            status: "RUNNING".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut metrics = FakeMetrics::default();
    metrics.insert(
        "compute.googleapis.com/instance/cpu/utilization",
        &[("1", 0.02)],
    );

    let result = scanner_for(compute, metrics, &["demo"]).scan_all().await.unwrap();

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.kind, FindingKind::IdleInstance);
    assert_eq!(finding.severity, Severity::High);
    assert!(finding.message.contains("CPU 2.0%"));
    assert!((finding.estimated_monthly_waste - 0.0335 * 730.0).abs() < 0.01);
}

#[tokio::test]
async fn stopped_instance_create_time_fallback_scenario() {
    let compute = FakeCompute {
        instances: vec![ComputeInstance {
            id: 2,
            name: "batch-old".to_string(),
            zone: "us-central1-a".to_string(),
            machine_type: "n1-standard-1".to_string(),
            status: "STOPPED".to_string(),
            last_started: None,
            create_time: Some(Utc::now() - Duration::days(90)),
            ..Default::default()
        }],
        ..Default::default()
    };

    let result = scanner_for(compute, FakeMetrics::default(), &["demo"])
        .scan_all()
        .await
        .unwrap();

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].kind, FindingKind::StoppedInstance);
    assert_eq!(result.findings[0].severity, Severity::High);
}

#[tokio::test]
async fn detached_disk_scenario() {
    let compute = FakeCompute {
        disks: vec![PersistentDisk {
            id: 3,
            name: "orphan-data".to_string(),
            zone: "us-central1-a".to_string(),
            disk_type: "pd-ssd".to_string(),
            size_gib: 100,
            users: Vec::new(),
            create_time: Some(Utc::now() - Duration::days(30)),
            ..Default::default()
        }],
        ..Default::default()
    };

    let result = scanner_for(compute, FakeMetrics::default(), &["demo"])
        .scan_all()
        .await
        .unwrap();

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.kind, FindingKind::DetachedDisk);
    assert!((finding.estimated_monthly_waste - 17.0).abs() < 0.001);
}

#[tokio::test]
async fn unused_address_scenario() {
    let compute = FakeCompute {
        addresses: vec![StaticAddress {
            id: 4,
            name: "stale-ip".to_string(),
            region: "us-central1".to_string(),
            address: "203.0.113.4".to_string(),
            status: "RESERVED".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    };

    let result = scanner_for(compute, FakeMetrics::default(), &["demo"])
        .scan_all()
        .await
        .unwrap();

    assert_eq!(result.findings.len(), 1);
    assert!((result.findings[0].estimated_monthly_waste - 7.30).abs() < 0.001);
}

#[tokio::test]
async fn empty_nat_scenario() {
    let compute = FakeCompute {
        routers: vec![RouterInfo {
            id: 5,
            name: "edge-router".to_string(),
            region: "us-central1".to_string(),
            nats: vec![NatConfig {
                name: "edge-nat".to_string(),
            }],
            ..Default::default()
        }],
        ..Default::default()
    };

    let result = scanner_for(compute, FakeMetrics::default(), &["demo"])
        .scan_all()
        .await
        .unwrap();

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].kind, FindingKind::NatIdle);
}

#[tokio::test]
async fn subscription_backlog_scenario() {
    let mut metrics = FakeMetrics::default();
    metrics.insert(
        "pubsub.googleapis.com/subscription/pull_message_operation_count",
        &[("orders-sub", 100.0)],
    );
    metrics.insert(
        "pubsub.googleapis.com/subscription/push_request_count",
        &[("orders-sub", 0.0)],
    );
    metrics.insert(
        "pubsub.googleapis.com/subscription/num_undelivered_messages",
        &[("orders-sub", 50_000.0)],
    );

    let scanner = scanner_for(FakeCompute::default(), metrics, &["demo"]).with_pubsub(Arc::new(
        FakePubSub {
            subscriptions: vec![PubSubSubscription {
                name: "orders-sub".to_string(),
                topic: "orders".to_string(),
                ..Default::default()
            }],
        },
    ));

    let result = scanner.scan_all().await.unwrap();

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.kind, FindingKind::PubsubSubscriptionBacklog);
    assert_eq!(finding.severity, Severity::High);
    assert!(result
        .findings
        .iter()
        .all(|f| f.kind != FindingKind::PubsubSubscriptionIdle));
}

#[tokio::test]
async fn partial_failure_keeps_sibling_findings() {
    let compute = FakeCompute {
        addresses: vec![StaticAddress {
            id: 6,
            name: "stale-ip".to_string(),
            region: "us-central1".to_string(),
            address: "203.0.113.6".to_string(),
            status: "RESERVED".to_string(),
            ..Default::default()
        }],
        fail_disks: true,
        ..Default::default()
    };

    let result = scanner_for(compute, FakeMetrics::default(), &["demo"])
        .scan_all()
        .await
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("demo/persistent_disk: "));
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].kind, FindingKind::UnusedAddress);
}

#[tokio::test]
async fn analyze_and_report_pipeline() {
    let compute = FakeCompute {
        instances: vec![ComputeInstance {
            id: 7,
            name: "web-1".to_string(),
            zone: "us-central1-a".to_string(),
            machine_type: "e2-medium".to_string(),
            status: "RUNNING".to_string(),
            ..Default::default()
        }],
        addresses: vec![StaticAddress {
            id: 8,
            name: "stale-ip".to_string(),
            region: "us-central1".to_string(),
            address: "203.0.113.8".to_string(),
            status: "RESERVED".to_string(),
            ..Default::default()
        }],
        fail_disks: true,
        ..Default::default()
    };
    let mut metrics = FakeMetrics::default();
    metrics.insert(
        "compute.googleapis.com/instance/cpu/utilization",
        &[("7", 0.01)],
    );

    let projects = vec!["proj-a".to_string(), "proj-b".to_string()];
    let scanner = MultiProjectScanner::new(
        Arc::new(compute),
        Arc::new(metrics),
        projects.clone(),
        4,
        ScanConfig::default(),
    );
    let result = scanner.scan_all().await.unwrap();
    assert_eq!(result.projects_scanned, 2);

    let analysis = analyze(&result, &AnalyzerConfig { min_monthly_cost: 1.0 });
    assert_eq!(analysis.summary.total_findings, analysis.findings.len());
    let waste: f64 = analysis
        .findings
        .iter()
        .map(|f| f.estimated_monthly_waste)
        .sum();
    assert!((waste - analysis.summary.total_monthly_waste).abs() < 1e-9);

    let data = ReportData::build("gcpspectre", "0.0.0-test", &projects, 7, 90, 1.0, analysis);
    assert_eq!(data.target.kind, "gcp-projects");
    assert!(data.target.uri_hash.starts_with("sha256:"));
    // Two error entries, one per project's failed disk listing.
    assert_eq!(data.errors.len(), 2);
    assert!(data.errors.iter().all(|e| e.recoverable));
    assert!(data
        .errors
        .iter()
        .all(|e| e.resource_kind.as_deref() == Some("persistent_disk")));

    // The envelope must survive a JSON round trip without field loss.
    let json = serde_json::to_string_pretty(&data).unwrap();
    let back: ReportData = serde_json::from_str(&json).unwrap();
    assert_eq!(back.findings, data.findings);
    assert_eq!(back.target, data.target);
}

#[tokio::test]
async fn optional_capabilities_scan_when_attached() {
    let mut metrics = FakeMetrics::default();
    metrics.insert(
        "cloudsql.googleapis.com/database/cpu/utilization",
        &[("sleepy-db", 0.01)],
    );

    let scanner = scanner_for(FakeCompute::default(), metrics, &["demo"])
        .with_cloud_sql(Arc::new(FakeCloudSql {
            instances: vec![CloudSqlInstance {
                name: "sleepy-db".to_string(),
                region: "us-central1".to_string(),
                tier: "db-f1-micro".to_string(),
                state: "RUNNABLE".to_string(),
                ..Default::default()
            }],
        }))
        .with_functions(Arc::new(FakeFunctions));

    let result = scanner.scan_all().await.unwrap();
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].kind, FindingKind::IdleCloudSql);
}
