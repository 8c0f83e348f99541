//! Core data model for waste findings and scan results

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a finding, ordered low < medium < high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Numeric rank used by the exit-code policy (low=1, medium=2, high=3).
    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Parse a severity name, mapping unknown strings to `Low`.
    pub fn parse_lenient(s: &str) -> Severity {
        match s {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The GCP resource class being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ComputeInstance,
    PersistentDisk,
    StaticIp,
    Snapshot,
    InstanceGroup,
    CloudSql,
    FirewallRule,
    CloudNat,
    CloudFunction,
    LoadBalancer,
    #[serde(rename = "pubsub")]
    PubSub,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::ComputeInstance => "compute_instance",
            ResourceKind::PersistentDisk => "persistent_disk",
            ResourceKind::StaticIp => "static_ip",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::InstanceGroup => "instance_group",
            ResourceKind::CloudSql => "cloud_sql",
            ResourceKind::FirewallRule => "firewall_rule",
            ResourceKind::CloudNat => "cloud_nat",
            ResourceKind::CloudFunction => "cloud_function",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::PubSub => "pubsub",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of waste a finding reports, one per (resource class, condition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    IdleInstance,
    StoppedInstance,
    DetachedDisk,
    UnusedAddress,
    StaleSnapshot,
    EmptyInstanceGroup,
    IdleCloudSql,
    UnusedFirewall,
    NatIdle,
    NatLowTraffic,
    FunctionIdle,
    LbIdle,
    LbUnhealthy,
    LbNoBackends,
    PubsubTopicIdle,
    PubsubTopicNoSubs,
    PubsubSubscriptionIdle,
    PubsubSubscriptionBacklog,
}

impl FindingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FindingKind::IdleInstance => "IDLE_INSTANCE",
            FindingKind::StoppedInstance => "STOPPED_INSTANCE",
            FindingKind::DetachedDisk => "DETACHED_DISK",
            FindingKind::UnusedAddress => "UNUSED_ADDRESS",
            FindingKind::StaleSnapshot => "STALE_SNAPSHOT",
            FindingKind::EmptyInstanceGroup => "EMPTY_INSTANCE_GROUP",
            FindingKind::IdleCloudSql => "IDLE_CLOUD_SQL",
            FindingKind::UnusedFirewall => "UNUSED_FIREWALL",
            FindingKind::NatIdle => "NAT_IDLE",
            FindingKind::NatLowTraffic => "NAT_LOW_TRAFFIC",
            FindingKind::FunctionIdle => "FUNCTION_IDLE",
            FindingKind::LbIdle => "LB_IDLE",
            FindingKind::LbUnhealthy => "LB_UNHEALTHY",
            FindingKind::LbNoBackends => "LB_NO_BACKENDS",
            FindingKind::PubsubTopicIdle => "PUBSUB_TOPIC_IDLE",
            FindingKind::PubsubTopicNoSubs => "PUBSUB_TOPIC_NO_SUBS",
            FindingKind::PubsubSubscriptionIdle => "PUBSUB_SUBSCRIPTION_IDLE",
            FindingKind::PubsubSubscriptionBacklog => "PUBSUB_SUBSCRIPTION_BACKLOG",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured evidence attached to a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Int(i64),
    Float(f64),
    List(Vec<String>),
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(v: Vec<String>) -> Self {
        MetadataValue::List(v)
    }
}

/// A single waste detection.
///
/// Findings are created by scanners and never mutated after emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub resource_kind: ResourceKind,
    /// Stable identifier, also the key used for resource-id exclusions.
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    pub project: String,
    /// Zone for zonal resources, region for regional ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Human-readable one-liner including the measured quantity.
    pub message: String,
    pub estimated_monthly_waste: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
}

/// Aggregated output of one or more scanners.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub findings: Vec<Finding>,
    /// Recoverable failures, formatted `"<project>/<resource_kind>: <message>"`
    /// (or `"<project>: <message>"` for project-level aborts).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Sum of per-scanner listing counts. Scanners that enumerate overlapping
    /// listings (the instance and firewall scanners both list instances) make
    /// this an imprecise, possibly double-counting total.
    pub resources_scanned: usize,
    pub projects_scanned: usize,
}

impl ScanResult {
    /// Fold another result into this one. Counts are added; the caller sets
    /// `projects_scanned` once at the end of a multi-project run.
    pub fn merge(&mut self, other: ScanResult) {
        self.findings.extend(other.findings);
        self.errors.extend(other.errors);
        self.resources_scanned += other.resources_scanned;
    }
}

/// Resource exclusion rules.
#[derive(Debug, Clone, Default)]
pub struct ExcludeConfig {
    /// Scanner-chosen stable IDs to skip entirely.
    pub resource_ids: HashSet<String>,
    /// Label filters; an empty value means "match any resource with this key".
    pub labels: HashMap<String, String>,
}

/// Parameters controlling scan behavior, immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Lookback window for utilization metrics, in days.
    pub idle_days: u32,
    /// Age threshold for stale snapshots, in days.
    pub stale_days: u32,
    /// Post-scan minimum monthly cost filter, in dollars.
    pub min_monthly_cost: f64,
    pub exclude: ExcludeConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            idle_days: 7,
            stale_days: 90,
            min_monthly_cost: 1.0,
            exclude: ExcludeConfig::default(),
        }
    }
}

/// Progress event reported once per (project, scanner) start.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub project: String,
    pub scanner: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(Severity::Low.rank(), 1);
        assert_eq!(Severity::Medium.rank(), 2);
        assert_eq!(Severity::High.rank(), 3);
    }

    #[test]
    fn test_severity_parse_lenient() {
        assert_eq!(Severity::parse_lenient("high"), Severity::High);
        assert_eq!(Severity::parse_lenient("medium"), Severity::Medium);
        assert_eq!(Severity::parse_lenient("low"), Severity::Low);
        assert_eq!(Severity::parse_lenient("bogus"), Severity::Low);
    }

    #[test]
    fn test_resource_kind_serde_strings() {
        let json = serde_json::to_string(&ResourceKind::PubSub).unwrap();
        assert_eq!(json, "\"pubsub\"");
        let json = serde_json::to_string(&ResourceKind::StaticIp).unwrap();
        assert_eq!(json, "\"static_ip\"");
        let parsed: ResourceKind = serde_json::from_str("\"cloud_nat\"").unwrap();
        assert_eq!(parsed, ResourceKind::CloudNat);
    }

    #[test]
    fn test_finding_kind_serde_strings() {
        let json = serde_json::to_string(&FindingKind::PubsubSubscriptionBacklog).unwrap();
        assert_eq!(json, "\"PUBSUB_SUBSCRIPTION_BACKLOG\"");
        let parsed: FindingKind = serde_json::from_str("\"LB_NO_BACKENDS\"").unwrap();
        assert_eq!(parsed, FindingKind::LbNoBackends);
    }

    #[test]
    fn test_finding_json_round_trip() {
        let finding = Finding {
            kind: FindingKind::IdleInstance,
            severity: Severity::High,
            resource_kind: ResourceKind::ComputeInstance,
            resource_id: "1234567890".to_string(),
            resource_name: Some("web-1".to_string()),
            project: "prod-project".to_string(),
            zone: Some("us-central1-a".to_string()),
            message: "CPU 2.0% over 7 days".to_string(),
            estimated_monthly_waste: 24.455,
            metadata: BTreeMap::from([
                ("machine_type".to_string(), MetadataValue::from("e2-medium")),
                ("avg_cpu_percent".to_string(), MetadataValue::from(2.5_f64)),
                ("days_stopped".to_string(), MetadataValue::from(31_i64)),
                (
                    "target_tags".to_string(),
                    MetadataValue::from(vec!["web".to_string()]),
                ),
            ]),
        };

        let json = serde_json::to_string(&finding).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, finding);
    }

    #[test]
    fn test_finding_omits_empty_optionals() {
        let finding = Finding {
            kind: FindingKind::UnusedFirewall,
            severity: Severity::Low,
            resource_kind: ResourceKind::FirewallRule,
            resource_id: "42".to_string(),
            resource_name: None,
            project: "p".to_string(),
            zone: None,
            message: "unused".to_string(),
            estimated_monthly_waste: 0.0,
            metadata: BTreeMap::new(),
        };
        let json = serde_json::to_string(&finding).unwrap();
        assert!(!json.contains("resource_name"));
        assert!(!json.contains("zone"));
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn test_scan_result_merge() {
        let mut combined = ScanResult::default();
        let a = ScanResult {
            resources_scanned: 3,
            errors: vec!["p/compute_instance: boom".to_string()],
            ..Default::default()
        };
        let b = ScanResult {
            resources_scanned: 2,
            ..Default::default()
        };

        combined.merge(a);
        combined.merge(b);
        assert_eq!(combined.resources_scanned, 5);
        assert_eq!(combined.errors.len(), 1);
    }
}
