//! Plain data shapes returned by the listing ports.
//!
//! These are the only representations the scanners see; the REST clients
//! translate SDK wire formats into them (URL-valued fields reduced to their
//! trailing segment, stringly-typed numbers parsed).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// A Compute Engine VM instance.
#[derive(Debug, Clone, Default)]
pub struct ComputeInstance {
    pub id: u64,
    pub name: String,
    pub zone: String,
    pub project: String,
    /// Short machine type name, e.g. "e2-medium".
    pub machine_type: String,
    /// RUNNING, STOPPED, TERMINATED, ...
    pub status: String,
    pub labels: HashMap<String, String>,
    /// Network tags, matched against firewall rule target tags.
    pub tags: Vec<String>,
    pub last_started: Option<DateTime<Utc>>,
    pub create_time: Option<DateTime<Utc>>,
}

/// A persistent disk.
#[derive(Debug, Clone, Default)]
pub struct PersistentDisk {
    pub id: u64,
    pub name: String,
    pub zone: String,
    pub project: String,
    /// "pd-standard", "pd-balanced", "pd-ssd", ...
    pub disk_type: String,
    pub size_gib: i64,
    pub status: String,
    /// Instances the disk is attached to; empty means detached.
    pub users: Vec<String>,
    pub labels: HashMap<String, String>,
    pub last_attach: Option<DateTime<Utc>>,
    pub create_time: Option<DateTime<Utc>>,
}

/// A static IP address reservation.
#[derive(Debug, Clone, Default)]
pub struct StaticAddress {
    pub id: u64,
    pub name: String,
    pub region: String,
    pub project: String,
    pub address: String,
    /// IN_USE or RESERVED.
    pub status: String,
    /// INTERNAL or EXTERNAL.
    pub address_type: String,
}

/// A disk snapshot.
#[derive(Debug, Clone, Default)]
pub struct DiskSnapshot {
    pub id: u64,
    pub name: String,
    pub project: String,
    pub source_disk: String,
    pub disk_size_gib: i64,
    /// Actual billed bytes; 0 when the API does not report it.
    pub storage_bytes: i64,
    pub labels: HashMap<String, String>,
    pub create_time: Option<DateTime<Utc>>,
    pub storage_locations: Vec<String>,
}

/// An instance group (managed or unmanaged).
#[derive(Debug, Clone, Default)]
pub struct InstanceGroupInfo {
    pub id: u64,
    pub name: String,
    pub zone: String,
    pub project: String,
    pub size: usize,
    pub is_managed: bool,
}

/// A Cloud SQL instance.
#[derive(Debug, Clone, Default)]
pub struct CloudSqlInstance {
    pub name: String,
    pub project: String,
    pub region: String,
    /// Pricing tier, e.g. "db-f1-micro".
    pub tier: String,
    /// RUNNABLE, STOPPED, ...
    pub state: String,
    pub database_version: String,
    pub labels: HashMap<String, String>,
}

/// A VPC firewall rule.
#[derive(Debug, Clone, Default)]
pub struct FirewallRule {
    pub id: u64,
    pub name: String,
    pub project: String,
    pub network: String,
    /// INGRESS or EGRESS.
    pub direction: String,
    pub priority: i64,
    pub target_tags: Vec<String>,
    pub disabled: bool,
}

/// A Cloud Router with its NAT configurations.
#[derive(Debug, Clone, Default)]
pub struct RouterInfo {
    pub id: u64,
    pub name: String,
    pub region: String,
    pub project: String,
    pub nats: Vec<NatConfig>,
}

/// A single Cloud NAT gateway configured on a router.
#[derive(Debug, Clone, Default)]
pub struct NatConfig {
    pub name: String,
}

/// A Cloud Function (2nd gen).
#[derive(Debug, Clone, Default)]
pub struct CloudFunction {
    pub name: String,
    pub region: String,
    pub project: String,
    pub runtime: String,
    /// ACTIVE, DEPLOYING, ...
    pub state: String,
    pub labels: HashMap<String, String>,
}

/// A load-balancer forwarding rule.
#[derive(Debug, Clone, Default)]
pub struct ForwardingRuleInfo {
    pub id: u64,
    pub name: String,
    pub region: String,
    pub project: String,
    pub target: String,
    pub ip_address: String,
    pub load_balancing_scheme: String,
}

/// A load-balancer backend service.
#[derive(Debug, Clone)]
pub struct BackendServiceInfo {
    pub id: u64,
    pub name: String,
    pub project: String,
    /// Number of configured backend groups.
    pub backends: usize,
    pub protocol: String,
    pub health_ok: bool,
}

impl Default for BackendServiceInfo {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            project: String::new(),
            backends: 0,
            protocol: String::new(),
            // A backend service is assumed healthy until a health check says
            // otherwise, so a monitoring hiccup cannot fabricate findings.
            health_ok: true,
        }
    }
}

/// A Pub/Sub topic.
#[derive(Debug, Clone, Default)]
pub struct PubSubTopic {
    pub name: String,
    pub project: String,
    pub labels: HashMap<String, String>,
    pub subscription_count: usize,
}

/// A Pub/Sub subscription.
#[derive(Debug, Clone, Default)]
pub struct PubSubSubscription {
    pub name: String,
    /// Short name of the topic this subscription is attached to.
    pub topic: String,
    pub project: String,
    pub labels: HashMap<String, String>,
}
