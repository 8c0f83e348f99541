//! Resource scanners and the multi-project orchestrator
//!
//! One scanner per resource class, each a pure function of listings, metric
//! means, and the scan configuration. The orchestrator fans them out across
//! projects with bounded concurrency and aggregates partial failures.

mod addresses;
mod cloud_sql;
mod disks;
mod exclude;
mod firewalls;
mod functions;
mod instance_groups;
mod instances;
mod load_balancers;
mod nat;
mod orchestrator;
mod pubsub;
mod snapshots;

pub use addresses::AddressScanner;
pub use cloud_sql::CloudSqlScanner;
pub use disks::DiskScanner;
pub use exclude::excluded_by_labels;
pub use firewalls::FirewallScanner;
pub use functions::FunctionsScanner;
pub use instance_groups::InstanceGroupScanner;
pub use instances::InstanceScanner;
pub use load_balancers::LoadBalancerScanner;
pub use nat::NatScanner;
pub use orchestrator::{MultiProjectScanner, ProgressFn};
pub use pubsub::PubSubScanner;
pub use snapshots::SnapshotScanner;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ResourceKind, ScanConfig, ScanResult};

/// One resource-class scanner. Implementations list resources in a single
/// project, apply exclusions, and emit findings.
#[async_trait]
pub trait ResourceScanner: Send + Sync {
    /// The resource class this scanner audits.
    fn kind(&self) -> ResourceKind;

    /// Run the scan for this scanner's project. Listing failures propagate;
    /// metric failures are handled internally (the scan degrades to the
    /// findings that do not require the metric).
    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult>;
}
