//! GCP listing and monitoring ports
//!
//! The scanners depend only on the narrow trait capabilities declared here;
//! the REST submodules implement them against the public GCP APIs. The core
//! never sees HTTP, auth, or pagination.

mod auth;
mod compute;
mod monitoring;
mod resources;
mod rest;
mod services;

pub use auth::TokenProvider;
pub use compute::GcpComputeClient;
pub use monitoring::GcpMonitoringClient;
pub use resources::{
    BackendServiceInfo, CloudFunction, CloudSqlInstance, ComputeInstance, DiskSnapshot,
    FirewallRule, ForwardingRuleInfo, InstanceGroupInfo, NatConfig, PersistentDisk, PubSubTopic,
    PubSubSubscription, RouterInfo, StaticAddress,
};
pub use services::{GcpCloudSqlClient, GcpFunctionsClient, GcpPubSubClient};

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

/// Compute Engine list operations, one per resource listing the scanners need.
#[async_trait]
pub trait ComputeLister: Send + Sync {
    async fn list_instances(&self, project: &str) -> Result<Vec<ComputeInstance>>;
    async fn list_disks(&self, project: &str) -> Result<Vec<PersistentDisk>>;
    async fn list_addresses(&self, project: &str) -> Result<Vec<StaticAddress>>;
    async fn list_snapshots(&self, project: &str) -> Result<Vec<DiskSnapshot>>;
    async fn list_instance_groups(&self, project: &str) -> Result<Vec<InstanceGroupInfo>>;
    async fn list_firewalls(&self, project: &str) -> Result<Vec<FirewallRule>>;
    async fn list_routers(&self, project: &str) -> Result<Vec<RouterInfo>>;
    async fn list_forwarding_rules(&self, project: &str) -> Result<Vec<ForwardingRuleInfo>>;
    async fn list_backend_services(&self, project: &str) -> Result<Vec<BackendServiceInfo>>;
}

/// Cloud SQL Admin list operations. Optional capability: when unavailable at
/// startup the Cloud SQL scanner becomes a no-op.
#[async_trait]
pub trait CloudSqlLister: Send + Sync {
    async fn list_sql_instances(&self, project: &str) -> Result<Vec<CloudSqlInstance>>;
}

/// Cloud Functions list operations. Optional capability.
#[async_trait]
pub trait FunctionsLister: Send + Sync {
    async fn list_functions(&self, project: &str) -> Result<Vec<CloudFunction>>;
}

/// Pub/Sub list operations. Optional capability.
#[async_trait]
pub trait PubSubLister: Send + Sync {
    async fn list_topics(&self, project: &str) -> Result<Vec<PubSubTopic>>;
    async fn list_subscriptions(&self, project: &str) -> Result<Vec<PubSubSubscription>>;
}

/// Cloud Monitoring metric queries.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Fetch the mean of a time series over `[now - lookback_days, now]`,
    /// keyed by the given resource label.
    ///
    /// An empty `resource_ids` slice returns an empty map. Resources with no
    /// data points are absent from the result, which is distinct from a zero
    /// mean.
    async fn fetch_metric_mean(
        &self,
        project: &str,
        metric_type: &str,
        resource_label: &str,
        resource_ids: &[String],
        lookback_days: u32,
    ) -> Result<HashMap<String, f64>>;
}
