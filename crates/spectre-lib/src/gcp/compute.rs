//! Compute Engine REST port implementation
//!
//! Uses the aggregated list endpoints where resources are zonal/regional and
//! the global list endpoints otherwise. Backend-service health is filled via
//! best-effort `getHealth` calls per backend group.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::auth::TokenProvider;
use super::resources::{
    BackendServiceInfo, ComputeInstance, DiskSnapshot, FirewallRule, ForwardingRuleInfo,
    InstanceGroupInfo, NatConfig, PersistentDisk, RouterInfo, StaticAddress,
};
use super::rest::{parse_i64, parse_ts, parse_u64, tail, Paged, RestClient};
use super::ComputeLister;

const COMPUTE_BASE: &str = "https://compute.googleapis.com/compute/v1";

/// `ComputeLister` backed by the Compute Engine v1 REST API.
pub struct GcpComputeClient {
    rest: RestClient,
}

impl GcpComputeClient {
    pub fn new(auth: Arc<TokenProvider>) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(auth)?,
        })
    }

    async fn aggregated<S, T, F>(&self, project: &str, collection: &str, extract: F) -> Result<Vec<T>>
    where
        S: serde::de::DeserializeOwned + Default,
        F: FnMut(S) -> Vec<T> + Copy,
    {
        let url = format!("{COMPUTE_BASE}/projects/{project}/aggregated/{collection}");
        self.rest
            .paged::<AggregatedList<S>, T, _>(&url, &[], move |page| {
                page.items.into_values().flat_map(extract).collect()
            })
            .await
    }

    async fn backend_health_ok(&self, service_url: &str, groups: &[String]) -> bool {
        for group in groups {
            let url = format!("{service_url}/getHealth");
            let body = GetHealthRequest {
                group: group.clone(),
            };
            match self
                .rest
                .post_json::<GetHealthRequest, GetHealthResponse>(&url, &body)
                .await
            {
                Ok(resp) => {
                    let any_healthy = resp
                        .health_status
                        .iter()
                        .any(|h| h.health_state.as_deref() == Some("HEALTHY"));
                    if !resp.health_status.is_empty() && !any_healthy {
                        return false;
                    }
                }
                Err(err) => {
                    // Health is advisory; a failed probe must not turn into a
                    // spurious LB_UNHEALTHY finding.
                    debug!(group = %group, error = %err, "Backend health probe failed");
                }
            }
        }
        true
    }
}

#[async_trait]
impl ComputeLister for GcpComputeClient {
    async fn list_instances(&self, project: &str) -> Result<Vec<ComputeInstance>> {
        let dtos = self
            .aggregated::<InstanceScope, InstanceDto, _>(project, "instances", |scope| {
                scope.instances
            })
            .await?;
        Ok(dtos
            .into_iter()
            .map(|dto| dto.into_instance(project))
            .collect())
    }

    async fn list_disks(&self, project: &str) -> Result<Vec<PersistentDisk>> {
        let dtos = self
            .aggregated::<DiskScope, DiskDto, _>(project, "disks", |scope| scope.disks)
            .await?;
        Ok(dtos.into_iter().map(|dto| dto.into_disk(project)).collect())
    }

    async fn list_addresses(&self, project: &str) -> Result<Vec<StaticAddress>> {
        let dtos = self
            .aggregated::<AddressScope, AddressDto, _>(project, "addresses", |scope| {
                scope.addresses
            })
            .await?;
        Ok(dtos
            .into_iter()
            .map(|dto| dto.into_address(project))
            .collect())
    }

    async fn list_snapshots(&self, project: &str) -> Result<Vec<DiskSnapshot>> {
        let url = format!("{COMPUTE_BASE}/projects/{project}/global/snapshots");
        let dtos = self
            .rest
            .paged::<ItemList<SnapshotDto>, SnapshotDto, _>(&url, &[], |page| page.items)
            .await?;
        Ok(dtos
            .into_iter()
            .map(|dto| dto.into_snapshot(project))
            .collect())
    }

    async fn list_instance_groups(&self, project: &str) -> Result<Vec<InstanceGroupInfo>> {
        // Managed groups are listed separately; matching on name marks them.
        let managers = self
            .aggregated::<ManagerScope, ManagerDto, _>(project, "instanceGroupManagers", |s| {
                s.instance_group_managers
            })
            .await?;
        let managed_names: HashSet<String> = managers.into_iter().map(|m| m.name).collect();

        let dtos = self
            .aggregated::<GroupScope, GroupDto, _>(project, "instanceGroups", |scope| {
                scope.instance_groups
            })
            .await?;
        Ok(dtos
            .into_iter()
            .map(|dto| {
                let is_managed = managed_names.contains(&dto.name);
                dto.into_group(project, is_managed)
            })
            .collect())
    }

    async fn list_firewalls(&self, project: &str) -> Result<Vec<FirewallRule>> {
        let url = format!("{COMPUTE_BASE}/projects/{project}/global/firewalls");
        let dtos = self
            .rest
            .paged::<ItemList<FirewallDto>, FirewallDto, _>(&url, &[], |page| page.items)
            .await?;
        Ok(dtos
            .into_iter()
            .map(|dto| dto.into_firewall(project))
            .collect())
    }

    async fn list_routers(&self, project: &str) -> Result<Vec<RouterInfo>> {
        let dtos = self
            .aggregated::<RouterScope, RouterDto, _>(project, "routers", |scope| scope.routers)
            .await?;
        Ok(dtos
            .into_iter()
            .map(|dto| dto.into_router(project))
            .collect())
    }

    async fn list_forwarding_rules(&self, project: &str) -> Result<Vec<ForwardingRuleInfo>> {
        let dtos = self
            .aggregated::<ForwardingRuleScope, ForwardingRuleDto, _>(
                project,
                "forwardingRules",
                |scope| scope.forwarding_rules,
            )
            .await?;
        Ok(dtos
            .into_iter()
            .map(|dto| dto.into_rule(project))
            .collect())
    }

    async fn list_backend_services(&self, project: &str) -> Result<Vec<BackendServiceInfo>> {
        let dtos = self
            .aggregated::<BackendServiceScope, BackendServiceDto, _>(
                project,
                "backendServices",
                |scope| scope.backend_services,
            )
            .await?;

        let mut services = Vec::with_capacity(dtos.len());
        for dto in dtos {
            let groups: Vec<String> = dto.backends.iter().filter_map(|b| b.group.clone()).collect();
            let health_ok = if groups.is_empty() {
                true
            } else {
                match &dto.self_link {
                    Some(link) => self.backend_health_ok(link, &groups).await,
                    None => true,
                }
            };
            services.push(BackendServiceInfo {
                id: parse_u64(dto.id.as_deref()),
                name: dto.name,
                project: project.to_string(),
                backends: dto.backends.len(),
                protocol: dto.protocol.unwrap_or_default(),
                health_ok,
            });
        }
        Ok(services)
    }
}

// --- wire DTOs ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedList<S> {
    #[serde(default)]
    items: HashMap<String, S>,
    next_page_token: Option<String>,
}

impl<S> Paged for AggregatedList<S> {
    fn take_next_page_token(&mut self) -> Option<String> {
        self.next_page_token.take()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemList<T> {
    #[serde(default)]
    items: Vec<T>,
    next_page_token: Option<String>,
}

impl<T> Paged for ItemList<T> {
    fn take_next_page_token(&mut self) -> Option<String> {
        self.next_page_token.take()
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct InstanceScope {
    #[serde(default)]
    instances: Vec<InstanceDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    zone: Option<String>,
    machine_type: Option<String>,
    status: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
    tags: Option<TagsDto>,
    last_start_timestamp: Option<String>,
    creation_timestamp: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TagsDto {
    #[serde(default)]
    items: Vec<String>,
}

impl InstanceDto {
    fn into_instance(self, project: &str) -> ComputeInstance {
        ComputeInstance {
            id: parse_u64(self.id.as_deref()),
            name: self.name,
            zone: self.zone.as_deref().map(tail).unwrap_or_default().to_string(),
            project: project.to_string(),
            machine_type: self
                .machine_type
                .as_deref()
                .map(tail)
                .unwrap_or_default()
                .to_string(),
            status: self.status.unwrap_or_default(),
            labels: self.labels,
            tags: self.tags.unwrap_or_default().items,
            last_started: parse_ts(self.last_start_timestamp.as_deref()),
            create_time: parse_ts(self.creation_timestamp.as_deref()),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DiskScope {
    #[serde(default)]
    disks: Vec<DiskDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiskDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    zone: Option<String>,
    #[serde(rename = "type")]
    disk_type: Option<String>,
    size_gb: Option<String>,
    status: Option<String>,
    #[serde(default)]
    users: Vec<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
    last_attach_timestamp: Option<String>,
    creation_timestamp: Option<String>,
}

impl DiskDto {
    fn into_disk(self, project: &str) -> PersistentDisk {
        PersistentDisk {
            id: parse_u64(self.id.as_deref()),
            name: self.name,
            zone: self.zone.as_deref().map(tail).unwrap_or_default().to_string(),
            project: project.to_string(),
            disk_type: self
                .disk_type
                .as_deref()
                .map(tail)
                .unwrap_or_default()
                .to_string(),
            size_gib: parse_i64(self.size_gb.as_deref()),
            status: self.status.unwrap_or_default(),
            users: self.users,
            labels: self.labels,
            last_attach: parse_ts(self.last_attach_timestamp.as_deref()),
            create_time: parse_ts(self.creation_timestamp.as_deref()),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AddressScope {
    #[serde(default)]
    addresses: Vec<AddressDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    region: Option<String>,
    #[serde(default)]
    address: String,
    status: Option<String>,
    address_type: Option<String>,
}

impl AddressDto {
    fn into_address(self, project: &str) -> StaticAddress {
        StaticAddress {
            id: parse_u64(self.id.as_deref()),
            name: self.name,
            region: self
                .region
                .as_deref()
                .map(tail)
                .unwrap_or_default()
                .to_string(),
            project: project.to_string(),
            address: self.address,
            status: self.status.unwrap_or_default(),
            address_type: self.address_type.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SnapshotDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    source_disk: String,
    disk_size_gb: Option<String>,
    storage_bytes: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
    creation_timestamp: Option<String>,
    #[serde(default)]
    storage_locations: Vec<String>,
}

impl SnapshotDto {
    fn into_snapshot(self, project: &str) -> DiskSnapshot {
        DiskSnapshot {
            id: parse_u64(self.id.as_deref()),
            name: self.name,
            project: project.to_string(),
            source_disk: tail(&self.source_disk).to_string(),
            disk_size_gib: parse_i64(self.disk_size_gb.as_deref()),
            storage_bytes: parse_i64(self.storage_bytes.as_deref()),
            labels: self.labels,
            create_time: parse_ts(self.creation_timestamp.as_deref()),
            storage_locations: self.storage_locations,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroupScope {
    #[serde(default)]
    instance_groups: Vec<GroupDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    zone: Option<String>,
    #[serde(default)]
    size: usize,
}

impl GroupDto {
    fn into_group(self, project: &str, is_managed: bool) -> InstanceGroupInfo {
        InstanceGroupInfo {
            id: parse_u64(self.id.as_deref()),
            name: self.name,
            zone: self.zone.as_deref().map(tail).unwrap_or_default().to_string(),
            project: project.to_string(),
            size: self.size,
            is_managed,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ManagerScope {
    #[serde(default)]
    instance_group_managers: Vec<ManagerDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagerDto {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FirewallDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    network: String,
    #[serde(default)]
    direction: String,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    target_tags: Vec<String>,
    #[serde(default)]
    disabled: bool,
}

impl FirewallDto {
    fn into_firewall(self, project: &str) -> FirewallRule {
        FirewallRule {
            id: parse_u64(self.id.as_deref()),
            name: self.name,
            project: project.to_string(),
            network: tail(&self.network).to_string(),
            direction: self.direction,
            priority: self.priority,
            target_tags: self.target_tags,
            disabled: self.disabled,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RouterScope {
    #[serde(default)]
    routers: Vec<RouterDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouterDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    region: Option<String>,
    #[serde(default)]
    nats: Vec<RouterNatDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouterNatDto {
    #[serde(default)]
    name: String,
}

impl RouterDto {
    fn into_router(self, project: &str) -> RouterInfo {
        RouterInfo {
            id: parse_u64(self.id.as_deref()),
            name: self.name,
            region: self
                .region
                .as_deref()
                .map(tail)
                .unwrap_or_default()
                .to_string(),
            project: project.to_string(),
            nats: self
                .nats
                .into_iter()
                .map(|n| NatConfig { name: n.name })
                .collect(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ForwardingRuleScope {
    #[serde(default)]
    forwarding_rules: Vec<ForwardingRuleDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForwardingRuleDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    region: Option<String>,
    #[serde(default)]
    target: String,
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
    #[serde(default)]
    load_balancing_scheme: String,
}

impl ForwardingRuleDto {
    fn into_rule(self, project: &str) -> ForwardingRuleInfo {
        ForwardingRuleInfo {
            id: parse_u64(self.id.as_deref()),
            name: self.name,
            region: self
                .region
                .as_deref()
                .map(tail)
                .unwrap_or_default()
                .to_string(),
            project: project.to_string(),
            target: tail(&self.target).to_string(),
            ip_address: self.ip_address,
            load_balancing_scheme: self.load_balancing_scheme,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BackendServiceScope {
    #[serde(default)]
    backend_services: Vec<BackendServiceDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendServiceDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    backends: Vec<BackendDto>,
    protocol: Option<String>,
    self_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendDto {
    group: Option<String>,
}

#[derive(serde::Serialize)]
struct GetHealthRequest {
    group: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GetHealthResponse {
    #[serde(default)]
    health_status: Vec<HealthStatusDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatusDto {
    health_state: Option<String>,
}
