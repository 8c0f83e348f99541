//! REST port implementations for the optional services
//!
//! Cloud SQL Admin, Cloud Functions (2nd gen), and Pub/Sub. Any of these may
//! be unavailable at startup; the orchestrator then runs the corresponding
//! scanner as a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use super::auth::TokenProvider;
use super::resources::{CloudFunction, CloudSqlInstance, PubSubSubscription, PubSubTopic};
use super::rest::{tail, Paged, RestClient};
use super::{CloudSqlLister, FunctionsLister, PubSubLister};

const SQLADMIN_BASE: &str = "https://sqladmin.googleapis.com/v1";
const FUNCTIONS_BASE: &str = "https://cloudfunctions.googleapis.com/v2";
const PUBSUB_BASE: &str = "https://pubsub.googleapis.com/v1";

/// `CloudSqlLister` backed by the SQL Admin v1 REST API.
pub struct GcpCloudSqlClient {
    rest: RestClient,
}

impl GcpCloudSqlClient {
    pub fn new(auth: Arc<TokenProvider>) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(auth)?,
        })
    }
}

#[async_trait]
impl CloudSqlLister for GcpCloudSqlClient {
    async fn list_sql_instances(&self, project: &str) -> Result<Vec<CloudSqlInstance>> {
        let url = format!("{SQLADMIN_BASE}/projects/{project}/instances");
        let dtos = self
            .rest
            .paged::<SqlInstanceList, SqlInstanceDto, _>(&url, &[], |page| page.items)
            .await?;

        Ok(dtos
            .into_iter()
            .map(|dto| {
                let settings = dto.settings.unwrap_or_default();
                CloudSqlInstance {
                    name: dto.name,
                    project: project.to_string(),
                    region: dto.region.unwrap_or_default(),
                    tier: settings.tier.unwrap_or_default(),
                    state: dto.state.unwrap_or_default(),
                    database_version: dto.database_version.unwrap_or_default(),
                    labels: settings.user_labels,
                }
            })
            .collect())
    }
}

/// `FunctionsLister` backed by the Cloud Functions v2 REST API.
pub struct GcpFunctionsClient {
    rest: RestClient,
}

impl GcpFunctionsClient {
    pub fn new(auth: Arc<TokenProvider>) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(auth)?,
        })
    }
}

#[async_trait]
impl FunctionsLister for GcpFunctionsClient {
    async fn list_functions(&self, project: &str) -> Result<Vec<CloudFunction>> {
        // "-" lists every location in one call.
        let url = format!("{FUNCTIONS_BASE}/projects/{project}/locations/-/functions");
        let dtos = self
            .rest
            .paged::<FunctionList, FunctionDto, _>(&url, &[], |page| page.functions)
            .await?;

        Ok(dtos
            .into_iter()
            .map(|dto| {
                // Full name: projects/{p}/locations/{region}/functions/{name}
                let region = dto
                    .name
                    .split('/')
                    .nth(3)
                    .unwrap_or_default()
                    .to_string();
                CloudFunction {
                    name: tail(&dto.name).to_string(),
                    region,
                    project: project.to_string(),
                    runtime: dto.build_config.unwrap_or_default().runtime.unwrap_or_default(),
                    state: dto.state.unwrap_or_default(),
                    labels: dto.labels,
                }
            })
            .collect())
    }
}

/// `PubSubLister` backed by the Pub/Sub v1 REST API.
pub struct GcpPubSubClient {
    rest: RestClient,
}

impl GcpPubSubClient {
    pub fn new(auth: Arc<TokenProvider>) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(auth)?,
        })
    }

    async fn count_subscriptions(&self, topic_full_name: &str) -> Result<usize> {
        let url = format!("{PUBSUB_BASE}/{topic_full_name}/subscriptions");
        let names = self
            .rest
            .paged::<TopicSubscriptionList, String, _>(&url, &[], |page| page.subscriptions)
            .await?;
        Ok(names.len())
    }
}

#[async_trait]
impl PubSubLister for GcpPubSubClient {
    async fn list_topics(&self, project: &str) -> Result<Vec<PubSubTopic>> {
        let url = format!("{PUBSUB_BASE}/projects/{project}/topics");
        let dtos = self
            .rest
            .paged::<TopicList, TopicDto, _>(&url, &[], |page| page.topics)
            .await?;

        let mut topics = Vec::with_capacity(dtos.len());
        for dto in dtos {
            let subscription_count = self.count_subscriptions(&dto.name).await?;
            topics.push(PubSubTopic {
                name: tail(&dto.name).to_string(),
                project: project.to_string(),
                labels: dto.labels,
                subscription_count,
            });
        }
        Ok(topics)
    }

    async fn list_subscriptions(&self, project: &str) -> Result<Vec<PubSubSubscription>> {
        let url = format!("{PUBSUB_BASE}/projects/{project}/subscriptions");
        let dtos = self
            .rest
            .paged::<SubscriptionList, SubscriptionDto, _>(&url, &[], |page| page.subscriptions)
            .await?;

        Ok(dtos
            .into_iter()
            .map(|dto| PubSubSubscription {
                name: tail(&dto.name).to_string(),
                topic: tail(&dto.topic).to_string(),
                project: project.to_string(),
                labels: dto.labels,
            })
            .collect())
    }
}

// --- wire DTOs ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SqlInstanceList {
    #[serde(default)]
    items: Vec<SqlInstanceDto>,
    next_page_token: Option<String>,
}

impl Paged for SqlInstanceList {
    fn take_next_page_token(&mut self) -> Option<String> {
        self.next_page_token.take()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SqlInstanceDto {
    #[serde(default)]
    name: String,
    region: Option<String>,
    state: Option<String>,
    database_version: Option<String>,
    settings: Option<SqlSettingsDto>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SqlSettingsDto {
    tier: Option<String>,
    #[serde(default)]
    user_labels: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionList {
    #[serde(default)]
    functions: Vec<FunctionDto>,
    next_page_token: Option<String>,
}

impl Paged for FunctionList {
    fn take_next_page_token(&mut self) -> Option<String> {
        self.next_page_token.take()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionDto {
    #[serde(default)]
    name: String,
    state: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
    build_config: Option<BuildConfigDto>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BuildConfigDto {
    runtime: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicList {
    #[serde(default)]
    topics: Vec<TopicDto>,
    next_page_token: Option<String>,
}

impl Paged for TopicList {
    fn take_next_page_token(&mut self) -> Option<String> {
        self.next_page_token.take()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicSubscriptionList {
    #[serde(default)]
    subscriptions: Vec<String>,
    next_page_token: Option<String>,
}

impl Paged for TopicSubscriptionList {
    fn take_next_page_token(&mut self) -> Option<String> {
        self.next_page_token.take()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionList {
    #[serde(default)]
    subscriptions: Vec<SubscriptionDto>,
    next_page_token: Option<String>,
}

impl Paged for SubscriptionList {
    fn take_next_page_token(&mut self) -> Option<String> {
        self.next_page_token.take()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_region_extracted_from_name() {
        let dto = FunctionDto {
            name: "projects/my-proj/locations/europe-west1/functions/resize".to_string(),
            state: Some("ACTIVE".to_string()),
            labels: HashMap::new(),
            build_config: Some(BuildConfigDto {
                runtime: Some("nodejs20".to_string()),
            }),
        };
        let region = dto.name.split('/').nth(3).unwrap_or_default();
        assert_eq!(region, "europe-west1");
        assert_eq!(tail(&dto.name), "resize");
    }

    #[test]
    fn test_sql_instance_decoding() {
        let json = r#"{
            "items": [{
                "name": "orders-db",
                "region": "us-central1",
                "state": "RUNNABLE",
                "databaseVersion": "POSTGRES_15",
                "settings": {"tier": "db-f1-micro", "userLabels": {"env": "dev"}}
            }]
        }"#;
        let list: SqlInstanceList = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 1);
        let settings = list.items[0].settings.as_ref().unwrap();
        assert_eq!(settings.tier.as_deref(), Some("db-f1-micro"));
        assert_eq!(settings.user_labels.get("env").map(String::as_str), Some("dev"));
    }
}
