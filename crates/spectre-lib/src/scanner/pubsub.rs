//! Idle Pub/Sub topic and subscription detection
//!
//! Topics with no subscriptions are orphans; subscribed topics with no
//! publishes are idle. Subscriptions with no pull or push activity are idle;
//! active subscriptions with a large undelivered backlog point at a dead
//! consumer. A backlog metric failure is tolerated (backlog treated as 0).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::gcp::{MetricSource, PubSubLister, PubSubSubscription, PubSubTopic};
use crate::models::{Finding, FindingKind, ResourceKind, ScanConfig, ScanResult, Severity};
use crate::pricing;

use super::exclude::excluded_by_labels;
use super::ResourceScanner;

const TOPIC_SEND_METRIC: &str = "pubsub.googleapis.com/topic/send_message_operation_count";
const SUB_PULL_METRIC: &str = "pubsub.googleapis.com/subscription/pull_message_operation_count";
const SUB_PUSH_METRIC: &str = "pubsub.googleapis.com/subscription/push_request_count";
const SUB_BACKLOG_METRIC: &str = "pubsub.googleapis.com/subscription/num_undelivered_messages";

/// Undelivered messages above which an otherwise active subscription is
/// treated as having a dead consumer.
const BACKLOG_THRESHOLD: f64 = 10_000.0;

pub struct PubSubScanner {
    pubsub: Option<Arc<dyn PubSubLister>>,
    monitoring: Arc<dyn MetricSource>,
    project: String,
}

impl PubSubScanner {
    pub fn new(
        pubsub: Option<Arc<dyn PubSubLister>>,
        monitoring: Arc<dyn MetricSource>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            pubsub,
            monitoring,
            project: project.into(),
        }
    }

    async fn scan_topics(
        &self,
        cfg: &ScanConfig,
        topics: &[PubSubTopic],
        result: &mut ScanResult,
    ) {
        let mut subscribed = Vec::new();
        for topic in topics {
            if cfg.exclude.resource_ids.contains(&topic.name) {
                continue;
            }
            if excluded_by_labels(&topic.labels, &cfg.exclude.labels) {
                continue;
            }

            if topic.subscription_count == 0 {
                result.findings.push(Finding {
                    kind: FindingKind::PubsubTopicNoSubs,
                    severity: Severity::Medium,
                    resource_kind: ResourceKind::PubSub,
                    resource_id: topic.name.clone(),
                    resource_name: Some(topic.name.clone()),
                    project: self.project.clone(),
                    zone: None,
                    message: format!("Topic {} has no subscriptions", topic.name),
                    estimated_monthly_waste: 0.0,
                    metadata: BTreeMap::from([("resource_kind".to_string(), "topic".into())]),
                });
            } else {
                subscribed.push(topic);
            }
        }

        if subscribed.is_empty() {
            return;
        }

        let names: Vec<String> = subscribed.iter().map(|t| t.name.clone()).collect();
        let send_map = match self
            .monitoring
            .fetch_metric_mean(
                &self.project,
                TOPIC_SEND_METRIC,
                "topic_id",
                &names,
                cfg.idle_days,
            )
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to fetch Pub/Sub topic metrics");
                return;
            }
        };

        for topic in subscribed {
            let sends = send_map.get(&topic.name).copied();
            if sends.is_none() || sends == Some(0.0) {
                result.findings.push(Finding {
                    kind: FindingKind::PubsubTopicIdle,
                    severity: Severity::Medium,
                    resource_kind: ResourceKind::PubSub,
                    resource_id: topic.name.clone(),
                    resource_name: Some(topic.name.clone()),
                    project: self.project.clone(),
                    zone: None,
                    message: format!(
                        "Topic {} has 0 messages published over {} days",
                        topic.name, cfg.idle_days
                    ),
                    estimated_monthly_waste: 0.0,
                    metadata: BTreeMap::from([
                        ("resource_kind".to_string(), "topic".into()),
                        (
                            "subscription_count".to_string(),
                            (topic.subscription_count as i64).into(),
                        ),
                    ]),
                });
            }
        }
    }

    async fn scan_subscriptions(
        &self,
        cfg: &ScanConfig,
        subs: &[PubSubSubscription],
        result: &mut ScanResult,
    ) {
        let mut candidates = Vec::new();
        for sub in subs {
            if cfg.exclude.resource_ids.contains(&sub.name) {
                continue;
            }
            if excluded_by_labels(&sub.labels, &cfg.exclude.labels) {
                continue;
            }
            candidates.push(sub);
        }
        if candidates.is_empty() {
            return;
        }

        let names: Vec<String> = candidates.iter().map(|s| s.name.clone()).collect();

        let pull_map = match self
            .monitoring
            .fetch_metric_mean(&self.project, SUB_PULL_METRIC, "subscription_id", &names, cfg.idle_days)
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to fetch Pub/Sub pull metrics");
                return;
            }
        };

        let push_map = match self
            .monitoring
            .fetch_metric_mean(&self.project, SUB_PUSH_METRIC, "subscription_id", &names, cfg.idle_days)
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to fetch Pub/Sub push metrics");
                return;
            }
        };

        // Backlog is best-effort: a failure here must not abort the scan.
        let backlog_map = match self
            .monitoring
            .fetch_metric_mean(&self.project, SUB_BACKLOG_METRIC, "subscription_id", &names, cfg.idle_days)
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(project = %self.project, error = %err, "Failed to fetch Pub/Sub backlog metrics");
                HashMap::new()
            }
        };

        for sub in candidates {
            let pull = pull_map.get(&sub.name).copied().unwrap_or(0.0);
            let push = push_map.get(&sub.name).copied().unwrap_or(0.0);
            let backlog = backlog_map.get(&sub.name).copied().unwrap_or(0.0);

            if pull == 0.0 && push == 0.0 {
                let cost = pricing::monthly_pubsub_subscription_cost();
                result.findings.push(Finding {
                    kind: FindingKind::PubsubSubscriptionIdle,
                    severity: Severity::Medium,
                    resource_kind: ResourceKind::PubSub,
                    resource_id: sub.name.clone(),
                    resource_name: Some(sub.name.clone()),
                    project: self.project.clone(),
                    zone: None,
                    message: format!(
                        "Subscription {} has 0 pull/push activity over {} days",
                        sub.name, cfg.idle_days
                    ),
                    estimated_monthly_waste: cost,
                    metadata: BTreeMap::from([
                        ("resource_kind".to_string(), "subscription".into()),
                        ("topic".to_string(), sub.topic.as_str().into()),
                        ("backlog".to_string(), backlog.into()),
                    ]),
                });
                continue;
            }

            if backlog > BACKLOG_THRESHOLD {
                result.findings.push(Finding {
                    kind: FindingKind::PubsubSubscriptionBacklog,
                    severity: Severity::High,
                    resource_kind: ResourceKind::PubSub,
                    resource_id: sub.name.clone(),
                    resource_name: Some(sub.name.clone()),
                    project: self.project.clone(),
                    zone: None,
                    message: format!(
                        "Subscription {} has {backlog:.0} undelivered messages (consumer may be dead)",
                        sub.name
                    ),
                    estimated_monthly_waste: 0.0,
                    metadata: BTreeMap::from([
                        ("resource_kind".to_string(), "subscription".into()),
                        ("topic".to_string(), sub.topic.as_str().into()),
                        ("undelivered_messages".to_string(), backlog.into()),
                    ]),
                });
            }
        }
    }
}

#[async_trait]
impl ResourceScanner for PubSubScanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PubSub
    }

    async fn scan(&self, cfg: &ScanConfig) -> Result<ScanResult> {
        let Some(pubsub) = &self.pubsub else {
            return Ok(ScanResult::default());
        };

        let topics = pubsub
            .list_topics(&self.project)
            .await
            .context("list topics")?;
        let subscriptions = pubsub
            .list_subscriptions(&self.project)
            .await
            .context("list subscriptions")?;

        let mut result = ScanResult {
            resources_scanned: topics.len() + subscriptions.len(),
            ..Default::default()
        };

        self.scan_topics(cfg, &topics, &mut result).await;
        self.scan_subscriptions(cfg, &subscriptions, &mut result)
            .await;

        Ok(result)
    }
}
