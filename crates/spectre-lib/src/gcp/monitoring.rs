//! Cloud Monitoring REST port implementation
//!
//! Queries `timeSeries.list` with a mean aligner and a cross-series mean
//! reducer grouped by the resource label of interest, then averages the
//! returned points per series client-side.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::auth::TokenProvider;
use super::rest::{Paged, RestClient};
use super::MetricSource;

const MONITORING_BASE: &str = "https://monitoring.googleapis.com/v3";

/// Keep filter expressions bounded; large ID sets are queried in chunks.
const FILTER_CHUNK: usize = 20;

/// `MetricSource` backed by the Cloud Monitoring v3 REST API.
pub struct GcpMonitoringClient {
    rest: RestClient,
}

impl GcpMonitoringClient {
    pub fn new(auth: Arc<TokenProvider>) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(auth)?,
        })
    }

    async fn query_chunk(
        &self,
        project: &str,
        metric_type: &str,
        resource_label: &str,
        ids: &[String],
        lookback_days: u32,
    ) -> Result<HashMap<String, f64>> {
        let url = format!("{MONITORING_BASE}/projects/{project}/timeSeries");

        let id_clauses: Vec<String> = ids
            .iter()
            .map(|id| format!("resource.label.{resource_label} = \"{id}\""))
            .collect();
        let filter = format!(
            "metric.type = \"{metric_type}\" AND ({})",
            id_clauses.join(" OR ")
        );

        let end = Utc::now();
        let start = end - Duration::days(i64::from(lookback_days));

        let query = vec![
            ("filter".to_string(), filter),
            ("interval.startTime".to_string(), start.to_rfc3339()),
            ("interval.endTime".to_string(), end.to_rfc3339()),
            ("aggregation.alignmentPeriod".to_string(), "3600s".to_string()),
            (
                "aggregation.perSeriesAligner".to_string(),
                "ALIGN_MEAN".to_string(),
            ),
            (
                "aggregation.crossSeriesReducer".to_string(),
                "REDUCE_MEAN".to_string(),
            ),
            (
                "aggregation.groupByFields".to_string(),
                format!("resource.label.{resource_label}"),
            ),
        ];

        let label = resource_label.to_string();
        let series = self
            .rest
            .paged::<TimeSeriesList, (String, f64), _>(&url, &query, |page| {
                page.time_series
                    .into_iter()
                    .filter_map(|s| s.into_keyed_mean(&label))
                    .collect()
            })
            .await?;

        Ok(series.into_iter().collect())
    }
}

#[async_trait]
impl MetricSource for GcpMonitoringClient {
    async fn fetch_metric_mean(
        &self,
        project: &str,
        metric_type: &str,
        resource_label: &str,
        resource_ids: &[String],
        lookback_days: u32,
    ) -> Result<HashMap<String, f64>> {
        if resource_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut out = HashMap::new();
        for chunk in resource_ids.chunks(FILTER_CHUNK) {
            let partial = self
                .query_chunk(project, metric_type, resource_label, chunk, lookback_days)
                .await?;
            out.extend(partial);
        }
        Ok(out)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeriesList {
    #[serde(default)]
    time_series: Vec<SeriesDto>,
    next_page_token: Option<String>,
}

impl Paged for TimeSeriesList {
    fn take_next_page_token(&mut self) -> Option<String> {
        self.next_page_token.take()
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SeriesDto {
    #[serde(default)]
    resource: LabeledDto,
    #[serde(default)]
    metric: LabeledDto,
    #[serde(default)]
    points: Vec<PointDto>,
}

impl SeriesDto {
    /// Key the series by the grouped label and average its points.
    /// Series with no points or no matching label are dropped.
    fn into_keyed_mean(self, label: &str) -> Option<(String, f64)> {
        let key = self
            .resource
            .labels
            .get(label)
            .or_else(|| self.metric.labels.get(label))?
            .clone();

        let values: Vec<f64> = self.points.iter().filter_map(PointDto::value).collect();
        if values.is_empty() {
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some((key, mean))
    }
}

#[derive(Deserialize, Default)]
struct LabeledDto {
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointDto {
    #[serde(default)]
    value: TypedValueDto,
}

impl PointDto {
    fn value(&self) -> Option<f64> {
        if let Some(v) = self.value.double_value {
            return Some(v);
        }
        self.value
            .int64_value
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| v as f64)
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TypedValueDto {
    double_value: Option<f64>,
    /// int64 values arrive as JSON strings.
    int64_value: Option<String>,
}
