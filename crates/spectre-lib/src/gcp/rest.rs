//! Shared HTTP plumbing for the GCP REST clients.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::auth::TokenProvider;

/// Responses that may carry a continuation token.
pub(crate) trait Paged {
    fn take_next_page_token(&mut self) -> Option<String>;
}

/// Thin authenticated JSON client shared by all port implementations.
#[derive(Clone)]
pub(crate) struct RestClient {
    http: reqwest::Client,
    auth: Arc<TokenProvider>,
}

impl RestClient {
    pub(crate) fn new(auth: Arc<TokenProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gcpspectre/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self { http, auth })
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let token = self.auth.token().await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("GET {url}: {status}: {}", truncate_body(&body));
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("decode response from {url}"))
    }

    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let token = self.auth.token().await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("POST {url}: {status}: {}", truncate_body(&text));
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("decode response from {url}"))
    }

    /// Follow `nextPageToken` continuations, feeding each page through
    /// `extract` and concatenating the results.
    pub(crate) async fn paged<P, T, F>(
        &self,
        url: &str,
        base_query: &[(String, String)],
        mut extract: F,
    ) -> Result<Vec<T>>
    where
        P: DeserializeOwned + Paged,
        F: FnMut(P) -> Vec<T>,
    {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = base_query.to_vec();
            if let Some(token) = &page_token {
                query.push(("pageToken".to_string(), token.clone()));
            }

            let mut page: P = self.get_json(url, &query).await?;
            let next = page.take_next_page_token();
            out.extend(extract(page));

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(out)
    }
}

/// Last path segment of a URL-valued field ("…/zones/us-central1-a" -> "us-central1-a").
pub(crate) fn tail(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parse an RFC 3339 timestamp field, treating malformed values as absent.
pub(crate) fn parse_ts(value: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = value?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a stringly-typed uint64 field (the compute API encodes IDs as strings).
pub(crate) fn parse_u64(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Parse a stringly-typed int64 field (sizes, byte counts).
pub(crate) fn parse_i64(value: Option<&str>) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn truncate_body(body: &str) -> &str {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(400) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}
