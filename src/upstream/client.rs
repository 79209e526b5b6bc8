// HTTP client for the game API. Every request goes through `send`, which owns
// the throttling retry policy.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::UpstreamError;
use crate::metrics;
use crate::model::Collection;

use super::graphql::{
    self, AllianceDetail, AlliancesData, GraphqlResponse, NationDetail, NationsData, WarDetail,
    WarsData,
};
use super::tabular::{extract_first_entry, Table};
use super::{GameApi, SnapshotSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_MEMBER_PAGES: u32 = 20;

/// Bounded retry on HTTP 429. Other failures are returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(2),
        }
    }
}

#[derive(Clone)]
pub struct PnwClient {
    http: reqwest::Client,
    api_key: String,
    api_base_url: String,
    data_base_url: String,
    retry: RetryPolicy,
}

impl PnwClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base_url: impl Into<String>,
        data_base_url: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("raiden-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            data_base_url: data_base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        Self::new(&config.api_key, &config.api_base_url, &config.data_base_url)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Issue a request, retrying on throttling per the retry policy.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, UpstreamError> {
        let mut attempt = 1;
        loop {
            let pending = request
                .try_clone()
                .ok_or_else(|| UpstreamError::Decode("request body is not cloneable".into()))?;
            let response = pending.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < self.retry.max_attempts {
                    metrics::UPSTREAM_RETRIES_TOTAL.inc();
                    warn!(
                        "Upstream throttled (attempt {attempt}/{}), retrying in {:?}",
                        self.retry.max_attempts, self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(UpstreamError::Throttled);
            }
            if !status.is_success() {
                return Err(UpstreamError::Status(status.as_u16()));
            }
            return Ok(response);
        }
    }

    // ── Bulk files ────────────────────────────────────────────────────

    pub fn bulk_url(&self, collection: Collection, date: NaiveDate) -> String {
        format!(
            "{base}/{c}/{c}-{date}.csv.zip?key={key}",
            base = self.data_base_url,
            c = collection.as_str(),
            date = date.format("%Y-%m-%d"),
            key = self.api_key,
        )
    }

    /// Download a collection's file for `today`, falling back to the day before
    /// when today's file has not been published yet.
    pub async fn download_table_for(
        &self,
        collection: Collection,
        today: NaiveDate,
    ) -> Result<Table, UpstreamError> {
        let mut last_error = None;
        for date in [Some(today), today.pred_opt()].into_iter().flatten() {
            let request = self.http.get(self.bulk_url(collection, date));
            match self.send(request).await {
                Ok(response) => {
                    let bytes = response.bytes().await?;
                    debug!("Downloaded {collection} for {date} ({} bytes)", bytes.len());
                    return tokio::task::spawn_blocking(move || {
                        extract_first_entry(&bytes).map(|text| Table::parse(&text))
                    })
                    .await
                    .map_err(|e| UpstreamError::Decode(e.to_string()))?;
                }
                Err(UpstreamError::Status(code)) => {
                    debug!("No {collection} file for {date} (HTTP {code})");
                    last_error = Some(UpstreamError::Status(code));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(UpstreamError::Status(404)))
    }

    // ── GraphQL ───────────────────────────────────────────────────────

    async fn graphql<T: DeserializeOwned>(&self, query: String) -> Result<T, UpstreamError> {
        let url = format!("{}/graphql?api_key={}", self.api_base_url, self.api_key);
        let request = self.http.post(url).json(&serde_json::json!({ "query": query }));
        let response = self.send(request).await?;
        let body: GraphqlResponse<T> = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        if let Some(err) = body.errors.first() {
            return Err(UpstreamError::Decode(err.message.clone()));
        }
        body.data
            .ok_or_else(|| UpstreamError::Decode("response carried no data".into()))
    }
}

#[async_trait]
impl SnapshotSource for PnwClient {
    async fn fetch_table(&self, collection: Collection) -> Result<Table, UpstreamError> {
        self.download_table_for(collection, Utc::now().date_naive()).await
    }
}

#[async_trait]
impl GameApi for PnwClient {
    async fn nation(&self, id: i64) -> Result<Option<NationDetail>, UpstreamError> {
        let data: NationsData = self.graphql(graphql::nation_query(id)).await?;
        Ok(data.nations.data.into_iter().next())
    }

    async fn alliance(&self, id: i64) -> Result<Option<AllianceDetail>, UpstreamError> {
        let data: AlliancesData = self.graphql(graphql::alliance_query(id)).await?;
        Ok(data.alliances.data.into_iter().next())
    }

    async fn war(&self, id: i64) -> Result<Option<WarDetail>, UpstreamError> {
        let data: WarsData = self.graphql(graphql::war_query(id)).await?;
        Ok(data.wars.data.into_iter().next())
    }

    async fn alliance_members(&self, alliance_id: i64) -> Result<Vec<NationDetail>, UpstreamError> {
        let mut members = Vec::new();
        for page in 1..=MAX_MEMBER_PAGES {
            let data: NationsData = self
                .graphql(graphql::alliance_members_query(alliance_id, page))
                .await?;
            let more = data.nations.paginator_info.has_more_pages;
            members.extend(data.nations.data);
            if !more {
                return Ok(members);
            }
        }
        warn!(
            "Alliance {alliance_id} has more than {} members, audit is truncated",
            members.len()
        );
        Ok(members)
    }
}
