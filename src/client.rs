use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::report::{ReportSubmission, TrafficReport};

/// Client for the `/traffic-reports` endpoint.
///
/// Exactly one attempt per call, no retries; the pipelines decide what a
/// failure means.
#[derive(Debug, Clone)]
pub struct ReportApiClient {
    client: Client,
    base_url: String,
}

impl ReportApiClient {
    /// A client against `base_url`, e.g. `http://localhost:8788`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/traffic-reports", self.base_url.trim_end_matches('/'))
    }

    /// Submit a report; the server assigns id, timestamp, and expiry.
    pub async fn submit(&self, submission: &ReportSubmission) -> Result<TrafficReport> {
        let response = self
            .client
            .post(self.endpoint())
            .json(submission)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Fetch non-expired reports relevant to the given route.
    pub async fn reports_for_route(&self, start: &str, end: &str) -> Result<Vec<TrafficReport>> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("start", start), ("end", end)])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Fetch reports created strictly after `since`.
    pub async fn reports_since(&self, since: DateTime<Utc>) -> Result<Vec<TrafficReport>> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("since", since.timestamp_millis().to_string())])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Ask the server to purge expired reports.
    pub async fn cleanup(&self) -> Result<bool> {
        #[derive(Deserialize)]
        struct Cleaned {
            cleaned: bool,
        }

        let response = self
            .client
            .delete(self.endpoint())
            .send()
            .await?
            .error_for_status()?;

        let body: Cleaned = response.json().await?;
        Ok(body.cleaned)
    }
}
