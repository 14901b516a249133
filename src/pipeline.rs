use chrono::{DateTime, Utc};
use tracing::warn;

use crate::client::ReportApiClient;
use crate::device::DeviceId;
use crate::filter::{dedupe_reports, is_report_on_route};
use crate::report::{ReportSubmission, TrafficReport};
use crate::store::{report_ttl, LocalReportCache};

/// The client-side report pipeline: one remote store, one durable local
/// cache, reconciled here.
///
/// Submission writes through to the cache on success and falls back to it on
/// failure; retrieval merges both sides, remote first, and dedupes. Neither
/// operation ever surfaces a remote failure to the caller.
pub struct TrafficReporter {
    client: ReportApiClient,
    cache: LocalReportCache,
    device_id: DeviceId,
    last_fetch: DateTime<Utc>,
}

impl TrafficReporter {
    /// A pipeline over the given remote client and local cache. The
    /// incremental-fetch high-water mark starts at construction time.
    pub fn new(client: ReportApiClient, cache: LocalReportCache, device_id: DeviceId) -> Self {
        Self {
            client,
            cache,
            device_id,
            last_fetch: Utc::now(),
        }
    }

    /// Submit a report, remote first.
    ///
    /// On success the server's copy is mirrored into the local cache so reads
    /// keep working offline. On any failure the report is synthesized locally
    /// with `local_only` set and only cached. One remote attempt per call, no
    /// retries; this never returns an error.
    pub async fn submit_traffic_report(&self, mut submission: ReportSubmission) -> TrafficReport {
        submission.device_id = Some(self.device_id.as_str().to_string());

        match self.client.submit(&submission).await {
            Ok(stored) => {
                if let Err(error) = self.cache.store(&stored) {
                    warn!(%error, "failed to mirror report into the local cache");
                }
                stored
            }
            Err(error) => {
                warn!(%error, "remote submission failed, storing report locally");
                let report = submission.into_local_report();
                if let Err(error) = self.cache.store(&report) {
                    warn!(%error, "failed to store report locally");
                }
                report
            }
        }
    }

    /// Reports relevant to the route from `start` to `end`.
    ///
    /// Remote results merged with the freshness- and relevance-filtered local
    /// cache, remote first, then deduped. On remote failure the local side
    /// alone is returned; an empty list is the minimum valid result.
    pub async fn reports_for_route(&self, start: &str, end: &str) -> Vec<TrafficReport> {
        let now = Utc::now();
        let local: Vec<TrafficReport> = self
            .cache
            .stored_reports()
            .into_iter()
            .filter(|report| is_fresh(report, now))
            .filter(|report| is_report_on_route(report, start, end))
            .collect();

        match self.client.reports_for_route(start, end).await {
            Ok(mut merged) => {
                merged.extend(local);
                dedupe_reports(merged)
            }
            Err(error) => {
                warn!(%error, "remote fetch failed, serving cached reports only");
                local
            }
        }
    }

    /// Reports created since the last successful incremental fetch.
    ///
    /// The high-water mark advances only on success, so a failed poll retries
    /// the same window on the next call. Remote failures yield an empty list.
    pub async fn new_reports(&mut self) -> Vec<TrafficReport> {
        let fetch_started = Utc::now();

        match self.client.reports_since(self.last_fetch).await {
            Ok(reports) => {
                self.last_fetch = fetch_started;
                reports
            }
            Err(error) => {
                warn!(%error, "incremental fetch failed");
                Vec::new()
            }
        }
    }
}

/// Client-side freshness rule: a report older than the TTL is no longer
/// shown, whether or not the server ever stamped it with an expiry.
fn is_fresh(report: &TrafficReport, now: DateTime<Utc>) -> bool {
    now - report.timestamp <= report_ttl()
}
