use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::filter::is_report_on_route;
use crate::report::{generate_report_id, ReportSubmission, TrafficReport};

use super::report_ttl;

/// How a [`MemoryReportStore`] query selects reports, in priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportFilter {
    /// Reports created strictly after the given instant; route is ignored.
    Since(DateTime<Utc>),
    /// Reports passing the relevance filter against the querying route.
    Route {
        /// Route start, `"lat,lon"`.
        start: String,
        /// Route end, `"lat,lon"`.
        end: String,
    },
    /// Every non-expired report.
    All,
}

/// The server-side report store.
///
/// Lives for the hosting process only; no durability across restarts. Shared
/// across concurrent handler invocations, so the map sits behind a mutex.
/// Reports are independent, so per-call locking is all the coordination
/// queries and inserts need.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: Mutex<HashMap<String, TrafficReport>>,
}

impl MemoryReportStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a submission, assigning id, creation timestamp, and expiry.
    /// Returns the stored copy with every field populated.
    pub fn create(&self, submission: ReportSubmission) -> TrafficReport {
        let now = Utc::now();
        let report = TrafficReport {
            id: generate_report_id(),
            timestamp: now,
            expires_at: Some(now + report_ttl()),
            route: submission.route,
            location: submission.location,
            kind: submission.kind,
            severity: submission.severity,
            description: submission.description,
            device_id: submission.device_id,
            local_only: false,
        };

        let mut reports = self.reports.lock().expect("report store lock poisoned");
        reports.insert(report.id.clone(), report.clone());

        report
    }

    /// Query non-expired reports. Expired entries are purged as a side
    /// effect. Results are ordered by creation time.
    pub fn query(&self, filter: &ReportFilter) -> Vec<TrafficReport> {
        let now = Utc::now();
        let mut reports = self.reports.lock().expect("report store lock poisoned");
        reports.retain(|_, report| !is_expired(report, now));

        let mut matches: Vec<TrafficReport> = reports
            .values()
            .filter(|report| match filter {
                ReportFilter::Since(since) => report.timestamp > *since,
                ReportFilter::Route { start, end } => is_report_on_route(report, start, end),
                ReportFilter::All => true,
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches
    }

    /// Drop every expired report, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut reports = self.reports.lock().expect("report store lock poisoned");
        let before = reports.len();
        reports.retain(|_, report| !is_expired(report, now));
        before - reports.len()
    }
}

fn is_expired(report: &TrafficReport, now: DateTime<Utc>) -> bool {
    match report.expires_at {
        Some(expires_at) => expires_at <= now,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::report::{ReportType, Severity};
    use chrono::Duration;

    fn submission_at(lat: f64, lon: f64) -> ReportSubmission {
        ReportSubmission {
            route: None,
            location: Some(GeoPoint::new(lat, lon)),
            kind: ReportType::TrafficJam,
            severity: Severity::Medium,
            description: None,
            device_id: Some("device-1".to_string()),
        }
    }

    fn seed(store: &MemoryReportStore, report: TrafficReport) {
        store
            .reports
            .lock()
            .unwrap()
            .insert(report.id.clone(), report);
    }

    #[test]
    fn test_create_populates_every_field() {
        let store = MemoryReportStore::new();
        let stored = store.create(submission_at(40.0, -74.0));

        assert!(!stored.id.is_empty());
        assert_eq!(stored.expires_at, Some(stored.timestamp + report_ttl()));
        assert!(!stored.local_only);
    }

    #[test]
    fn test_route_query_matches_only_nearby_reports() {
        let store = MemoryReportStore::new();
        let stored = store.create(submission_at(40.0, -74.0));

        let nearby = store.query(&ReportFilter::Route {
            start: "40.0,-74.0".to_string(),
            end: "41.0,-74.0".to_string(),
        });
        assert_eq!(nearby, vec![stored]);

        let far = store.query(&ReportFilter::Route {
            start: "10,10".to_string(),
            end: "11,11".to_string(),
        });
        assert!(far.is_empty());
    }

    #[test]
    fn test_since_query_ignores_route() {
        let store = MemoryReportStore::new();
        let stored = store.create(submission_at(40.0, -74.0));

        let since = store.query(&ReportFilter::Since(stored.timestamp - Duration::seconds(1)));
        assert_eq!(since, vec![stored.clone()]);

        let nothing_newer = store.query(&ReportFilter::Since(stored.timestamp));
        assert!(nothing_newer.is_empty());
    }

    #[test]
    fn test_expired_reports_are_dropped_and_purged() {
        let store = MemoryReportStore::new();
        let now = Utc::now();

        let mut expired = store.create(submission_at(40.0, -74.0));
        expired.id = "expired".to_string();
        expired.timestamp = now - report_ttl() - Duration::milliseconds(1);
        expired.expires_at = Some(expired.timestamp + report_ttl());
        seed(&store, expired);

        let mut fresh = store.create(submission_at(40.0, -74.0));
        fresh.id = "fresh".to_string();
        fresh.timestamp = now - report_ttl() + Duration::seconds(5);
        fresh.expires_at = Some(fresh.timestamp + report_ttl());
        seed(&store, fresh.clone());

        let mut results = store.query(&ReportFilter::All);
        assert!(results.iter().all(|report| report.id != "expired"));
        assert!(results.iter().any(|report| report.id == "fresh"));

        // The lazy sweep already removed the expired entry.
        assert_eq!(store.purge_expired(), 0);
        results = store.query(&ReportFilter::All);
        assert!(results.iter().any(|report| report.id == "fresh"));
    }

    #[test]
    fn test_purge_counts_removed_entries() {
        let store = MemoryReportStore::new();
        let now = Utc::now();

        let mut expired = store.create(submission_at(40.0, -74.0));
        expired.id = "stale".to_string();
        expired.expires_at = Some(now - Duration::seconds(1));
        seed(&store, expired);

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.purge_expired(), 0);
    }
}
