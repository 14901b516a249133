use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// The closed set of reportable traffic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Slow or stopped traffic.
    TrafficJam,
    /// Road closed to through traffic.
    RoadClosed,
    /// A collision.
    Accident,
    /// Road works.
    Construction,
    /// Debris, flooding, or another hazard on the roadway.
    Hazard,
    /// Police activity.
    Police,
}

impl FromStr for ReportType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "traffic_jam" => ReportType::TrafficJam,
            "road_closed" => ReportType::RoadClosed,
            "accident" => ReportType::Accident,
            "construction" => ReportType::Construction,
            "hazard" => ReportType::Hazard,
            "police" => ReportType::Police,
            _ => bail!("unknown report type {value:?}"),
        })
    }
}

/// How disruptive a reported event is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor disruption.
    Low,
    /// Noticeable disruption.
    #[default]
    Medium,
    /// Major disruption.
    High,
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            _ => bail!("unknown severity {value:?}"),
        })
    }
}

/// The route a report was submitted against.
///
/// Recorded for context only; read-time filtering always uses the querying
/// route, never this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteContext {
    /// Start coordinate string, `"lat,lon"`.
    pub start: String,
    /// End coordinate string, `"lat,lon"`.
    pub end: String,
}

/// A stored traffic report.
///
/// Reports are read-only after creation; they leave a store only by expiring.
/// Field names follow the original wire format (`deviceId`, `expiresAt`, ...),
/// with timestamps as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficReport {
    /// Opaque unique id, assigned exactly once at creation.
    pub id: String,
    /// Creation instant, assigned exactly once at creation.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Server-assigned expiry instant; absent on locally-created reports.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    /// Advisory route context captured at submission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteContext>,
    /// Physical position of the reported event. Reports without one are
    /// excluded from relevance filtering rather than rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Event category.
    #[serde(rename = "type")]
    pub kind: ReportType,
    /// Event severity.
    #[serde(default)]
    pub severity: Severity,
    /// Optional free-text detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Identifier of the submitting device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Set when remote submission failed and the report exists only in the
    /// local cache.
    #[serde(default, skip_serializing_if = "is_false")]
    pub local_only: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A report as submitted by a client, before a store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    /// Advisory route context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteContext>,
    /// Position of the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Event category.
    #[serde(rename = "type")]
    pub kind: ReportType,
    /// Event severity.
    #[serde(default)]
    pub severity: Severity,
    /// Optional free-text detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Identifier of the submitting device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl ReportSubmission {
    /// Turn the submission into a report that exists only in the local cache,
    /// for when remote submission failed.
    pub fn into_local_report(self) -> TrafficReport {
        TrafficReport {
            id: generate_report_id(),
            timestamp: Utc::now(),
            expires_at: None,
            route: self.route,
            location: self.location,
            kind: self.kind,
            severity: self.severity,
            description: self.description,
            device_id: self.device_id,
            local_only: true,
        }
    }
}

/// Generate an opaque report id: creation millis in base 36 plus a random
/// base-36 suffix.
pub fn generate_report_id() -> String {
    let millis = Utc::now().timestamp_millis().unsigned_abs();
    let suffix: u64 = rand::thread_rng().gen();
    format!("{}{}", to_base36(millis), to_base36(suffix))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();

    String::from_utf8(out).expect("base36 digits are ascii")
}
