use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::geo::{parse_coordinates, BoundingBox};
use crate::report::{ReportType, TrafficReport};

/// Padding applied to a route's bounding box, in degrees (roughly 11 km).
pub const ROUTE_PADDING_DEGREES: f64 = 0.1;

/// Decide whether a report is relevant to the route from `start` to `end`.
///
/// The test is deliberately coarse: the report's position is checked against
/// the padded axis-aligned box spanning the two endpoints, not against the
/// actual path geometry. A diagonal route therefore over-includes points far
/// from the literal path.
///
/// A report without a location, or an unparseable route endpoint, yields
/// `false` rather than an error.
pub fn is_report_on_route(report: &TrafficReport, start: &str, end: &str) -> bool {
    let Some(location) = report.location else {
        return false;
    };

    let (Ok(start), Ok(end)) = (parse_coordinates(start), parse_coordinates(end)) else {
        return false;
    };

    BoundingBox::spanning(start, end)
        .padded(ROUTE_PADDING_DEGREES)
        .contains(location)
}

/// Composite identity used when merging remote and local result sets.
///
/// Exact match on position bits, type, and timestamp. Not robust to
/// floating-point jitter or re-submissions with a different timestamp; those
/// pass through as distinct reports, by design.
type DedupeKey = (u64, u64, ReportType, DateTime<Utc>);

fn dedupe_key(report: &TrafficReport) -> Option<DedupeKey> {
    let location = report.location?;
    Some((
        location.lat.to_bits(),
        location.lon.to_bits(),
        report.kind,
        report.timestamp,
    ))
}

/// Drop duplicate reports from a merged result set, keeping the first
/// occurrence of each key.
///
/// Callers place remote results before local ones so the remote copy of a
/// mirrored report wins. Reports without a location never collide; each is
/// kept.
pub fn dedupe_reports(reports: Vec<TrafficReport>) -> Vec<TrafficReport> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(reports.len());

    for report in reports {
        match dedupe_key(&report) {
            Some(key) => {
                if seen.insert(key) {
                    unique.push(report);
                }
            }
            None => unique.push(report),
        }
    }

    unique
}
