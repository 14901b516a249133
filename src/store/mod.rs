/// The client-side durable report cache.
mod local;
/// The process-lifetime server store.
mod memory;

pub use local::LocalReportCache;
pub use memory::{MemoryReportStore, ReportFilter};

use chrono::Duration;

/// How long a report stays visible after creation. One canonical value for
/// both the server store and the client cache.
pub fn report_ttl() -> Duration {
    Duration::hours(2)
}
