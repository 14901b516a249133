use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use crate::report::TrafficReport;

/// The client-side durable report cache, a JSON array in a single file.
///
/// The localStorage analog: reports that were mirrored from the server or
/// created locally after a failed submission land here so reads keep working
/// offline. Expiry is enforced by the reader, not by the cache.
#[derive(Debug, Clone)]
pub struct LocalReportCache {
    path: PathBuf,
}

impl LocalReportCache {
    /// A cache backed by the file at `path`. The file is created on first
    /// write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append a fully-formed report to the cache.
    ///
    /// A corrupt or missing cache file is reset to an empty collection rather
    /// than reported; only the rewrite itself can fail.
    pub fn store(&self, report: &TrafficReport) -> Result<()> {
        let mut reports = self.stored_reports();
        reports.push(report.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let serialized = serde_json::to_string(&reports)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("writing {}", self.path.display()))?;

        Ok(())
    }

    /// Every cached report. Parse failures yield an empty list, never an
    /// error.
    pub fn stored_reports(&self) -> Vec<TrafficReport> {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };

        match serde_json::from_str(&contents) {
            Ok(reports) => reports,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "resetting corrupt report cache");
                Vec::new()
            }
        }
    }
}
