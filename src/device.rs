use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::report::generate_report_id;

/// An opaque per-install identifier, stable for the life of the install.
///
/// Created once on first use and persisted; callers load it at startup and
/// thread it through explicitly rather than reading it ambiently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(String);

impl DeviceId {
    /// Load the persisted id from `path`, creating and persisting a fresh one
    /// if the file is missing or empty.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if let Ok(contents) = fs::read_to_string(path) {
            let id = contents.trim();
            if !id.is_empty() {
                return Ok(Self(id.to_string()));
            }
        }

        let id = generate_report_id();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(path, &id).with_context(|| format!("writing {}", path.display()))?;

        Ok(Self(id))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_is_stable_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device-id");

        let first = DeviceId::load_or_create(&path).unwrap();
        let second = DeviceId::load_or_create(&path).unwrap();

        assert_eq!(first, second);
        assert!(!first.as_str().is_empty());
    }

    #[test]
    fn test_empty_file_gets_a_fresh_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device-id");
        std::fs::write(&path, "  \n").unwrap();

        let id = DeviceId::load_or_create(&path).unwrap();
        assert!(!id.as_str().is_empty());
    }
}
