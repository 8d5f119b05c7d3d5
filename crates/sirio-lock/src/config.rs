//! # Lock Service Configuration

use std::env;
use tokio::sync::Semaphore;

/// A resource type declared at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeConfig {
    /// Resource type name (e.g. "invoice").
    pub name: String,
    /// Permits per resource id.
    pub max_locks: usize,
    /// Whether a permit may be shared by a set of users.
    pub allow_multi: bool,
}

impl ResourceTypeConfig {
    pub fn new(name: impl Into<String>, max_locks: usize, allow_multi: bool) -> Self {
        Self {
            name: name.into(),
            max_locks,
            allow_multi,
        }
    }
}

/// Lock service configuration.
#[derive(Debug, Clone, Default)]
pub struct LockConfig {
    /// Types registered when the service is built.
    pub resource_types: Vec<ResourceTypeConfig>,
}

impl LockConfig {
    /// Read predeclared types from `SIRIO_LOCK_TYPES`.
    ///
    /// Format: comma-separated `name:max_locks[:multi]`, for example
    /// `invoice:1,patient-record:3:multi`. Malformed entries and lock counts
    /// outside `1..=Semaphore::MAX_PERMITS` are skipped.
    pub fn from_env() -> Self {
        let resource_types = env::var("SIRIO_LOCK_TYPES")
            .map(|raw| parse_types(&raw))
            .unwrap_or_default();
        Self { resource_types }
    }
}

fn parse_types(raw: &str) -> Vec<ResourceTypeConfig> {
    raw.split(',')
        .filter_map(|entry| {
            let mut parts = entry.trim().split(':');
            let name = parts.next().filter(|n| !n.is_empty())?;
            let max_locks = parts
                .next()?
                .parse()
                .ok()
                .filter(|n| (1..=Semaphore::MAX_PERMITS).contains(n))?;
            let allow_multi = parts.next() == Some("multi");
            Some(ResourceTypeConfig::new(name, max_locks, allow_multi))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_types() {
        let types = parse_types(&format!(
            "invoice:1, patient-record:3:multi,broken,:2,empty:0,huge:{}",
            usize::MAX
        ));
        assert_eq!(
            types,
            vec![
                ResourceTypeConfig::new("invoice", 1, false),
                ResourceTypeConfig::new("patient-record", 3, true),
            ]
        );
    }
}
