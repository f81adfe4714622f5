//! Reconciler Configuration
//!
//! Timeouts and names that shape how the engine reacts to slow or failing
//! workloads. Defaults match what a production deployment expects; a JSON file
//! may override any subset of them.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_FINALIZER: &str = "cluster.clusterflow.io/finalizer";

/// Configuration for the reconciler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// How long pods may stay ready without a role label (default: 60s)
    ///
    /// Component definitions can override this per workload.
    pub role_probe_timeout: Duration,

    /// How long a container may stay failed before the phase escalates (default: 60s)
    pub pod_failed_timeout: Duration,

    /// Grace window before volume claims of scaled-in replicas are removed (default: 30min)
    pub pvc_cleanup_grace: Duration,

    /// Requeue delay while waiting for the role probe (default: 30s)
    pub probe_requeue_interval: Duration,

    /// Finalizer stamped on the Cluster and every owned object
    pub finalizer: String,

    /// Events buffered per subscriber
    pub event_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            role_probe_timeout: Duration::from_secs(60),
            pod_failed_timeout: Duration::from_secs(60),
            pvc_cleanup_grace: Duration::from_secs(30 * 60),
            probe_requeue_interval: Duration::from_secs(30),
            finalizer: DEFAULT_FINALIZER.to_string(),
            event_capacity: 100,
        }
    }
}

/// Overrides accepted from a config file, in seconds
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    role_probe_timeout_secs: Option<u64>,
    pod_failed_timeout_secs: Option<u64>,
    pvc_cleanup_grace_secs: Option<u64>,
    probe_requeue_interval_secs: Option<u64>,
    finalizer: Option<String>,
    event_capacity: Option<usize>,
}

impl ReconcilerConfig {
    /// Create a new config with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with a specific role-probe timeout
    pub fn with_role_probe_timeout(timeout: Duration) -> Self {
        Self {
            role_probe_timeout: timeout,
            ..Default::default()
        }
    }

    /// Create a config with a specific failed-pod timeout
    pub fn with_pod_failed_timeout(timeout: Duration) -> Self {
        Self {
            pod_failed_timeout: timeout,
            ..Default::default()
        }
    }

    /// Load overrides from a JSON file on top of the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        let mut config = Self::default();
        if let Some(secs) = file.role_probe_timeout_secs {
            config.role_probe_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.pod_failed_timeout_secs {
            config.pod_failed_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.pvc_cleanup_grace_secs {
            config.pvc_cleanup_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = file.probe_requeue_interval_secs {
            config.probe_requeue_interval = Duration::from_secs(secs);
        }
        if let Some(finalizer) = file.finalizer {
            if finalizer.is_empty() {
                return Err(Error::Config("finalizer must not be empty".to_string()));
            }
            config.finalizer = finalizer;
        }
        if let Some(capacity) = file.event_capacity {
            config.event_capacity = capacity.max(1);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.role_probe_timeout, Duration::from_secs(60));
        assert_eq!(config.pod_failed_timeout, Duration::from_secs(60));
        assert_eq!(config.pvc_cleanup_grace, Duration::from_secs(1800));
        assert_eq!(config.finalizer, DEFAULT_FINALIZER);
    }

    #[test]
    fn test_with_role_probe_timeout() {
        let config = ReconcilerConfig::with_role_probe_timeout(Duration::from_secs(5));
        assert_eq!(config.role_probe_timeout, Duration::from_secs(5));
        assert_eq!(config.pod_failed_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_from_file_overrides_subset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"role_probe_timeout_secs": 10, "pvc_cleanup_grace_secs": 60}}"#
        )
        .unwrap();

        let config = ReconcilerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.role_probe_timeout, Duration::from_secs(10));
        assert_eq!(config.pvc_cleanup_grace, Duration::from_secs(60));
        assert_eq!(config.pod_failed_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_from_json_rejects_unknown_and_empty_fields() {
        assert!(matches!(
            ReconcilerConfig::from_json(r#"{"max_voters": 3}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ReconcilerConfig::from_json(r#"{"finalizer": ""}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReconcilerConfig::from_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
