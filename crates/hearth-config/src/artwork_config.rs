//! Artwork service configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ArtKind;

/// Remote image service and worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtworkConfig {
    /// Base URL of the image service, with trailing slash
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token for the image service
    #[serde(default)]
    pub api_key: String,

    /// Concurrent lookups per CPU core
    #[serde(default = "default_workers_per_core")]
    pub workers_per_core: usize,

    /// CPU cores to size the pool with (0 = detect)
    #[serde(default)]
    pub cores: usize,

    /// Report progress every N finished titles
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,

    /// Attempts per request on transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay in milliseconds, doubled per attempt
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// app_id -> bitmask of kinds that should use the second candidate
    #[serde(default)]
    pub alternative_images: BTreeMap<String, u8>,
}

/// Upper bound on concurrent title lookups
pub const MAX_WORKERS: usize = 1024;

fn default_api_url() -> String {
    "https://www.steamgriddb.com/api/v2/".to_string()
}

fn default_workers_per_core() -> usize {
    2
}

fn default_flush_every() -> usize {
    12
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        let mut alternative_images = BTreeMap::new();
        alternative_images.insert("1149550".to_string(), ArtKind::Boxart.alternative_bit());

        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            workers_per_core: default_workers_per_core(),
            cores: 0,
            flush_every: default_flush_every(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            timeout_secs: default_timeout_secs(),
            alternative_images,
        }
    }
}

impl ArtworkConfig {
    /// Number of concurrent title lookups
    pub fn worker_count(&self) -> usize {
        let cores = if self.cores > 0 {
            self.cores
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        cores
            .saturating_mul(self.workers_per_core)
            .clamp(1, MAX_WORKERS)
    }

    /// Candidate index to use for `(app_id, kind)`
    pub fn variant_index(&self, app_id: &str, kind: ArtKind) -> usize {
        match self.alternative_images.get(app_id) {
            Some(mask) if mask & kind.alternative_bit() != 0 => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_uses_configured_cores() {
        let config = ArtworkConfig {
            cores: 3,
            workers_per_core: 2,
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 6);
    }

    #[test]
    fn test_worker_count_never_zero() {
        let config = ArtworkConfig {
            cores: 4,
            workers_per_core: 0,
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn test_worker_count_saturates() {
        let config = ArtworkConfig {
            cores: usize::MAX,
            workers_per_core: 4,
            ..Default::default()
        };
        assert_eq!(config.worker_count(), MAX_WORKERS);
    }

    #[test]
    fn test_variant_index() {
        let config = ArtworkConfig::default();
        assert_eq!(config.variant_index("1149550", ArtKind::Boxart), 1);
        assert_eq!(config.variant_index("1149550", ArtKind::Hero), 0);
        assert_eq!(config.variant_index("440", ArtKind::Boxart), 0);
    }
}
