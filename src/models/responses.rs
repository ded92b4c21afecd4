//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::StatsSnapshot;

/// Response body for the invalidation endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Success message
    pub message: String,
    /// Page that was cleared, absent for a full flush
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Number of artifact files deleted, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
}

impl ClearResponse {
    /// Creates a response for a single-page invalidation
    pub fn page(url: impl Into<String>, removed: usize) -> Self {
        let url = url.into();
        Self {
            message: format!("Cache cleared for {}", url),
            url: Some(url),
            removed: Some(removed),
        }
    }

    /// Creates a response for a content-change notification
    pub fn changed(resource_id: &str, url: impl Into<String>) -> Self {
        Self {
            message: format!("Cache cleared for resource {}", resource_id),
            url: Some(url.into()),
            removed: None,
        }
    }

    /// Creates a response for a full flush
    pub fn all(removed: usize) -> Self {
        Self {
            message: "All cache cleared".to_string(),
            url: None,
            removed: Some(removed),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Pages written to storage
    pub stored: u64,
    /// Buffers too small to cache
    pub skipped: u64,
    /// Failed artifact writes
    pub write_failures: u64,
    /// Invalidations performed
    pub invalidations: u64,
    /// Read-path hits
    pub hits: u64,
    /// Read-path misses
    pub misses: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(stats: StatsSnapshot) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stored: stats.stored,
            skipped: stats.skipped,
            write_failures: stats.write_failures,
            invalidations: stats.invalidations,
            hits: stats.hits,
            misses: stats.misses,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Whether the cache root accepts writes
    pub storage_writable: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    ///
    /// The server stays healthy with unwritable storage; pages are then
    /// served live.
    pub fn healthy(storage_writable: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            storage_writable,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
