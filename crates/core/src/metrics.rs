//! Prometheus metrics for the engine.
//!
//! This module provides metrics for:
//! - Discovery (candidates discovered and rejected)
//! - Acquisition (candidate outcomes, stalls, disk-gate deferrals)
//! - Release merge (published, replaced, discarded)
//! - Jobs and external services

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Discovery Metrics
// =============================================================================

/// Candidates stored by discovery.
pub static CANDIDATES_DISCOVERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "releasekeeper_candidates_discovered_total",
        "Total release candidates stored by discovery",
    )
    .unwrap()
});

/// Indexer descriptors rejected by discovery.
pub static CANDIDATES_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "releasekeeper_candidates_rejected_total",
            "Total indexer descriptors rejected by discovery",
        ),
        &["reason"], // "protocol", "custom_format", "seeders", "tracker", "quality", "stale", ...
    )
    .unwrap()
});

// =============================================================================
// Acquisition Metrics
// =============================================================================

/// Candidates resolved by outcome.
pub static CANDIDATES_RESOLVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "releasekeeper_candidates_resolved_total",
            "Total candidates resolved by acquisition",
        ),
        &["outcome"], // "promoted", "ignored"
    )
    .unwrap()
});

/// Stall detections total.
pub static STALL_DETECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "releasekeeper_stall_detections_total",
        "Total download sessions dropped as stalled",
    )
    .unwrap()
});

/// Candidates left paused because of insufficient disk space.
pub static DISK_GATE_DEFERRALS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "releasekeeper_disk_gate_deferrals_total",
        "Total downloads deferred by the disk space gate",
    )
    .unwrap()
});

// =============================================================================
// Release Merge Metrics
// =============================================================================

pub static RELEASES_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "releasekeeper_releases_published_total",
        "Total releases published",
    )
    .unwrap()
});

pub static RELEASES_REPLACED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "releasekeeper_releases_replaced_total",
        "Total published releases superseded by a better one",
    )
    .unwrap()
});

pub static RELEASES_DISCARDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "releasekeeper_releases_discarded_total",
            "Total verified releases not published",
        ),
        &["reason"], // "duplicate", "dominated"
    )
    .unwrap()
});

// =============================================================================
// Job & External Service Metrics
// =============================================================================

/// Job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("releasekeeper_job_duration_seconds", "Duration of jobs")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]),
        &["kind", "outcome"], // kind: "discovery", "acquisition"; outcome: "completed", "partial", "failed"
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "releasekeeper_external_requests_total",
            "Total external service requests",
        ),
        &["service"], // "radarr", "sonarr", "qbittorrent", "ffprobe", "locator"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Discovery
        Box::new(CANDIDATES_DISCOVERED.clone()),
        Box::new(CANDIDATES_REJECTED.clone()),
        // Acquisition
        Box::new(CANDIDATES_RESOLVED.clone()),
        Box::new(STALL_DETECTIONS.clone()),
        Box::new(DISK_GATE_DEFERRALS.clone()),
        // Releases
        Box::new(RELEASES_PUBLISHED.clone()),
        Box::new(RELEASES_REPLACED.clone()),
        Box::new(RELEASES_DISCARDED.clone()),
        // Jobs & external services
        Box::new(JOB_DURATION.clone()),
        Box::new(EXTERNAL_REQUESTS.clone()),
    ]
}
