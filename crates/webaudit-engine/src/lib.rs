//! WebAudit Engine - Control-plane client for the external scanning engine
//!
//! This crate provides:
//! - `ScanEngine`: the operations the orchestrator needs from a scanning engine
//! - `EngineClient`: implementation over the engine's JSON control API,
//!   including launching and tearing down a self-managed engine process
//! - Stuck-scan detection for progress polling
//! - Tiered alert retrieval that always yields a (possibly empty) result
//!
//! The client is deliberately thin: it retries idempotent views, treats
//! tuning and URL seeding as best effort, and performs no aggregation.

pub mod alerts;
pub mod client;
pub mod process;
pub mod progress;
pub mod settings;

pub use alerts::{EngineResults, ResultSource};
pub use client::{EngineClient, EngineConfig};
pub use process::EngineProcess;
pub use progress::{poll_progress, PollSummary, ProgressTracker, StuckScanPolicy};
pub use settings::{ScanMode, Setting};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use webaudit_core::{Result, ScanTermination};

/// Outcome of an active scan's progress polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveScanHandle {
    pub scan_id: String,
    pub url: String,
    pub termination: ScanTermination,
    /// Last progress reported (percent)
    pub progress: u8,
    pub polls: u32,
}

/// Which settings `configure` managed to apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureReport {
    pub applied: Vec<String>,
    pub failed: Vec<String>,
}

impl ConfigureReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Operations the orchestrator drives on a scanning engine.
///
/// Best-effort operations (`configure`, `access_url`, `exclude_from_scan`,
/// `wait_for_passive`, `get_results`, `shutdown`) never fail; they log and
/// degrade instead.
#[async_trait::async_trait]
pub trait ScanEngine: Send + Sync {
    /// Make sure the engine answers, launching it if needed. Returns the
    /// engine version.
    async fn ensure_running(&self) -> Result<String>;

    /// Apply the tuning profile for `mode`
    async fn configure(&self, mode: ScanMode) -> ConfigureReport;

    /// Register a URL regex the engine must not crawl or attack
    async fn exclude_from_scan(&self, pattern: &str);

    /// Visit `url` through the engine so it enters the engine's history.
    /// Returns whether the visit succeeded.
    async fn access_url(&self, url: &str) -> bool;

    /// Crawl from `url`, returning discovered URLs (partial on timeout)
    async fn spider_scan(&self, url: &str, max_depth: u32, budget: Duration) -> Result<Vec<String>>;

    /// Attack-scan `url`, polling progress with stuck-scan detection
    async fn active_scan(&self, url: &str, budget: Duration) -> Result<ActiveScanHandle>;

    /// Wait for the passive scanner to drain, at most `max_wait`.
    /// Returns the number of records still queued.
    async fn wait_for_passive(&self, max_wait: Duration) -> u64;

    /// Collect findings, optionally restricted to URLs under `base_url`
    async fn get_results(&self, base_url: Option<&str>) -> EngineResults;

    /// Graceful shutdown, then forced termination of a self-managed process
    async fn shutdown(&self);
}
