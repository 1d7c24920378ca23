//! Per-URL and per-batch scan outcomes handed from the orchestrator to
//! the report processor

use crate::finding::RawFinding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single URL inside a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UrlState {
    #[default]
    Pending,
    Accessed,
    Discovering,
    ActiveScanning,
    AwaitingPassiveSettle,
    Collected,
    Failed,
}

impl UrlState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlState::Pending => "pending",
            UrlState::Accessed => "accessed",
            UrlState::Discovering => "discovering",
            UrlState::ActiveScanning => "activeScanning",
            UrlState::AwaitingPassiveSettle => "awaitingPassiveSettle",
            UrlState::Collected => "collected",
            UrlState::Failed => "failed",
        }
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(&self, next: UrlState) -> bool {
        use UrlState::*;
        match (self, next) {
            (Collected, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Pending, Accessed) => true,
            (Accessed, Discovering | ActiveScanning | AwaitingPassiveSettle) => true,
            (Discovering, ActiveScanning | AwaitingPassiveSettle) => true,
            (ActiveScanning, AwaitingPassiveSettle) => true,
            (AwaitingPassiveSettle, Collected) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for UrlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a progress poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanTermination {
    /// Progress reached 100%
    Completed,
    /// Plateaued before reaching significant progress; low-confidence result
    AbandonedEarly,
    /// Plateaued after significant progress; results still collected
    StalledAfterProgress,
    /// Poll attempts exhausted
    TimedOut,
}

impl ScanTermination {
    /// Whether results gathered after this termination are trustworthy
    pub fn is_low_confidence(&self) -> bool {
        matches!(self, ScanTermination::AbandonedEarly)
    }
}

/// Result of driving one URL through the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlOutcome {
    pub url: String,
    pub success: bool,
    /// Last state reached
    pub state: UrlState,
    #[serde(default)]
    pub findings: Vec<RawFinding>,
    #[serde(default)]
    pub discovered_urls: Vec<String>,
    pub passive_record_count: u64,
    pub active_scan: Option<ScanTermination>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl UrlOutcome {
    /// Placeholder outcome for a URL whose scan failed
    pub fn failed(url: impl Into<String>, state: UrlState, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            state,
            findings: Vec::new(),
            discovered_urls: Vec::new(),
            passive_record_count: 0,
            active_scan: None,
            error: Some(error.into()),
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }
}

/// Everything one batch produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Zero-based batch index
    pub index: usize,
    pub urls: Vec<String>,
    pub outcomes: Vec<UrlOutcome>,
    /// Set when the batch as a whole could not run
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BatchOutcome {
    /// Batch that failed before any URL produced an outcome
    pub fn failed(index: usize, urls: Vec<String>, error: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            index,
            urls,
            outcomes: Vec::new(),
            error: Some(error.into()),
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn successful_scans(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed_scans(&self) -> usize {
        if self.is_failed() {
            return self.urls.len();
        }
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}
