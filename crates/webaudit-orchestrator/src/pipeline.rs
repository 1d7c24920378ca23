//! Per-URL scan pipeline
//!
//! `Pending → Accessed → (Discovering) → (ActiveScanning) →
//! AwaitingPassiveSettle → Collected`, or `Failed` from any step.
//! Access and collection happen at batch level; discovery and the active
//! scan run here, one task per URL.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use webaudit_core::{Error, ScanTermination, UrlOutcome, UrlState};
use webaudit_engine::{EngineResults, ScanEngine};

use crate::request::AuditOptions;

/// What each URL in a run goes through
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub max_depth: u32,
    /// Budget for each polling phase
    pub budget: Duration,
    pub discover: bool,
    pub active: bool,
}

impl ScanPlan {
    pub fn from_options(options: &AuditOptions) -> Self {
        Self {
            max_depth: options.max_depth,
            budget: options.timeout_duration(),
            discover: !options.skip_crawling,
            active: !options.passive_scan_only,
        }
    }
}

/// Mutable state of one URL while its batch runs
#[derive(Debug)]
pub(crate) struct UrlRun {
    pub url: String,
    pub state: UrlState,
    pub accessed: bool,
    pub discovered: Vec<String>,
    pub termination: Option<ScanTermination>,
    pub error: Option<String>,
    started: Instant,
}

impl UrlRun {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: UrlState::Pending,
            accessed: false,
            discovered: Vec::new(),
            termination: None,
            error: None,
            started: Instant::now(),
        }
    }

    pub fn advance(&mut self, next: UrlState) {
        if self.state.can_advance_to(next) {
            debug!("{}: {} -> {}", self.url, self.state, next);
            self.state = next;
        } else {
            warn!("{}: ignoring transition {} -> {}", self.url, self.state, next);
        }
    }

    pub fn fail(&mut self, error: &Error) {
        warn!("{} failed during {}: {}", self.url, self.state, error);
        self.error = Some(error.to_string());
        self.state = UrlState::Failed;
    }

    pub fn is_failed(&self) -> bool {
        self.state == UrlState::Failed
    }

    pub fn into_outcome(self, results: Option<EngineResults>) -> UrlOutcome {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        let success = self.state == UrlState::Collected;

        let (findings, passive_record_count, mut discovered) = match results {
            Some(r) => (r.findings, r.passive_record_count, r.discovered_urls),
            None => (Vec::new(), 0, Vec::new()),
        };
        for url in self.discovered {
            if !discovered.contains(&url) {
                discovered.push(url);
            }
        }

        UrlOutcome {
            url: self.url,
            success,
            state: self.state,
            findings,
            discovered_urls: discovered,
            passive_record_count,
            active_scan: self.termination,
            error: self.error,
            duration_ms,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Run discovery and the active scan for one URL
pub(crate) async fn scan_url(engine: &dyn ScanEngine, mut run: UrlRun, plan: &ScanPlan) -> UrlRun {
    if plan.discover {
        run.advance(UrlState::Discovering);
        match engine.spider_scan(&run.url, plan.max_depth, plan.budget).await {
            Ok(urls) => {
                debug!("{}: discovery found {} URLs", run.url, urls.len());
                run.discovered = urls;
            }
            Err(Error::SessionClosed) => {
                run.fail(&Error::SessionClosed);
                return run;
            }
            // Discovery is optional; the URL itself can still be scanned
            Err(e) => warn!("{}: discovery failed ({}); scanning the URL alone", run.url, e),
        }
    }

    if plan.active {
        run.advance(UrlState::ActiveScanning);
        match engine.active_scan(&run.url, plan.budget).await {
            Ok(handle) => {
                if handle.termination.is_low_confidence() {
                    warn!(
                        "{}: active scan abandoned at {}%; results are low-confidence",
                        run.url, handle.progress
                    );
                } else {
                    info!(
                        "{}: active scan {} ended {:?} at {}%",
                        run.url, handle.scan_id, handle.termination, handle.progress
                    );
                }
                run.termination = Some(handle.termination);
            }
            Err(e) => {
                let url = run.url.clone();
                run.fail(&Error::UrlScanFailed {
                    url,
                    message: e.to_string(),
                });
            }
        }
    }

    run
}
