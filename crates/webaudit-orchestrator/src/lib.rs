//! WebAudit Orchestrator - Batch audits over one scanning-engine session
//!
//! This crate drives target URLs through a [`ScanEngine`]:
//! - Request validation and target resolution (exclusions, endpoint-only mode)
//! - Sequential batches against a single shared engine session
//! - Parallel URL access in small sub-batches
//! - Bounded-concurrency discovery and active scans
//! - Per-URL and per-batch failure isolation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use webaudit_engine::{EngineClient, EngineConfig};
//! use webaudit_orchestrator::{AuditRequest, Orchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> webaudit_core::Result<()> {
//!     let engine = Arc::new(EngineClient::new(EngineConfig::default())?);
//!     let orchestrator = Orchestrator::new(engine, OrchestratorConfig::default());
//!
//!     let request = AuditRequest::new(["https://example.com/"]);
//!     let report = orchestrator.audit(&request).await?;
//!     println!("Grade {}", report.summary.grade);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod pipeline;
pub mod request;

pub use config::OrchestratorConfig;
pub use pipeline::ScanPlan;
pub use request::{AuditOptions, AuditRequest, ExcludeRule};

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use webaudit_core::{BatchOutcome, Error, Result, TargetUrl, UrlOutcome, UrlState};
use webaudit_engine::ScanEngine;
use webaudit_report::{build_report, AuditReport, RunMetadata};

use pipeline::{scan_url, UrlRun};

/// Raw result of an audit run, before report processing
#[derive(Debug, Clone)]
pub struct AuditRun {
    pub batches: Vec<BatchOutcome>,
    pub metadata: RunMetadata,
    /// Overall target when the run had exactly one
    pub target: Option<String>,
}

impl AuditRun {
    pub fn outcomes(&self) -> impl Iterator<Item = &UrlOutcome> {
        self.batches.iter().flat_map(|b| b.outcomes.iter())
    }

    /// Build the audit report from every collected outcome
    pub fn into_report(self) -> AuditReport {
        let outcomes: Vec<UrlOutcome> = self
            .batches
            .into_iter()
            .flat_map(|b| b.outcomes)
            .collect();
        build_report(&outcomes, self.target.as_deref(), self.metadata)
    }
}

/// Split targets into consecutive batches of at most `batch_size`
pub fn split_batches(targets: &[TargetUrl], batch_size: usize) -> Vec<Vec<String>> {
    targets
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.iter().map(|t| t.as_str().to_string()).collect())
        .collect()
}

/// Drives audits through one engine session
pub struct Orchestrator {
    engine: Arc<dyn ScanEngine>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn ScanEngine>, config: OrchestratorConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run an audit and build its report
    pub async fn audit(&self, request: &AuditRequest) -> Result<AuditReport> {
        Ok(self.run(request).await?.into_report())
    }

    /// Run an audit and return the raw batch outcomes.
    ///
    /// Invalid requests fail before the engine is touched. Otherwise the
    /// engine session is shut down before returning, whatever the outcome.
    pub async fn run(&self, request: &AuditRequest) -> Result<AuditRun> {
        request.validate()?;
        let targets = request.targets()?;
        if targets.is_empty() {
            return Err(Error::validation("endpoints", "every endpoint is excluded"));
        }

        let result = self.run_batches(request, &targets).await;
        self.engine.shutdown().await;
        result
    }

    async fn run_batches(&self, request: &AuditRequest, targets: &[TargetUrl]) -> Result<AuditRun> {
        let plan = ScanPlan::from_options(&request.options);
        let rules = request.exclude_rules()?;
        let batches = split_batches(targets, request.options.batch_size);
        let total_batches = batches.len();

        let mut metadata = RunMetadata::new(self.config.mode.as_str());
        metadata.total_scans = targets.len();
        metadata.total_batches = total_batches;

        info!(
            "Starting audit {}: {} URLs in {} batches ({} mode)",
            metadata.run_id,
            targets.len(),
            total_batches,
            self.config.mode
        );

        let mut outcomes: Vec<BatchOutcome> = Vec::with_capacity(total_batches);
        let mut last_error: Option<Error> = None;
        let mut all_engine_start = true;

        for (index, urls) in batches.into_iter().enumerate() {
            if outcomes.last().map(|b| b.is_failed()).unwrap_or(false) {
                debug!("Cooling down {:?} after failed batch", self.config.batch_cooldown);
                tokio::time::sleep(self.config.batch_cooldown).await;
            }

            let started_at = Utc::now();
            info!("Batch {}/{}: {} URLs", index + 1, total_batches, urls.len());

            match self.run_batch(index, &urls, &plan, &rules).await {
                Ok((batch, version)) => {
                    if metadata.engine_version.is_none() {
                        metadata.engine_version = Some(version);
                    }
                    info!(
                        "Batch {}/{} done: {} succeeded, {} failed",
                        index + 1,
                        total_batches,
                        batch.successful_scans(),
                        batch.failed_scans()
                    );
                    outcomes.push(batch);
                }
                Err(e) => {
                    let batch_error = Error::BatchFailed {
                        batch: index + 1,
                        message: e.to_string(),
                    };
                    error!("{} [{}]", batch_error, e.code());
                    all_engine_start &= e.is_engine_start();
                    outcomes.push(BatchOutcome::failed(index, urls, batch_error.to_string(), started_at));
                    last_error = Some(e);
                }
            }
        }

        metadata.failed_batches = outcomes.iter().filter(|b| b.is_failed()).count();
        metadata.successful_batches = total_batches - metadata.failed_batches;
        metadata.successful_scans = outcomes.iter().map(|b| b.successful_scans()).sum();
        metadata.failed_scans = metadata.total_scans - metadata.successful_scans;
        metadata.completed_at = Some(Utc::now());

        if metadata.failed_batches == total_batches {
            if let Some(e) = last_error {
                return Err(if all_engine_start {
                    e
                } else {
                    Error::AllBatchesFailed {
                        total: total_batches,
                        last_error: e.to_string(),
                    }
                });
            }
        }

        info!(
            "Audit {} finished: {}/{} URLs scanned, {}/{} batches succeeded",
            metadata.run_id,
            metadata.successful_scans,
            metadata.total_scans,
            metadata.successful_batches,
            total_batches
        );

        let target = match targets {
            [only] => Some(only.as_str().to_string()),
            _ => None,
        };
        Ok(AuditRun {
            batches: outcomes,
            metadata,
            target,
        })
    }

    /// One batch: verify the engine, apply settings, then drive every URL
    async fn run_batch(
        &self,
        index: usize,
        urls: &[String],
        plan: &ScanPlan,
        rules: &[ExcludeRule],
    ) -> Result<(BatchOutcome, String)> {
        let started_at = Utc::now();
        let version = self.engine.ensure_running().await?;

        let report = self.engine.configure(self.config.mode).await;
        if !report.is_complete() {
            warn!("Batch {} runs with {} settings not applied", index + 1, report.failed.len());
        }
        for rule in rules {
            self.engine.exclude_from_scan(rule.engine_pattern()).await;
        }

        let mut runs: Vec<UrlRun> = urls.iter().map(UrlRun::new).collect();
        self.access_all(&mut runs).await;
        let runs = self.scan_all(runs, plan).await;
        let outcomes = self.settle_and_collect(runs).await;

        Ok((
            BatchOutcome {
                index,
                urls: urls.to_vec(),
                outcomes,
                error: None,
                started_at,
                completed_at: Utc::now(),
            },
            version,
        ))
    }

    /// Access URLs in parallel sub-batches with a pause in between
    async fn access_all(&self, runs: &mut [UrlRun]) {
        let sub_batch = self.config.access_sub_batch_size.max(1);

        for (i, chunk) in runs.chunks_mut(sub_batch).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.access_pause).await;
            }

            let handles: Vec<_> = chunk
                .iter()
                .map(|run| {
                    let engine = Arc::clone(&self.engine);
                    let url = run.url.clone();
                    tokio::spawn(async move { engine.access_url(&url).await })
                })
                .collect();

            for (run, handle) in chunk.iter_mut().zip(handles) {
                run.accessed = handle.await.unwrap_or(false);
                run.advance(UrlState::Accessed);
            }
        }

        let accessed = runs.iter().filter(|r| r.accessed).count();
        debug!("Accessed {}/{} URLs", accessed, runs.len());
    }

    /// Discovery and active scans, at most `max_concurrent_scans` at once
    async fn scan_all(&self, runs: Vec<UrlRun>, plan: &ScanPlan) -> Vec<UrlRun> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_scans.max(1)));
        let mut handles = Vec::with_capacity(runs.len());

        for run in runs {
            let url = run.url.clone();
            let engine = Arc::clone(&self.engine);
            let semaphore = Arc::clone(&semaphore);
            let plan = plan.clone();

            let handle = tokio::spawn(async move {
                let mut run = run;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    run.fail(&Error::Internal(String::from("scan slot unavailable")));
                    return run;
                };
                scan_url(engine.as_ref(), run, &plan).await
            });
            handles.push((url, handle));
        }

        let mut done = Vec::with_capacity(handles.len());
        for (url, handle) in handles {
            match handle.await {
                Ok(run) => done.push(run),
                Err(e) => {
                    let mut run = UrlRun::new(url.clone());
                    run.fail(&Error::UrlScanFailed {
                        url,
                        message: format!("scan task aborted: {}", e),
                    });
                    done.push(run);
                }
            }
        }
        done
    }

    /// Wait for passive analysis, then collect results per URL
    async fn settle_and_collect(&self, mut runs: Vec<UrlRun>) -> Vec<UrlOutcome> {
        let live = runs.iter().filter(|r| !r.is_failed()).count();
        if live > 0 {
            for run in runs.iter_mut().filter(|r| !r.is_failed()) {
                run.advance(UrlState::AwaitingPassiveSettle);
            }
            let remaining = self
                .engine
                .wait_for_passive(self.config.passive_settle_max_wait)
                .await;
            if remaining > 0 {
                warn!("Collecting with {} passive records still queued", remaining);
            }
        }

        let mut outcomes = Vec::with_capacity(runs.len());
        for mut run in runs {
            if run.is_failed() {
                outcomes.push(run.into_outcome(None));
                continue;
            }
            let results = self.engine.get_results(Some(&run.url)).await;
            debug!(
                "{}: {} findings from {:?} retrieval",
                run.url,
                results.findings.len(),
                results.source
            );
            run.advance(UrlState::Collected);
            outcomes.push(run.into_outcome(Some(results)));
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use webaudit_core::{FindingInstance, RawFinding, Risk, ScanTermination};
    use webaudit_engine::{ActiveScanHandle, ConfigureReport, EngineResults, ScanMode};

    /// In-memory engine with scripted failures
    #[derive(Default)]
    struct ScriptedEngine {
        start_failures: AtomicUsize,
        always_fail_start: bool,
        failing_scans: HashSet<String>,
        calls: Mutex<Vec<String>>,
        active_now: AtomicUsize,
        active_peak: AtomicUsize,
        shutdowns: AtomicUsize,
        excluded: Mutex<Vec<String>>,
    }

    impl ScriptedEngine {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }
    }

    #[async_trait::async_trait]
    impl ScanEngine for ScriptedEngine {
        async fn ensure_running(&self) -> Result<String> {
            self.record(String::from("ensure_running"));
            if self.always_fail_start {
                return Err(Error::EngineStartTimeout { attempts: 3 });
            }
            let remaining = self.start_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.start_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::EngineStart(String::from("connection refused")));
            }
            Ok(String::from("2.14.0"))
        }

        async fn configure(&self, _mode: ScanMode) -> ConfigureReport {
            self.record(String::from("configure"));
            ConfigureReport::default()
        }

        async fn exclude_from_scan(&self, pattern: &str) {
            self.excluded.lock().unwrap().push(pattern.to_string());
        }

        async fn access_url(&self, url: &str) -> bool {
            self.record(format!("access {}", url));
            true
        }

        async fn spider_scan(&self, url: &str, _max_depth: u32, _budget: Duration) -> Result<Vec<String>> {
            self.record(format!("spider {}", url));
            Ok(vec![url.to_string()])
        }

        async fn active_scan(&self, url: &str, _budget: Duration) -> Result<ActiveScanHandle> {
            self.record(format!("active {}", url));
            let now = self.active_now.fetch_add(1, Ordering::SeqCst) + 1;
            self.active_peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active_now.fetch_sub(1, Ordering::SeqCst);

            if self.failing_scans.contains(url) {
                return Err(Error::EngineApi {
                    endpoint: String::from("ascan/action/scan"),
                    status: 400,
                    message: String::from("URL Not Found in the Scan Tree"),
                });
            }
            Ok(ActiveScanHandle {
                scan_id: String::from("1"),
                url: url.to_string(),
                termination: ScanTermination::Completed,
                progress: 100,
                polls: 1,
            })
        }

        async fn wait_for_passive(&self, _max_wait: Duration) -> u64 {
            self.record(String::from("wait_for_passive"));
            0
        }

        async fn get_results(&self, base_url: Option<&str>) -> EngineResults {
            let url = base_url.unwrap_or_default().to_string();
            self.record(format!("results {}", url));
            let mut results = EngineResults::empty();
            results.findings = vec![RawFinding::builder("X-Frame-Options Header Not Set")
                .id("10020")
                .risk(Risk::Medium)
                .instance(FindingInstance::new(url))
                .build()];
            results
        }

        async fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            access_pause: Duration::from_millis(1),
            batch_cooldown: Duration::from_millis(1),
            passive_settle_max_wait: Duration::from_millis(10),
            ..OrchestratorConfig::default()
        }
    }

    fn request(urls: &[&str], batch_size: usize) -> AuditRequest {
        AuditRequest::new(urls.iter().copied()).with_options(AuditOptions {
            batch_size,
            ..AuditOptions::default()
        })
    }

    #[test]
    fn test_split_batches() {
        let targets: Vec<TargetUrl> = ["https://a.example/1", "https://a.example/2", "https://a.example/3"]
            .iter()
            .map(|u| TargetUrl::parse(u).unwrap())
            .collect();
        let sizes: Vec<usize> = split_batches(&targets, 2).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(split_batches(&targets, 5).len(), 1);
    }

    #[tokio::test]
    async fn test_three_urls_in_two_batches() {
        let engine = Arc::new(ScriptedEngine::default());
        let orchestrator = Orchestrator::new(engine.clone(), fast_config());
        let urls = ["https://a.example/1", "https://a.example/2", "https://a.example/3"];

        let run = orchestrator.run(&request(&urls, 2)).await.unwrap();
        let sizes: Vec<usize> = run.batches.iter().map(|b| b.outcomes.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(engine.count("ensure_running"), 2);
        assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 1);

        let outcome_urls: Vec<&str> = run.outcomes().map(|o| o.url.as_str()).collect();
        assert_eq!(outcome_urls, urls.to_vec());
        assert!(run.outcomes().all(|o| o.success && o.state == UrlState::Collected));

        let report = run.into_report();
        assert_eq!(report.metadata.total_batches, 2);
        assert_eq!(report.metadata.successful_scans, 3);
        assert_eq!(report.metadata.engine_version.as_deref(), Some("2.14.0"));
        assert_eq!(report.issues.len(), 1);
        let mut affected = report.issues[0].affected_urls.clone();
        affected.sort();
        assert_eq!(affected, urls.to_vec());
    }

    #[tokio::test]
    async fn test_engine_never_starts() {
        let engine = Arc::new(ScriptedEngine {
            always_fail_start: true,
            ..ScriptedEngine::default()
        });
        let orchestrator = Orchestrator::new(engine.clone(), fast_config());

        let err = orchestrator
            .audit(&request(&["https://a.example/1", "https://a.example/2"], 1))
            .await
            .unwrap_err();
        assert!(err.is_engine_start());
        assert_eq!(engine.count("ensure_running"), 2);
        assert_eq!(engine.count("active"), 0);
        assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_batch_failure_still_reports() {
        let engine = Arc::new(ScriptedEngine {
            start_failures: AtomicUsize::new(1),
            ..ScriptedEngine::default()
        });
        let orchestrator = Orchestrator::new(engine.clone(), fast_config());

        let report = orchestrator
            .audit(&request(&["https://a.example/1", "https://b.example/2"], 1))
            .await
            .unwrap();
        assert_eq!(report.metadata.failed_batches, 1);
        assert_eq!(report.metadata.successful_batches, 1);
        assert_eq!(report.metadata.failed_scans, 1);
        assert_eq!(report.websites.len(), 1);
        assert_eq!(report.websites[0].origin, "https://b.example");
    }

    #[tokio::test]
    async fn test_failing_url_is_isolated() {
        let engine = Arc::new(ScriptedEngine {
            failing_scans: HashSet::from([String::from("https://a.example/bad")]),
            ..ScriptedEngine::default()
        });
        let orchestrator = Orchestrator::new(engine.clone(), fast_config());

        let run = orchestrator
            .run(&request(&["https://a.example/good", "https://a.example/bad"], 5))
            .await
            .unwrap();
        let outcomes: Vec<&UrlOutcome> = run.outcomes().collect();
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert_eq!(outcomes[1].state, UrlState::Failed);
        assert!(outcomes[1].findings.is_empty());
        assert!(outcomes[1].error.as_deref().unwrap_or_default().contains("Scan Tree"));
        assert_eq!(engine.count("results"), 1);
    }

    #[tokio::test]
    async fn test_active_scans_are_bounded() {
        let engine = Arc::new(ScriptedEngine::default());
        let orchestrator = Orchestrator::new(engine.clone(), fast_config().with_max_concurrent_scans(2));
        let urls: Vec<String> = (0..6).map(|n| format!("https://a.example/{}", n)).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();

        orchestrator.run(&request(&refs, 6)).await.unwrap();
        assert_eq!(engine.count("active"), 6);
        assert!(engine.active_peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_endpoint_only_mode_skips_discovery() {
        let engine = Arc::new(ScriptedEngine::default());
        let orchestrator = Orchestrator::new(engine.clone(), fast_config());
        let req = AuditRequest::new(["https://a.example/"]).with_options(AuditOptions {
            skip_crawling: true,
            endpoints: vec![String::from("https://a.example/api/a"), String::from("https://a.example/api/b")],
            ..AuditOptions::default()
        });

        let run = orchestrator.run(&req).await.unwrap();
        assert_eq!(run.outcomes().count(), 2);
        assert_eq!(engine.count("spider"), 0);
        assert_eq!(engine.count("active"), 2);

        // Every access happens before the first active scan
        let calls = engine.calls.lock().unwrap().clone();
        let last_access = calls.iter().rposition(|c| c.starts_with("access")).unwrap();
        let first_active = calls.iter().position(|c| c.starts_with("active")).unwrap();
        assert!(last_access < first_active);
        assert_eq!(engine.count("wait_for_passive"), 1);
    }

    #[tokio::test]
    async fn test_passive_only_skips_active_scan() {
        let engine = Arc::new(ScriptedEngine::default());
        let orchestrator = Orchestrator::new(engine.clone(), fast_config());
        let req = AuditRequest::new(["https://a.example/"]).with_options(AuditOptions {
            passive_scan_only: true,
            exclude_urls: vec![String::from("https://a.example/logout")],
            ..AuditOptions::default()
        });

        let run = orchestrator.run(&req).await.unwrap();
        assert_eq!(engine.count("active"), 0);
        assert_eq!(engine.count("spider"), 1);
        assert!(run.outcomes().all(|o| o.success && o.active_scan.is_none()));
        assert_eq!(engine.excluded.lock().unwrap().len(), 1);
        assert_eq!(run.target.as_deref(), Some("https://a.example/"));
    }

    #[tokio::test]
    async fn test_invalid_request_never_touches_engine() {
        let engine = Arc::new(ScriptedEngine::default());
        let orchestrator = Orchestrator::new(engine.clone(), fast_config());

        let err = orchestrator.run(&request(&["https://a.example/"], 0)).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(engine.count("ensure_running"), 0);
        assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 0);
    }
}
