//! HTTP client for the scanning engine's JSON control API
//!
//! All calls are `GET /JSON/<component>/<view|action>/<name>/?params`:
//! - core/view/version           - Liveness and version
//! - core/action/accessUrl       - Seed the engine history with a URL
//! - spider/action/scan          - Start a discovery crawl
//! - spider/view/status|results  - Crawl progress and discovered URLs
//! - ascan/action/scan           - Start an active scan
//! - ascan/view/status           - Active scan progress
//! - core/view/alerts            - Bulk alert retrieval (paged)
//! - alert/view/alertsSummary    - Alert counts per risk
//! - alert/view/alerts           - Alerts filtered by risk level
//! - pscan/view/recordsToScan    - Passive scanner queue length
//! - */action/setOption*         - Tuning
//! - core/action/shutdown        - Graceful shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use webaudit_common::Config;
use webaudit_core::{Error, RawFinding, Result, Risk, ScanTermination};

use crate::alerts::{
    findings_from_summary, group_alerts, AlertsResponse, AlertsSummaryResponse, ApiAlert,
    EngineResults, ResultSource,
};
use crate::process::EngineProcess;
use crate::progress::{poll_progress, StuckScanPolicy};
use crate::settings::{fallback_calls, lookup, EngineCall, ScanMode, Setting};
use crate::{ActiveScanHandle, ConfigureReport, ScanEngine};

const API_KEY_HEADER: &str = "X-ZAP-API-Key";

// ── Configuration ────────────────────────────────────────────────────────────

/// Configuration for the engine client
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Control API host
    pub host: String,
    /// Control API port
    pub port: u16,
    /// API key, when the engine enforces one
    pub api_key: Option<String>,
    /// Executable used to launch the engine if it is not running
    pub launch_command: Option<String>,
    /// Extra launch arguments
    pub launch_args: Vec<String>,
    /// Tuning profile
    pub mode: ScanMode,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Interval between liveness probes during startup
    pub startup_poll_interval: Duration,
    /// Liveness probes before startup is declared failed
    pub startup_max_attempts: u32,
    /// Wait after the shutdown request before killing the process
    pub shutdown_grace: Duration,
    /// Interval between spider/active-scan progress polls
    pub poll_interval: Duration,
    /// Interval between passive-queue polls
    pub passive_poll_interval: Duration,
    /// Stuck-scan thresholds for active scans
    pub stuck_policy: StuckScanPolicy,
    /// Alerts fetched per page
    pub alert_page_size: usize,
    /// Upper bound on alert pages per retrieval
    pub alert_max_pages: usize,
    /// Retries for idempotent views on transient errors
    pub max_retries: u32,
    /// Base delay between retries (multiplied by the attempt number)
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 8090,
            api_key: None,
            launch_command: None,
            launch_args: Vec::new(),
            mode: ScanMode::Normal,
            request_timeout: Duration::from_secs(30),
            startup_poll_interval: Duration::from_secs(2),
            startup_max_attempts: 30,
            shutdown_grace: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
            passive_poll_interval: Duration::from_secs(1),
            stuck_policy: StuckScanPolicy::default(),
            alert_page_size: 500,
            alert_max_pages: 200,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    /// Base URL of the control API
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        let engine = &config.engine;
        let scan = &config.scan;
        Self {
            host: engine.host.clone(),
            port: engine.port,
            api_key: engine.api_key.clone(),
            launch_command: engine.launch_command.clone(),
            launch_args: engine.launch_args.clone(),
            mode: ScanMode::parse(&engine.mode),
            request_timeout: Duration::from_secs(engine.request_timeout_seconds),
            startup_poll_interval: Duration::from_millis(engine.startup_poll_interval_ms),
            startup_max_attempts: engine.startup_max_attempts,
            shutdown_grace: Duration::from_secs(engine.shutdown_grace_seconds),
            poll_interval: Duration::from_millis(scan.poll_interval_ms),
            stuck_policy: StuckScanPolicy {
                low_threshold: scan.stuck_low_threshold,
                high_threshold: scan.stuck_high_threshold,
                significant_progress: scan.significant_progress_percent,
                ..StuckScanPolicy::default()
            },
            ..Self::default()
        }
    }
}

// ── API Response Types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// `{"scan": "3"}`; some engine builds send a number
#[derive(Debug, Deserialize)]
struct ScanStartResponse {
    scan: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SpiderResultsResponse {
    #[serde(default)]
    results: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UrlsResponse {
    #[serde(default)]
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RecordsToScanResponse {
    #[serde(rename = "recordsToScan")]
    records_to_scan: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_u64(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn risk_id(risk: Risk) -> u8 {
    match risk {
        Risk::High => 3,
        Risk::Medium => 2,
        Risk::Low => 1,
        Risk::Informational => 0,
    }
}

// ── Engine Client ────────────────────────────────────────────────────────────

/// Client for one engine session.
///
/// Owns the engine process when it had to launch one. Once `shutdown`
/// has begun every further operation is refused.
pub struct EngineClient {
    config: EngineConfig,
    http: Client,
    process: Mutex<Option<EngineProcess>>,
    version: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl EngineClient {
    /// Create a new engine client
    pub fn new(config: EngineConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("WebAudit/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            process: Mutex::new(None),
            version: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Engine version seen by the last successful liveness check
    pub async fn engine_version(&self) -> Option<String> {
        self.version.lock().await.clone()
    }

    /// Whether this client launched the engine process itself
    pub async fn is_self_managed(&self) -> bool {
        self.process.lock().await.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    fn api_url(&self, component: &str, kind: &str, name: &str) -> String {
        format!(
            "{}/JSON/{}/{}/{}/",
            self.config.base_url(),
            component,
            kind,
            name
        )
    }

    // ── Transport ────────────────────────────────────────────────────────

    /// Single control-API call
    async fn request<T: DeserializeOwned>(
        &self,
        component: &str,
        kind: &str,
        name: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let endpoint = format!("{}/{}/{}", component, kind, name);
        let mut request = self.http.get(self.api_url(component, kind, name)).query(params);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let res = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", endpoint, e)))?;

        let status = res.status().as_u16();
        let text = res
            .text()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", endpoint, e)))?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|body| body.message.or(body.code))
                .unwrap_or(text);
            return Err(Error::EngineApi {
                endpoint,
                status,
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| Error::EngineApi {
            endpoint,
            status,
            message: format!("unexpected response body: {}", e),
        })
    }

    /// Idempotent view call, retried on transient failures
    async fn view<T: DeserializeOwned>(
        &self,
        component: &str,
        name: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match self.request(component, "view", name, params).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    debug!(
                        "{}/view/{} failed ({}); retry {}/{}",
                        component, name, e, attempt, self.config.max_retries
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                other => return other,
            }
        }
    }

    /// Action call, never retried
    async fn action<T: DeserializeOwned>(
        &self,
        component: &str,
        name: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        self.request(component, "action", name, params).await
    }

    // ── Views ────────────────────────────────────────────────────────────

    /// Lightweight liveness check
    pub async fn version(&self) -> Result<String> {
        let res: VersionResponse = self.request("core", "view", "version", &[]).await?;
        Ok(res.version)
    }

    async fn scan_status(&self, component: &str, scan_id: &str) -> Result<u8> {
        let res: StatusResponse = self
            .view(component, "status", &[("scanId", scan_id.to_string())])
            .await?;
        value_to_u64(&res.status)
            .map(|p| p.min(100) as u8)
            .ok_or_else(|| Error::EngineApi {
                endpoint: format!("{}/view/status", component),
                status: 200,
                message: format!("non-numeric progress {}", res.status),
            })
    }

    async fn records_to_scan(&self) -> Result<u64> {
        let res: RecordsToScanResponse = self.view("pscan", "recordsToScan", &[]).await?;
        value_to_u64(&res.records_to_scan).ok_or_else(|| Error::EngineApi {
            endpoint: String::from("pscan/view/recordsToScan"),
            status: 200,
            message: format!("non-numeric record count {}", res.records_to_scan),
        })
    }

    async fn discovered_urls(&self, base_url: Option<&str>) -> Vec<String> {
        let params: Vec<(&str, String)> = base_url
            .map(|b| vec![("baseurl", b.to_string())])
            .unwrap_or_default();
        match self.view::<UrlsResponse>("core", "urls", &params).await {
            Ok(res) => res.urls,
            Err(e) => {
                warn!("Could not list discovered URLs: {}", e);
                Vec::new()
            }
        }
    }

    // ── Settings ─────────────────────────────────────────────────────────

    async fn apply_call(&self, call: &EngineCall) -> Result<()> {
        self.ensure_open()?;
        let params: Vec<(&str, String)> = call
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        self.action::<serde_json::Value>(call.component, &call.action, &params)
            .await
            .map(|_| ())
    }

    /// Apply one logical setting. Mapped names run every mapped call;
    /// unmapped names try the generic calls until one succeeds.
    pub async fn apply_setting(&self, setting: &Setting) -> bool {
        match lookup(setting) {
            Some(calls) => {
                let mut applied = true;
                for call in &calls {
                    if let Err(e) = self.apply_call(call).await {
                        warn!(
                            "Setting {}={} not applied via {}/{}: {}",
                            setting.name, setting.value, call.component, call.action, e
                        );
                        applied = false;
                    }
                }
                applied
            }
            None => {
                for call in fallback_calls(setting) {
                    match self.apply_call(&call).await {
                        Ok(()) => {
                            debug!(
                                "Setting {} applied via generic {}/{}",
                                setting.name, call.component, call.action
                            );
                            return true;
                        }
                        Err(e) => debug!(
                            "Generic {}/{} rejected {}: {}",
                            call.component, call.action, setting.name, e
                        ),
                    }
                }
                warn!(
                    "Setting {}={} is unmapped and no generic option accepted it",
                    setting.name, setting.value
                );
                false
            }
        }
    }

    /// Apply settings in order; failures are recorded, never raised
    pub async fn apply_settings(&self, settings: &[Setting]) -> ConfigureReport {
        let mut report = ConfigureReport::default();
        for setting in settings {
            if self.apply_setting(setting).await {
                report.applied.push(setting.name.clone());
            } else {
                report.failed.push(setting.name.clone());
            }
        }
        report
    }

    // ── Alert Retrieval Tiers ────────────────────────────────────────────

    async fn fetch_alerts(&self, base_url: Option<&str>) -> Result<Vec<ApiAlert>> {
        let page_size = self.config.alert_page_size.max(1);
        let max_pages = self.config.alert_max_pages.max(1);
        let mut alerts = Vec::new();
        let mut start = 0usize;

        for _ in 0..max_pages {
            let mut params = vec![("start", start.to_string()), ("count", page_size.to_string())];
            if let Some(base) = base_url {
                params.push(("baseurl", base.to_string()));
            }
            let page: AlertsResponse = self.view("core", "alerts", &params).await?;
            let received = page.alerts.len();
            alerts.extend(page.alerts);
            if received < page_size {
                return Ok(alerts);
            }
            start += received;
        }

        warn!(
            "Alert paging stopped after {} pages ({} alerts); remaining pages ignored",
            max_pages,
            alerts.len()
        );
        Ok(alerts)
    }

    async fn fetch_summary(&self, base_url: Option<&str>) -> Result<Vec<RawFinding>> {
        let params: Vec<(&str, String)> = base_url
            .map(|b| vec![("baseurl", b.to_string())])
            .unwrap_or_default();
        let res: AlertsSummaryResponse = self.view("alert", "alertsSummary", &params).await?;
        Ok(findings_from_summary(&res.alerts_summary))
    }

    async fn fetch_by_risk(&self, base_url: Option<&str>) -> Result<Vec<RawFinding>> {
        let mut alerts = Vec::new();
        let mut last_error = None;
        let mut any_succeeded = false;

        for risk in Risk::ALL {
            let mut params = vec![("riskId", risk_id(risk).to_string())];
            if let Some(base) = base_url {
                params.push(("baseurl", base.to_string()));
            }
            match self.view::<AlertsResponse>("alert", "alerts", &params).await {
                Ok(res) => {
                    any_succeeded = true;
                    alerts.extend(res.alerts);
                }
                Err(e) => {
                    debug!("{} risk alerts unavailable: {}", risk, e);
                    last_error = Some(e);
                }
            }
        }

        match (any_succeeded, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(group_alerts(alerts)),
        }
    }

    async fn stop_scan(&self, component: &str, scan_id: &str) {
        if let Err(e) = self
            .action::<serde_json::Value>(component, "stop", &[("scanId", scan_id.to_string())])
            .await
        {
            debug!("Could not stop {} scan {}: {}", component, scan_id, e);
        }
    }
}

#[async_trait::async_trait]
impl ScanEngine for EngineClient {
    async fn ensure_running(&self) -> Result<String> {
        self.ensure_open()?;

        if let Ok(version) = self.version().await {
            debug!("Scanning engine {} is live at {}", version, self.config.base_url());
            *self.version.lock().await = Some(version.clone());
            return Ok(version);
        }

        let command = match &self.config.launch_command {
            Some(command) => command.clone(),
            None => {
                return Err(Error::EngineStart(format!(
                    "engine not reachable at {} and no launch command is configured",
                    self.config.base_url()
                )))
            }
        };

        {
            let mut process = self.process.lock().await;
            let alive = process.as_mut().map(|p| p.is_running()).unwrap_or(false);
            if !alive {
                *process = Some(EngineProcess::launch(
                    &command,
                    &self.config.host,
                    self.config.port,
                    &self.config.launch_args,
                )?);
            }
        }

        for attempt in 1..=self.config.startup_max_attempts {
            tokio::time::sleep(self.config.startup_poll_interval).await;

            match self.version().await {
                Ok(version) => {
                    info!("Scanning engine {} ready after {} probes", version, attempt);
                    *self.version.lock().await = Some(version.clone());
                    return Ok(version);
                }
                Err(e) => debug!(
                    "Engine not ready (probe {}/{}): {}",
                    attempt, self.config.startup_max_attempts, e
                ),
            }

            if let Some(process) = self.process.lock().await.as_mut() {
                if !process.is_running() {
                    return Err(Error::EngineStart(String::from(
                        "engine process exited during startup",
                    )));
                }
            }
        }

        Err(Error::EngineStartTimeout {
            attempts: self.config.startup_max_attempts,
        })
    }

    async fn configure(&self, mode: ScanMode) -> ConfigureReport {
        info!("Configuring scanning engine for {} mode", mode);
        let report = self.apply_settings(&mode.settings()).await;
        if report.is_complete() {
            debug!("All {} settings applied", report.applied.len());
        } else {
            warn!(
                "Engine running with partial configuration: {} applied, {} failed ({})",
                report.applied.len(),
                report.failed.len(),
                report.failed.join(", ")
            );
        }
        report
    }

    async fn exclude_from_scan(&self, pattern: &str) {
        if self.ensure_open().is_err() {
            return;
        }
        for component in ["spider", "ascan"] {
            if let Err(e) = self
                .action::<serde_json::Value>(component, "excludeFromScan", &[("regex", pattern.to_string())])
                .await
            {
                warn!("Could not exclude '{}' from {}: {}", pattern, component, e);
            }
        }
    }

    async fn access_url(&self, url: &str) -> bool {
        if let Err(e) = self.ensure_open() {
            warn!("Not accessing {}: {}", url, e);
            return false;
        }
        match self
            .action::<serde_json::Value>(
                "core",
                "accessUrl",
                &[("url", url.to_string()), ("followRedirects", String::from("true"))],
            )
            .await
        {
            Ok(_) => {
                debug!("Accessed {}", url);
                true
            }
            Err(e) => {
                warn!("Could not access {} through the engine: {}", url, e);
                false
            }
        }
    }

    async fn spider_scan(&self, url: &str, max_depth: u32, budget: Duration) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.apply_setting(&Setting::new("spider.max_depth", max_depth)).await;

        let start: ScanStartResponse = self
            .action("spider", "scan", &[("url", url.to_string()), ("recurse", String::from("true"))])
            .await?;
        let scan_id = value_to_string(&start.scan);
        info!("Spider scan {} started for {} (max depth {})", scan_id, url, max_depth);

        let attempts = StuckScanPolicy::attempts_for(budget, self.config.poll_interval);
        let client = self;
        let id = scan_id.as_str();
        let summary = poll_progress(
            &format!("spider {} ({})", scan_id, url),
            StuckScanPolicy::timeout_only(attempts),
            self.config.poll_interval,
            move || client.scan_status("spider", id),
        )
        .await;

        if summary.termination != ScanTermination::Completed {
            self.stop_scan("spider", &scan_id).await;
        }

        let urls = match self
            .view::<SpiderResultsResponse>("spider", "results", &[("scanId", scan_id.clone())])
            .await
        {
            Ok(res) => res.results,
            Err(e) => {
                warn!("Spider {} results unavailable: {}", scan_id, e);
                Vec::new()
            }
        };
        info!("Spider scan {} discovered {} URLs ({}%)", scan_id, urls.len(), summary.progress);
        Ok(urls)
    }

    async fn active_scan(&self, url: &str, budget: Duration) -> Result<ActiveScanHandle> {
        self.ensure_open()?;

        let start: ScanStartResponse = self
            .action(
                "ascan",
                "scan",
                &[
                    ("url", url.to_string()),
                    ("recurse", String::from("true")),
                    ("inScopeOnly", String::from("false")),
                ],
            )
            .await?;
        let scan_id = value_to_string(&start.scan);
        info!("Active scan {} started for {}", scan_id, url);

        let policy = self
            .config
            .stuck_policy
            .with_max_attempts(StuckScanPolicy::attempts_for(budget, self.config.poll_interval));
        let client = self;
        let id = scan_id.as_str();
        let summary = poll_progress(
            &format!("active scan {} ({})", scan_id, url),
            policy,
            self.config.poll_interval,
            move || client.scan_status("ascan", id),
        )
        .await;

        if summary.termination != ScanTermination::Completed {
            self.stop_scan("ascan", &scan_id).await;
        }

        Ok(ActiveScanHandle {
            scan_id,
            url: url.to_string(),
            termination: summary.termination,
            progress: summary.progress,
            polls: summary.polls,
        })
    }

    async fn wait_for_passive(&self, max_wait: Duration) -> u64 {
        if self.ensure_open().is_err() {
            return 0;
        }
        let started = Instant::now();

        loop {
            match self.records_to_scan().await {
                Ok(0) => {
                    debug!("Passive scan settled after {:?}", started.elapsed());
                    return 0;
                }
                Ok(remaining) => {
                    if started.elapsed() >= max_wait {
                        warn!(
                            "Passive scan still has {} records queued after {:?}; continuing",
                            remaining, max_wait
                        );
                        return remaining;
                    }
                    debug!("Passive scan has {} records remaining", remaining);
                }
                Err(e) => {
                    warn!("Passive scan queue unavailable: {}", e);
                    return 0;
                }
            }
            tokio::time::sleep(self.config.passive_poll_interval).await;
        }
    }

    async fn get_results(&self, base_url: Option<&str>) -> EngineResults {
        if let Err(e) = self.ensure_open() {
            warn!("Not retrieving results: {}", e);
            return EngineResults::empty();
        }

        let (findings, source) = match self.fetch_alerts(base_url).await {
            Ok(alerts) => (group_alerts(alerts), ResultSource::Alerts),
            Err(e) => {
                warn!("Bulk alert retrieval failed ({}); falling back to summary", e);
                match self.fetch_summary(base_url).await {
                    Ok(findings) => (findings, ResultSource::Summary),
                    Err(e) => {
                        warn!("Alert summary failed ({}); falling back to per-risk queries", e);
                        match self.fetch_by_risk(base_url).await {
                            Ok(findings) => (findings, ResultSource::ByRisk),
                            Err(e) => {
                                warn!("All alert retrieval tiers failed ({}); returning empty result", e);
                                (Vec::new(), ResultSource::Empty)
                            }
                        }
                    }
                }
            }
        };

        let discovered_urls = self.discovered_urls(base_url).await;
        let passive_record_count = match self.records_to_scan().await {
            Ok(n) => n,
            Err(e) => {
                debug!("Passive record count unavailable: {}", e);
                0
            }
        };

        EngineResults {
            findings,
            discovered_urls,
            passive_record_count,
            source,
            retrieved_at: chrono::Utc::now(),
        }
    }

    async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Engine session already shut down");
            return;
        }
        info!("Shutting down scanning engine session");

        if let Err(e) = self
            .request::<serde_json::Value>("core", "action", "shutdown", &[])
            .await
        {
            warn!("Graceful engine shutdown request failed: {}", e);
        }

        let process = self.process.lock().await.take();
        if let Some(mut engine) = process {
            if !engine.wait_for_exit(self.config.shutdown_grace).await {
                engine.kill(Duration::from_secs(5)).await;
            }
        }
    }
}
