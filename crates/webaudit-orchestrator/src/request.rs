//! Audit request model and validation

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use webaudit_core::{normalize_url, Error, Result, TargetUrl};

pub const MAX_ENDPOINTS: usize = 50;
const DEPTH_RANGE: (u32, u32) = (1, 10);
const TIMEOUT_RANGE_MS: (u64, u64) = (10_000, 1_800_000);
const BATCH_SIZE_RANGE: (usize, usize) = (1, 20);

/// Input to an audit run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub options: AuditOptions,
}

/// Per-run scan options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditOptions {
    /// Spider depth, 1..=10
    pub max_depth: u32,
    /// Per-URL scan budget in milliseconds, 10s..=30min
    pub timeout: u64,
    /// Skip the active scan; rely on passive analysis only
    pub passive_scan_only: bool,
    /// URLs per batch, 1..=20
    pub batch_size: usize,
    /// URL prefixes or regexes kept out of the scan
    pub exclude_urls: Vec<String>,
    /// Skip discovery; scan `endpoints` exactly as given
    pub skip_crawling: bool,
    /// Concrete endpoints for endpoint-only mode
    pub endpoints: Vec<String>,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            max_depth: 5,
            timeout: 180_000,
            passive_scan_only: false,
            batch_size: 5,
            exclude_urls: Vec::new(),
            skip_crawling: false,
            endpoints: Vec::new(),
        }
    }
}

impl AuditOptions {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Endpoint-only mode: crawling skipped and concrete endpoints supplied
    pub fn endpoint_only(&self) -> bool {
        self.skip_crawling && !self.endpoints.is_empty()
    }
}

impl AuditRequest {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            options: AuditOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AuditOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse a JSON request. Malformed or wrong-typed fields are
    /// validation errors.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::validation("request", e.to_string()))
    }

    /// Check every field; the first problem found is returned
    pub fn validate(&self) -> Result<()> {
        let opts = &self.options;

        if self.endpoints.is_empty() {
            return Err(Error::validation("endpoints", "at least one endpoint is required"));
        }
        if self.endpoints.len() > MAX_ENDPOINTS {
            return Err(Error::validation(
                "endpoints",
                format!("at most {} endpoints are allowed, got {}", MAX_ENDPOINTS, self.endpoints.len()),
            ));
        }
        check_urls("endpoints", &self.endpoints)?;

        check_range("options.maxDepth", opts.max_depth, DEPTH_RANGE)?;
        check_range("options.timeout", opts.timeout, TIMEOUT_RANGE_MS)?;
        check_range("options.batchSize", opts.batch_size, BATCH_SIZE_RANGE)?;

        if opts.endpoints.len() > MAX_ENDPOINTS {
            return Err(Error::validation(
                "options.endpoints",
                format!("at most {} endpoints are allowed", MAX_ENDPOINTS),
            ));
        }
        check_urls("options.endpoints", &opts.endpoints)?;

        for pattern in &opts.exclude_urls {
            ExcludeRule::parse(pattern)?;
        }
        Ok(())
    }

    /// Resolve the URLs to scan: endpoint-only mode swaps in
    /// `options.endpoints`; duplicates and excluded URLs are dropped.
    pub fn targets(&self) -> Result<Vec<TargetUrl>> {
        let source = if self.options.endpoint_only() {
            debug!("Endpoint-only mode: scanning {} supplied endpoints", self.options.endpoints.len());
            &self.options.endpoints
        } else {
            &self.endpoints
        };

        let rules = self.exclude_rules()?;
        let mut targets: Vec<TargetUrl> = Vec::with_capacity(source.len());
        for raw in source {
            let target = TargetUrl::parse(raw)?;
            if let Some(rule) = rules.iter().find(|r| r.matches(target.as_str())) {
                warn!("Skipping {}: excluded by '{}'", target, rule.pattern);
                continue;
            }
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        Ok(targets)
    }

    pub fn exclude_rules(&self) -> Result<Vec<ExcludeRule>> {
        self.options.exclude_urls.iter().map(|p| ExcludeRule::parse(p)).collect()
    }
}

fn check_urls(field: &str, urls: &[String]) -> Result<()> {
    for (i, raw) in urls.iter().enumerate() {
        TargetUrl::parse(raw)
            .map_err(|e| Error::validation(format!("{}[{}]", field, i), e.to_string()))?;
    }
    Ok(())
}

fn check_range<T>(field: &str, value: T, (min, max): (T, T)) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(Error::validation(
            field,
            format!("must be between {} and {}, got {}", min, max, value),
        ));
    }
    Ok(())
}

/// One `excludeUrls` entry.
///
/// Entries that look like URLs exclude everything under that prefix;
/// anything else is treated as a regex over the full URL.
#[derive(Debug, Clone)]
pub struct ExcludeRule {
    pub pattern: String,
    regex: Regex,
    prefix: bool,
}

impl ExcludeRule {
    pub fn parse(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(Error::validation("options.excludeUrls", "empty exclusion pattern"));
        }

        let prefix = pattern.starts_with("http://") || pattern.starts_with("https://");
        let pattern = if prefix {
            normalize_prefix(pattern)
        } else {
            pattern.to_string()
        };
        let source = if prefix {
            format!("^{}.*", regex::escape(&pattern))
        } else {
            pattern.clone()
        };
        let regex = Regex::new(&source).map_err(|e| {
            Error::validation("options.excludeUrls", format!("invalid pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            pattern,
            regex,
            prefix,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        if self.prefix {
            url.starts_with(&self.pattern)
        } else {
            self.regex.is_match(url)
        }
    }

    /// Regex handed to the engine's exclusion list
    pub fn engine_pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Normalize a URL prefix the way targets are normalized, without the
/// root slash `url` appends to bare origins.
fn normalize_prefix(pattern: &str) -> String {
    let mut normalized = normalize_url(pattern);
    if !pattern.ends_with('/') && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}
