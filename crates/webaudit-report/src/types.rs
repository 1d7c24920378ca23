//! Report data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use webaudit_core::{impact_score, Confidence, Effort, FindingInstance, RawFinding, Risk};

use crate::effort::resolve_effort;
use crate::grouping::group_by_website;
use crate::recommendations::recommend;
use crate::summary::summarize;

// ── Issue ────────────────────────────────────────────────────────────────────

/// A deduplicated, scored finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Identity key: the engine id, or the title when the engine gave none
    pub id: String,
    pub title: String,
    pub risk: Risk,
    pub confidence: Confidence,
    pub effort: Effort,
    /// `round(base(risk) * multiplier(confidence))`, in [0, 10]
    pub impact_score: u8,
    pub description: String,
    pub solution: String,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wasc_id: Option<u32>,
    /// Normalized URLs, no duplicates
    #[serde(default)]
    pub affected_urls: Vec<String>,
    /// Distinct (url, method, parameter) instances seen, at least 1
    pub occurrences: u32,
    #[serde(default)]
    pub instances: Vec<FindingInstance>,
}

impl Issue {
    /// Lift a raw finding into an issue with no instances recorded yet
    pub fn from_finding(finding: &RawFinding) -> Self {
        Self {
            id: finding.key().to_string(),
            title: finding.name.clone(),
            risk: finding.risk,
            confidence: finding.confidence,
            effort: resolve_effort(&finding.name, finding.risk),
            impact_score: impact_score(finding.risk, finding.confidence),
            description: finding.description.clone(),
            solution: finding.solution.clone(),
            references: finding.references.clone(),
            cwe_id: finding.cwe_id,
            wasc_id: finding.wasc_id,
            affected_urls: Vec::new(),
            occurrences: 1,
            instances: Vec::new(),
        }
    }

    /// Copy of this issue without any URLs or instances
    pub(crate) fn without_instances(&self) -> Self {
        Self {
            affected_urls: Vec::new(),
            instances: Vec::new(),
            occurrences: 1,
            ..self.clone()
        }
    }
}

// ── Distributions ────────────────────────────────────────────────────────────

/// Issue counts per risk level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub informational: usize,
}

impl RiskDistribution {
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut dist = Self::default();
        for issue in issues {
            dist.add(issue.risk);
        }
        dist
    }

    pub fn add(&mut self, risk: Risk) {
        match risk {
            Risk::High => self.high += 1,
            Risk::Medium => self.medium += 1,
            Risk::Low => self.low += 1,
            Risk::Informational => self.informational += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low + self.informational
    }
}

/// Issue counts per remediation effort
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffortDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl EffortDistribution {
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut dist = Self::default();
        for issue in issues {
            match issue.effort {
                Effort::High => dist.high += 1,
                Effort::Medium => dist.medium += 1,
                Effort::Low => dist.low += 1,
            }
        }
        dist
    }
}

// ── Website Reports ──────────────────────────────────────────────────────────

/// Per-site summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSummary {
    pub total_issues: usize,
    pub risk_distribution: RiskDistribution,
    /// Mean impact score of the site's issues (0 when there are none)
    pub risk_score: f64,
}

impl SiteSummary {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let risk_score = if issues.is_empty() {
            0.0
        } else {
            let total: f64 = issues.iter().map(|i| f64::from(i.impact_score)).sum();
            ((total / issues.len() as f64) * 100.0).round() / 100.0
        };
        Self {
            total_issues: issues.len(),
            risk_distribution: RiskDistribution::from_issues(issues),
            risk_score,
        }
    }
}

/// Issues belonging to one origin (scheme + host + port)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteReport {
    pub origin: String,
    pub issues: Vec<Issue>,
    pub summary: SiteSummary,
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Letter grade derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

/// A vulnerability grouped by title across the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopVulnerability {
    pub title: String,
    pub risk: Risk,
    pub effort: Effort,
    pub impact_score: u8,
    pub occurrences: u32,
    pub affected_url_count: usize,
    #[serde(default)]
    pub solution: String,
}

/// Global summary of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_issues: usize,
    pub risk_distribution: RiskDistribution,
    pub effort_distribution: EffortDistribution,
    pub overall_security_score: u8,
    pub grade: Grade,
    pub top_vulnerabilities: Vec<TopVulnerability>,
    pub critical_findings: Vec<TopVulnerability>,
}

// ── Recommendations ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl From<Risk> for Priority {
    fn from(risk: Risk) -> Self {
        match risk {
            Risk::High => Priority::High,
            Risk::Medium => Priority::Medium,
            Risk::Low | Risk::Informational => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub priority: Priority,
    pub title: String,
    pub description: String,
    /// Title of the vulnerability this recommendation addresses, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerability: Option<String>,
}

// ── Run Metadata ─────────────────────────────────────────────────────────────

/// Bookkeeping for one audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub scan_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    pub tool_version: String,
    pub total_scans: usize,
    pub successful_scans: usize,
    pub failed_scans: usize,
    pub total_batches: usize,
    pub successful_batches: usize,
    pub failed_batches: usize,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// When the report was generated
    pub timestamp: DateTime<Utc>,
}

impl RunMetadata {
    pub fn new(scan_mode: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            scan_mode: scan_mode.into(),
            engine_version: None,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            total_scans: 0,
            successful_scans: 0,
            failed_scans: 0,
            total_batches: 0,
            successful_batches: 0,
            failed_batches: 0,
            started_at: now,
            completed_at: None,
            timestamp: now,
        }
    }

    /// Fold another run's counters into this one. The time span widens
    /// to cover both runs.
    pub fn absorb(&mut self, other: &RunMetadata) {
        self.total_scans += other.total_scans;
        self.successful_scans += other.successful_scans;
        self.failed_scans += other.failed_scans;
        self.total_batches += other.total_batches;
        self.successful_batches += other.successful_batches;
        self.failed_batches += other.failed_batches;
        self.started_at = self.started_at.min(other.started_at);
        self.completed_at = match (self.completed_at, other.completed_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if self.engine_version.is_none() {
            self.engine_version = other.engine_version.clone();
        }
    }
}

// ── Audit Report ─────────────────────────────────────────────────────────────

/// Top-level report for one audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Overall scan target, when one was known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub summary: Summary,
    /// Every issue in the run, including those without a resolvable origin
    pub issues: Vec<Issue>,
    pub websites: Vec<WebsiteReport>,
    pub recommendations: Vec<Recommendation>,
    pub metadata: RunMetadata,
}

impl AuditReport {
    /// Derive websites, summary and recommendations from deduplicated issues
    pub fn from_issues(issues: Vec<Issue>, target: Option<&str>, mut metadata: RunMetadata) -> Self {
        let websites = group_by_website(&issues, target);
        let summary = summarize(&issues);
        let recommendations = recommend(&summary);
        metadata.timestamp = Utc::now();

        Self {
            target: target.map(str::to_string),
            summary,
            issues,
            websites,
            recommendations,
            metadata,
        }
    }
}
