//! Alert payloads from the engine's control API and their conversion
//! into `RawFinding`s

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use webaudit_core::{Confidence, FindingInstance, RawFinding, Risk};

/// One alert instance as returned by the alert views.
///
/// The engine reports every field as a string; numeric ids are parsed
/// leniently.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiAlert {
    #[serde(rename = "pluginId")]
    pub plugin_id: String,
    #[serde(rename = "alertRef")]
    pub alert_ref: String,
    pub alert: String,
    pub name: String,
    pub risk: String,
    pub confidence: String,
    pub description: String,
    pub solution: String,
    pub reference: String,
    pub url: String,
    pub method: String,
    pub param: String,
    pub evidence: String,
    pub cweid: String,
    pub wascid: String,
}

impl ApiAlert {
    fn title(&self) -> &str {
        if !self.alert.is_empty() {
            &self.alert
        } else {
            &self.name
        }
    }

    fn id(&self) -> Option<String> {
        [&self.plugin_id, &self.alert_ref]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
    }

    fn instance(&self) -> Option<FindingInstance> {
        if self.url.trim().is_empty() {
            return None;
        }
        let method = if self.method.is_empty() { "GET" } else { self.method.as_str() };
        Some(
            FindingInstance::new(self.url.trim())
                .with_method(method)
                .with_parameter(self.param.as_str())
                .with_evidence(self.evidence.as_str()),
        )
    }
}

/// `{"alerts": [...]}`
#[derive(Debug, Deserialize)]
pub struct AlertsResponse {
    #[serde(default)]
    pub alerts: Vec<ApiAlert>,
}

/// `{"alertsSummary": {"High": 1, ...}}`
#[derive(Debug, Deserialize)]
pub struct AlertsSummaryResponse {
    #[serde(rename = "alertsSummary", default)]
    pub alerts_summary: HashMap<String, serde_json::Value>,
}

/// Group alert instances into findings by `(id, title)`, preserving the
/// order in which each finding was first seen and dropping repeated
/// instances.
pub fn group_alerts(alerts: Vec<ApiAlert>) -> Vec<RawFinding> {
    let mut order: Vec<(Option<String>, String)> = Vec::new();
    let mut grouped: HashMap<(Option<String>, String), RawFinding> = HashMap::new();

    for alert in alerts {
        let key = (alert.id(), alert.title().to_string());
        let instance = alert.instance();

        let finding = grouped.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            to_finding(&alert)
        });

        if let Some(instance) = instance {
            if !finding.instances.contains(&instance) {
                finding.instances.push(instance);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| grouped.remove(&key))
        .collect()
}

fn to_finding(alert: &ApiAlert) -> RawFinding {
    RawFinding {
        id: alert.id(),
        name: alert.title().to_string(),
        risk: Risk::parse(&alert.risk),
        confidence: Confidence::parse(&alert.confidence),
        description: alert.description.trim().to_string(),
        solution: alert.solution.trim().to_string(),
        references: split_references(&alert.reference),
        cwe_id: parse_positive(&alert.cweid),
        wasc_id: parse_positive(&alert.wascid),
        instances: Vec::new(),
    }
}

fn split_references(reference: &str) -> Vec<String> {
    reference
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// The engine uses "-1" and "0" for "no classification"
fn parse_positive(value: &str) -> Option<u32> {
    value.trim().parse::<i64>().ok().filter(|n| *n > 0).map(|n| n as u32)
}

/// Synthesize one placeholder finding per risk level from summary counts.
/// Used only when detailed alert retrieval is unavailable.
pub fn findings_from_summary(summary: &HashMap<String, serde_json::Value>) -> Vec<RawFinding> {
    let mut findings = Vec::new();
    for risk in Risk::ALL {
        let count = summary
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(risk.as_str()))
            .and_then(|(_, v)| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0);
        if count == 0 {
            continue;
        }
        findings.push(
            RawFinding::builder(format!("Unclassified {} risk alerts", risk))
                .risk(risk)
                .confidence(Confidence::Low)
                .description(format!(
                    "The engine reported {} {} risk alert(s); details were unavailable.",
                    count, risk
                ))
                .solution("Re-run the audit to retrieve full alert details.")
                .build(),
        );
    }
    findings
}

/// Which retrieval tier produced a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultSource {
    Alerts,
    Summary,
    ByRisk,
    Empty,
}

/// Everything collected from the engine for one retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResults {
    pub findings: Vec<RawFinding>,
    pub discovered_urls: Vec<String>,
    pub passive_record_count: u64,
    pub source: ResultSource,
    pub retrieved_at: DateTime<Utc>,
}

impl EngineResults {
    pub fn empty() -> Self {
        Self {
            findings: Vec::new(),
            discovered_urls: Vec::new(),
            passive_record_count: 0,
            source: ResultSource::Empty,
            retrieved_at: Utc::now(),
        }
    }
}
