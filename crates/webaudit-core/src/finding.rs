//! Raw findings - alerts exactly as the scanning engine reported them

use crate::risk::{Confidence, Risk};
use serde::{Deserialize, Serialize};

/// One alert reported by the engine, with every concrete place it was seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFinding {
    /// Engine rule/plugin identifier, when the engine supplied one
    pub id: Option<String>,

    /// Alert name
    pub name: String,

    pub risk: Risk,
    pub confidence: Confidence,

    pub description: String,
    pub solution: String,
    #[serde(default)]
    pub references: Vec<String>,

    /// CWE/WASC classification
    pub cwe_id: Option<u32>,
    pub wasc_id: Option<u32>,

    /// Concrete occurrences
    #[serde(default)]
    pub instances: Vec<FindingInstance>,
}

impl RawFinding {
    /// Create a new finding builder
    pub fn builder(name: impl Into<String>) -> RawFindingBuilder {
        RawFindingBuilder::new(name)
    }

    /// Identity key: the engine id, falling back to the alert name
    pub fn key(&self) -> &str {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.name,
        }
    }
}

/// A single place a finding was observed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingInstance {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub parameter: String,
    #[serde(default)]
    pub evidence: String,
}

fn default_method() -> String {
    String::from("GET")
}

impl FindingInstance {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            parameter: String::new(),
            evidence: String::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = parameter.into();
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }
}

/// Builder for constructing raw findings
pub struct RawFindingBuilder {
    finding: RawFinding,
}

impl RawFindingBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            finding: RawFinding {
                id: None,
                name: name.into(),
                risk: Risk::Informational,
                confidence: Confidence::Medium,
                description: String::new(),
                solution: String::new(),
                references: Vec::new(),
                cwe_id: None,
                wasc_id: None,
                instances: Vec::new(),
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.finding.id = Some(id.into());
        self
    }

    pub fn risk(mut self, risk: Risk) -> Self {
        self.finding.risk = risk;
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.finding.confidence = confidence;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.finding.description = description.into();
        self
    }

    pub fn solution(mut self, solution: impl Into<String>) -> Self {
        self.finding.solution = solution.into();
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.finding.references.push(reference.into());
        self
    }

    pub fn cwe(mut self, cwe_id: u32) -> Self {
        self.finding.cwe_id = Some(cwe_id);
        self
    }

    pub fn wasc(mut self, wasc_id: u32) -> Self {
        self.finding.wasc_id = Some(wasc_id);
        self
    }

    pub fn instance(mut self, instance: FindingInstance) -> Self {
        self.finding.instances.push(instance);
        self
    }

    pub fn build(self) -> RawFinding {
        self.finding
    }
}
