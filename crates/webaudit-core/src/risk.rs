//! Risk, confidence and remediation-effort ratings

use serde::{Deserialize, Serialize};

/// Risk level reported for a finding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Risk {
    /// No direct security impact
    #[default]
    Informational,
    /// Minimal risk
    Low,
    /// Moderate risk
    Medium,
    /// Significant risk
    High,
}

impl Risk {
    /// All levels, highest first
    pub const ALL: [Risk; 4] = [Risk::High, Risk::Medium, Risk::Low, Risk::Informational];

    /// Parse an engine risk label ("High", "medium", "Informational", "3").
    /// Unknown labels map to `Informational`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "3" => Risk::High,
            "medium" | "2" => Risk::Medium,
            "low" | "1" => Risk::Low,
            _ => Risk::Informational,
        }
    }

    /// Base score used for the impact calculation
    pub fn base_score(&self) -> f64 {
        match self {
            Risk::High => 9.0,
            Risk::Medium => 6.0,
            Risk::Low => 3.0,
            Risk::Informational => 1.0,
        }
    }

    /// Remediation effort assumed when nothing more specific is known
    pub fn default_effort(&self) -> Effort {
        match self {
            Risk::High => Effort::High,
            Risk::Medium => Effort::Medium,
            Risk::Low | Risk::Informational => Effort::Low,
        }
    }

    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::High => "High",
            Risk::Medium => "Medium",
            Risk::Low => "Low",
            Risk::Informational => "Informational",
        }
    }
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Engine confidence that a finding is real
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    #[default]
    Informational,
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Parse an engine confidence label. "Confirmed" counts as `High`,
    /// "False Positive" as `Informational`, anything unknown as `Low`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "confirmed" | "user confirmed" | "3" | "4" => Confidence::High,
            "medium" | "2" => Confidence::Medium,
            "informational" | "info" | "false positive" | "0" => Confidence::Informational,
            _ => Confidence::Low,
        }
    }

    /// Multiplier applied to the risk base score
    pub fn multiplier(&self) -> f64 {
        match self {
            Confidence::High => 1.0,
            Confidence::Medium => 0.8,
            Confidence::Low => 0.6,
            Confidence::Informational => 0.4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
            Confidence::Informational => "Informational",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Estimated remediation effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::High => "High",
            Effort::Medium => "Medium",
            Effort::Low => "Low",
        }
    }
}

impl std::fmt::Display for Effort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Impact score in [0, 10]: `round(base(risk) * multiplier(confidence))`
pub fn impact_score(risk: Risk, confidence: Confidence) -> u8 {
    (risk.base_score() * confidence.multiplier()).round().clamp(0.0, 10.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!(Risk::parse("High"), Risk::High);
        assert_eq!(Risk::parse(" medium "), Risk::Medium);
        assert_eq!(Risk::parse("1"), Risk::Low);
        assert_eq!(Risk::parse("whatever"), Risk::Informational);
        assert_eq!(Confidence::parse("Confirmed"), Confidence::High);
        assert_eq!(Confidence::parse("False Positive"), Confidence::Informational);
        assert_eq!(Confidence::parse(""), Confidence::Low);
    }

    #[test]
    fn test_impact_score_table() {
        assert_eq!(impact_score(Risk::High, Confidence::High), 9);
        assert_eq!(impact_score(Risk::High, Confidence::Medium), 7);
        assert_eq!(impact_score(Risk::Medium, Confidence::Medium), 5);
        assert_eq!(impact_score(Risk::Medium, Confidence::Low), 4);
        assert_eq!(impact_score(Risk::Low, Confidence::High), 3);
        assert_eq!(impact_score(Risk::Informational, Confidence::Informational), 0);
    }

    #[test]
    fn test_risk_ordering() {
        assert!(Risk::High > Risk::Medium);
        assert!(Risk::Medium > Risk::Low);
        assert!(Risk::Low > Risk::Informational);
        assert_eq!(Risk::Low.default_effort(), Effort::Low);
    }
}
