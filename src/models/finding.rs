use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::techniques::Category;

/// What the evaluator concluded about one technique execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Blocked,
    Bypassed,
    Inconclusive,
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Blocked => "BLOCKED",
            Verdict::Bypassed => "BYPASSED",
            Verdict::Inconclusive => "INCONCLUSIVE",
            Verdict::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// One tier down, saturating at Low. Applied to results produced while
    /// the target was rate-limiting us.
    pub fn downgraded(self) -> Self {
        match self {
            Confidence::High => Confidence::Medium,
            Confidence::Medium | Confidence::Low => Confidence::Low,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        };
        write!(f, "{}", s)
    }
}

/// Stable five-level severity vocabulary consumed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn numeric_value(&self) -> u8 {
        match self {
            Severity::Critical => 5,
            Severity::High => 4,
            Severity::Medium => 3,
            Severity::Low => 2,
            Severity::Info => 1,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        };
        write!(f, "{}", s)
    }
}

/// Diff summary of the variant response against the baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub summary: String,
    pub baseline_status: u16,
    pub observed_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl Evidence {
    pub fn status_pair(baseline: u16, observed: u16, summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            baseline_status: baseline,
            observed_status: Some(observed),
            size_delta: None,
            marker: None,
        }
    }

    pub fn transport(baseline: u16, summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            baseline_status: baseline,
            observed_status: None,
            size_delta: None,
            marker: None,
        }
    }

    pub fn with_size_delta(mut self, delta: i64) -> Self {
        self.size_delta = Some(delta);
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }
}

/// One structured assessment result for a (target, technique) pair.
///
/// Carries only the target identifier, never a session back-reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub technique: String,
    pub technique_name: String,
    pub category: Category,
    pub target: String,
    pub verdict: Verdict,
    pub confidence: Confidence,
    pub severity: Severity,
    pub evidence: Evidence,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    /// Dedup key used by the aggregator: retried executions of the same
    /// technique with the same verdict collapse into one Finding.
    pub fn dedup_key(&self) -> (String, String, Verdict) {
        (self.technique.clone(), self.target.clone(), self.verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical.numeric_value() > Severity::High.numeric_value());
        assert!(Severity::High.numeric_value() > Severity::Medium.numeric_value());
        assert!(Severity::Medium.numeric_value() > Severity::Low.numeric_value());
        assert!(Severity::Low.numeric_value() > Severity::Info.numeric_value());
    }

    #[test]
    fn test_confidence_downgrade_saturates() {
        assert_eq!(Confidence::High.downgraded(), Confidence::Medium);
        assert_eq!(Confidence::Medium.downgraded(), Confidence::Low);
        assert_eq!(Confidence::Low.downgraded(), Confidence::Low);
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        let back: Severity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Severity::Critical);
    }

    #[test]
    fn test_finding_export_field_names() {
        let finding = Finding {
            technique: "xff-loopback".into(),
            technique_name: "X-Forwarded-For: 127.0.0.1".into(),
            category: Category::Header,
            target: "https://example.com".into(),
            verdict: Verdict::Bypassed,
            confidence: Confidence::High,
            severity: Severity::Medium,
            evidence: Evidence::status_pair(403, 200, "status flip"),
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&finding).unwrap();
        for field in [
            "technique",
            "category",
            "target",
            "verdict",
            "confidence",
            "severity",
            "evidence",
            "timestamp",
        ] {
            assert!(value.get(field).is_some(), "missing export field {field}");
        }
        assert_eq!(value["verdict"], "BYPASSED");
        assert_eq!(value["severity"], "MEDIUM");
        assert_eq!(value["category"], "header");
    }
}
