use chrono::Utc;
use std::collections::HashSet;

use super::evaluator::Assessment;
use crate::models::{Confidence, Finding, Severity, Verdict};
use crate::techniques::{Category, Technique};

/// Fixed (category, verdict, confidence) -> severity mapping.
///
/// Protocol-level and injection bypasses reach the origin in ways the
/// filter should never allow; header and encoding tricks usually expose
/// less. Anything that is not a bypass is informational.
pub fn classify(category: Category, verdict: Verdict, confidence: Confidence) -> Severity {
    match verdict {
        Verdict::Blocked | Verdict::Inconclusive | Verdict::Error => Severity::Info,
        Verdict::Bypassed => match (category, confidence) {
            (Category::Protocol, Confidence::High) => Severity::Critical,
            (Category::Protocol, _) => Severity::High,
            (Category::Injection, Confidence::High) => Severity::Critical,
            (Category::Injection, _) => Severity::High,
            (Category::BusinessLogic, _) => Severity::High,
            (Category::Header, Confidence::Low) => Severity::Low,
            (Category::Header, _) => Severity::Medium,
            (Category::Encoding, Confidence::Low) => Severity::Low,
            (Category::Encoding, _) => Severity::Medium,
            (Category::Reconnaissance, _) => Severity::Low,
        },
    }
}

/// Single-writer collector fed by the engine's result channel. Owns the
/// findings until the session is assembled; dedups on
/// (technique, target, verdict) so a retried execution never produces a
/// duplicate Finding.
pub struct Aggregator {
    target: String,
    findings: Vec<Finding>,
    seen: HashSet<(String, String, Verdict)>,
}

impl Aggregator {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            findings: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append one assessed result. Returns false when an equivalent
    /// Finding was already collected.
    pub fn append(&mut self, technique: &Technique, assessment: Assessment) -> bool {
        let severity = classify(technique.category, assessment.verdict, assessment.confidence);
        let finding = Finding {
            technique: technique.id.to_string(),
            technique_name: technique.name.to_string(),
            category: technique.category,
            target: self.target.clone(),
            verdict: assessment.verdict,
            confidence: assessment.confidence,
            severity,
            evidence: assessment.evidence,
            timestamp: Utc::now(),
        };

        if !self.seen.insert(finding.dedup_key()) {
            return false;
        }
        self.findings.push(finding);
        true
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}
