use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BaselineProfile, Finding, Severity, Target, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanStatus {
    Complete,
    PartiallyScanned,
}

/// The finished product of one scan: owns its findings by value and is
/// handed to the result sink once execution ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub target: Target,
    pub baseline: BaselineProfile,
    pub concurrency: usize,
    pub findings: Vec<Finding>,
    pub status: ScanStatus,
    /// Techniques never dispatched (cancellation).
    pub skipped: usize,
    /// Techniques that ended in a transport error.
    pub errored: usize,
    /// Results produced while the target had us backed off.
    pub throttled: usize,
    /// Results served from the response cache.
    pub cached: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanSession {
    pub fn bypass_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.verdict == Verdict::Bypassed)
            .count()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.findings
            .iter()
            .map(|f| f.severity)
            .max_by_key(|s| s.numeric_value())
    }
}

/// Per-severity counts for console summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total_techniques: usize,
    pub bypassed: usize,
    pub blocked: usize,
    pub inconclusive: usize,
    pub errored: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub info_count: usize,
    pub duration_ms: u64,
}

impl ScanSummary {
    pub fn from_session(session: &ScanSession) -> Self {
        let mut summary = Self {
            total_techniques: session.findings.len(),
            bypassed: 0,
            blocked: 0,
            inconclusive: 0,
            errored: 0,
            critical_count: 0,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
            info_count: 0,
            duration_ms: (session.finished_at - session.started_at)
                .num_milliseconds()
                .max(0) as u64,
        };

        for finding in &session.findings {
            match finding.verdict {
                Verdict::Bypassed => summary.bypassed += 1,
                Verdict::Blocked => summary.blocked += 1,
                Verdict::Inconclusive => summary.inconclusive += 1,
                Verdict::Error => summary.errored += 1,
            }
            match finding.severity {
                Severity::Critical => summary.critical_count += 1,
                Severity::High => summary.high_count += 1,
                Severity::Medium => summary.medium_count += 1,
                Severity::Low => summary.low_count += 1,
                Severity::Info => summary.info_count += 1,
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Evidence};
    use crate::techniques::Category;
    use std::collections::BTreeMap;

    fn finding(verdict: Verdict, severity: Severity) -> Finding {
        Finding {
            technique: format!("t-{verdict}-{severity}"),
            technique_name: "test".into(),
            category: Category::Header,
            target: "https://example.com".into(),
            verdict,
            confidence: Confidence::High,
            severity,
            evidence: Evidence::status_pair(403, 200, "test"),
            timestamp: Utc::now(),
        }
    }

    fn session(findings: Vec<Finding>) -> ScanSession {
        ScanSession {
            target: Target::parse("https://example.com").unwrap(),
            baseline: BaselineProfile {
                status: 403,
                size: 280,
                content_hash: "h0".into(),
                header_fingerprint: String::new(),
                headers: BTreeMap::new(),
                missing_status: Some(404),
                captured_at: Utc::now(),
                degraded: false,
            },
            concurrency: 10,
            findings,
            status: ScanStatus::Complete,
            skipped: 0,
            errored: 0,
            throttled: 0,
            cached: 0,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts() {
        let session = session(vec![
            finding(Verdict::Bypassed, Severity::Critical),
            finding(Verdict::Bypassed, Severity::Medium),
            finding(Verdict::Blocked, Severity::Info),
            finding(Verdict::Error, Severity::Info),
        ]);

        let summary = ScanSummary::from_session(&session);
        assert_eq!(summary.total_techniques, 4);
        assert_eq!(summary.bypassed, 2);
        assert_eq!(summary.blocked, 1);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.critical_count, 1);
        assert_eq!(summary.info_count, 2);
    }

    #[test]
    fn test_max_severity() {
        let session = session(vec![
            finding(Verdict::Blocked, Severity::Info),
            finding(Verdict::Bypassed, Severity::High),
        ]);
        assert_eq!(session.max_severity(), Some(Severity::High));
    }

    #[test]
    fn test_session_roundtrips_through_json() {
        let session = session(vec![finding(Verdict::Bypassed, Severity::Critical)]);
        let json = serde_json::to_string(&session).unwrap();
        let back: ScanSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.findings.len(), 1);
        assert_eq!(back.status, ScanStatus::Complete);
    }
}
