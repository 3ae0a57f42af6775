use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use super::ResultSink;
use crate::models::ScanSession;

/// Writes the session as a field-named JSON record. Field names and the
/// severity vocabulary are a stable contract for downstream consumers.
pub struct JsonExporter {
    path: PathBuf,
}

impl JsonExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(path: &str) -> Result<ScanSession> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        let session = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session from {}", path))?;
        Ok(session)
    }
}

impl ResultSink for JsonExporter {
    fn accept(&mut self, session: &ScanSession) -> Result<()> {
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BaselineProfile, Confidence, Evidence, Finding, ScanStatus, Severity, Target, Verdict,
    };
    use crate::techniques::Category;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn session() -> ScanSession {
        ScanSession {
            target: Target::parse("https://example.com").unwrap(),
            baseline: BaselineProfile {
                status: 403,
                size: 280,
                content_hash: "h0".into(),
                header_fingerprint: "server:cloudflare".into(),
                headers: BTreeMap::new(),
                missing_status: Some(403),
                captured_at: Utc::now(),
                degraded: false,
            },
            concurrency: 10,
            findings: vec![Finding {
                technique: "xff-loopback".into(),
                technique_name: "X-Forwarded-For: 127.0.0.1".into(),
                category: Category::Header,
                target: "https://example.com".into(),
                verdict: Verdict::Bypassed,
                confidence: Confidence::High,
                severity: Severity::Medium,
                evidence: Evidence::status_pair(403, 200, "status flip 403 -> 200"),
                timestamp: Utc::now(),
            }],
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
    fn test_export_then_load_roundtrip() {
        let dir = std::env::temp_dir().join("wafpierce-export-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.json");

        let mut exporter = JsonExporter::new(&path);
        exporter.accept(&session()).unwrap();

        let loaded = JsonExporter::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.findings.len(), 1);
        assert_eq!(loaded.findings[0].technique, "xff-loopback");
        assert_eq!(loaded.findings[0].severity, Severity::Medium);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_export_uses_stable_severity_vocabulary() {
        let json = serde_json::to_string(&session()).unwrap();
        assert!(json.contains("\"severity\": \"MEDIUM\"") || json.contains("\"severity\":\"MEDIUM\""));
        assert!(json.contains("\"verdict\": \"BYPASSED\"") || json.contains("\"verdict\":\"BYPASSED\""));
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(JsonExporter::load("/nonexistent/wafpierce.json").is_err());
    }
}
