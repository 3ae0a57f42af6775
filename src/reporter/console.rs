use anyhow::Result;
use colored::Colorize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

use super::ResultSink;
use crate::models::{ScanSession, ScanStatus, ScanSummary, Severity, Verdict};

/// Terminal rendering of a finished session: finding matrix, then a
/// severity summary.
pub struct ConsoleReporter {
    /// Show every finding; default hides Info noise.
    pub show_all: bool,
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "Technique")]
    technique: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Evidence")]
    evidence: String,
}

impl ConsoleReporter {
    pub fn new(show_all: bool) -> Self {
        Self { show_all }
    }

    fn severity_cell(severity: Severity) -> String {
        match severity {
            Severity::Critical => "CRITICAL".red().bold().to_string(),
            Severity::High => "HIGH".red().to_string(),
            Severity::Medium => "MEDIUM".yellow().to_string(),
            Severity::Low => "LOW".blue().to_string(),
            Severity::Info => "INFO".cyan().to_string(),
        }
    }

    fn verdict_cell(verdict: Verdict) -> String {
        match verdict {
            Verdict::Bypassed => "BYPASSED".red().bold().to_string(),
            Verdict::Blocked => "BLOCKED".green().to_string(),
            Verdict::Inconclusive => "INCONCLUSIVE".yellow().to_string(),
            Verdict::Error => "ERROR".magenta().to_string(),
        }
    }

    fn print_header(&self, session: &ScanSession) {
        println!("\n{} {}", "Target:".bold(), session.target.url);

        match &session.target.waf {
            Some(m) => println!(
                "{} {} ({} confidence)",
                "WAF:".bold(),
                m.vendor,
                m.confidence.to_string().to_lowercase()
            ),
            None => println!("{} not identified", "WAF:".bold()),
        }
        if let Some(cdn) = &session.target.cdn {
            println!("{} {}", "CDN:".bold(), cdn);
        }

        let baseline = &session.baseline;
        let degraded = if baseline.degraded {
            " (degraded)".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "{} HTTP {} | {} bytes{}",
            "Baseline:".bold(),
            baseline.status,
            baseline.size,
            degraded
        );

        if session.status == ScanStatus::PartiallyScanned {
            println!(
                "{}",
                format!(
                    "Partially scanned: {} skipped, {} errored, {} throttled",
                    session.skipped, session.errored, session.throttled
                )
                .yellow()
            );
        }
    }

    fn print_findings(&self, session: &ScanSession) {
        let mut findings: Vec<_> = session
            .findings
            .iter()
            .filter(|f| self.show_all || f.severity != Severity::Info)
            .collect();
        findings.sort_by(|a, b| b.severity.numeric_value().cmp(&a.severity.numeric_value()));

        if findings.is_empty() {
            println!(
                "\n{}",
                "No bypasses found - target appears properly protected.".green()
            );
            return;
        }

        let rows: Vec<TableRow> = findings
            .iter()
            .map(|f| TableRow {
                technique: f.technique_name.clone(),
                category: f.category.to_string(),
                verdict: Self::verdict_cell(f.verdict),
                confidence: f.confidence.to_string(),
                severity: Self::severity_cell(f.severity),
                evidence: f.evidence.summary.clone(),
            })
            .collect();

        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string();

        println!("\n{}", table);
    }

    fn print_summary(&self, session: &ScanSession) {
        let summary = ScanSummary::from_session(session);

        println!("\n{}", "Summary".bold().underline());
        println!(
            "{} techniques assessed in {:.2}s ({} cached)",
            summary.total_techniques,
            summary.duration_ms as f64 / 1000.0,
            session.cached
        );
        println!(
            "  {}: {}  {}: {}  {}: {}  {}: {}",
            "bypassed".red(),
            summary.bypassed,
            "blocked".green(),
            summary.blocked,
            "inconclusive".yellow(),
            summary.inconclusive,
            "errors".magenta(),
            summary.errored
        );

        if summary.critical_count > 0 {
            println!("  {}: {}", "CRITICAL".red().bold(), summary.critical_count);
        }
        if summary.high_count > 0 {
            println!("  {}: {}", "HIGH".red(), summary.high_count);
        }
        if summary.medium_count > 0 {
            println!("  {}: {}", "MEDIUM".yellow(), summary.medium_count);
        }
        if summary.low_count > 0 {
            println!("  {}: {}", "LOW".blue(), summary.low_count);
        }
        println!();
    }
}

impl ResultSink for ConsoleReporter {
    fn accept(&mut self, session: &ScanSession) -> Result<()> {
        self.print_header(session);
        self.print_findings(session);
        self.print_summary(session);
        Ok(())
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
