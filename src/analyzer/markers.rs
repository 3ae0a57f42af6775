use regex::Regex;

use crate::models::{BaselineProfile, Confidence, ResponseProfile};
use crate::techniques::{Signal, Technique};

/// A technique-specific signal found in the variant response.
#[derive(Debug, Clone)]
pub struct MarkerHit {
    pub description: String,
    pub strength: Confidence,
}

/// Backend-exposure tokens with the confidence each carries. Stack traces
/// and SQL errors are unambiguous; server banners less so.
const BACKEND_TOKENS: &[(&str, Confidence)] = &[
    (r"(?i)traceback \(most recent call last\)", Confidence::High),
    (r"(?i)\bstack trace\b", Confidence::High),
    (r"(?i)sql syntax", Confidence::High),
    (r"(?i)\bmysql_\w+\(", Confidence::High),
    (r"(?i)\bora-\d{5}", Confidence::High),
    (r"(?i)unhandled exception", Confidence::High),
    (r"(?i)internal server error", Confidence::Medium),
    (r"(?i)\bdebug mode\b", Confidence::Medium),
    (r"(?i)\bfatal error\b", Confidence::Medium),
];

const BACKEND_SERVERS: &[&str] = &[
    "apache", "nginx", "iis", "tomcat", "jetty", "gunicorn", "uwsgi",
];

/// Scans responses for the evaluator's rule (e): reflected payloads,
/// echoed headers, backend exposure, and timing anomalies.
pub struct MarkerScanner {
    backend_tokens: Vec<(Regex, Confidence)>,
    timing_anomaly_ms: u64,
}

impl MarkerScanner {
    pub fn new(timing_anomaly_ms: u64) -> Self {
        let backend_tokens = BACKEND_TOKENS
            .iter()
            .map(|(pattern, strength)| {
                (
                    Regex::new(pattern).expect("builtin marker pattern compiles"),
                    *strength,
                )
            })
            .collect();
        Self {
            backend_tokens,
            timing_anomaly_ms,
        }
    }

    /// Strongest marker found, if any. Checks are ordered by strength so
    /// the first hit can return early.
    pub fn scan(
        &self,
        baseline: &BaselineProfile,
        response: &ResponseProfile,
        technique: &Technique,
        token: &str,
    ) -> Option<MarkerHit> {
        if technique.signal == Signal::ReflectedToken && response.body.contains(token) {
            return Some(MarkerHit {
                description: format!("probe token {} reflected in response body", token),
                strength: Confidence::High,
            });
        }

        for (pattern, strength) in &self.backend_tokens {
            if let Some(found) = pattern.find(&response.body) {
                return Some(MarkerHit {
                    description: format!("backend exposed: \"{}\" in body", found.as_str()),
                    strength: *strength,
                });
            }
        }

        if let Signal::EchoedHeader(name) = technique.signal {
            if response.header(&name.to_lowercase()).is_some() {
                return Some(MarkerHit {
                    description: format!("injected header {} echoed back", name),
                    strength: Confidence::Medium,
                });
            }
        }

        if let Some(hit) = self.server_divergence(baseline, response) {
            return Some(hit);
        }

        // Redirect target moved relative to baseline: the variant was
        // routed differently.
        if (300..400).contains(&response.status) {
            let observed = response.header("location");
            if let Some(location) = observed {
                if baseline.header("location") != Some(location) {
                    return Some(MarkerHit {
                        description: format!("redirect location diverged: {}", location),
                        strength: Confidence::Medium,
                    });
                }
            }
        }

        if technique.signal == Signal::TimingAnomaly
            && response.latency_ms >= self.timing_anomaly_ms
        {
            return Some(MarkerHit {
                description: format!(
                    "latency {}ms beyond anomaly threshold {}ms",
                    response.latency_ms, self.timing_anomaly_ms
                ),
                strength: Confidence::Low,
            });
        }

        None
    }

    fn server_divergence(
        &self,
        baseline: &BaselineProfile,
        response: &ResponseProfile,
    ) -> Option<MarkerHit> {
        let baseline_server = baseline.header("server").unwrap_or("").to_lowercase();

        if let Some(server) = response.header("server") {
            let lower = server.to_lowercase();
            for backend in BACKEND_SERVERS {
                if lower.contains(backend) && !baseline_server.contains(backend) {
                    return Some(MarkerHit {
                        description: format!("origin server banner exposed: {}", server),
                        strength: Confidence::Medium,
                    });
                }
            }
        }

        if response.header("x-powered-by").is_some() && baseline.header("x-powered-by").is_none() {
            return Some(MarkerHit {
                description: format!(
                    "x-powered-by exposed: {}",
                    response.header("x-powered-by").unwrap_or_default()
                ),
                strength: Confidence::Medium,
            });
        }

        None
    }
}
