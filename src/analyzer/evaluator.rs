use super::markers::MarkerScanner;
use crate::models::{
    BaselineProfile, Confidence, Evidence, ExecutionResult, Outcome, ResponseProfile, Verdict,
};
use crate::techniques::{Signal, Technique};

/// Resolution for the status-flip / missing-marker disagreement: the
/// status code says bypass, but the technique's expected marker never
/// showed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPolicy {
    /// The flip is trusted as-is (matches the reference scanner).
    StatusWins,
    /// The flip is kept but confidence drops to Medium.
    RequireMarker,
}

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Size change ratio (against baseline size) above which a content
    /// change counts as a bypass.
    pub size_delta_ratio: f64,
    /// Latency beyond this is a timing-anomaly marker.
    pub timing_anomaly_ms: u64,
    pub marker_policy: MarkerPolicy,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            size_delta_ratio: 0.10,
            timing_anomaly_ms: 5_000,
            marker_policy: MarkerPolicy::StatusWins,
        }
    }
}

/// Verdict plus the evidence that produced it; the classifier attaches
/// severity and ownership.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub verdict: Verdict,
    pub confidence: Confidence,
    pub evidence: Evidence,
}

/// Ordered rule chain turning raw execution results into verdicts.
/// First match wins, except the marker rule, which runs last and may
/// upgrade a pending Inconclusive.
pub struct Evaluator {
    config: EvaluatorConfig,
    markers: MarkerScanner,
}

fn is_block_code(status: u16) -> bool {
    matches!(status, 401 | 403 | 406 | 429) || (500..600).contains(&status)
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        let markers = MarkerScanner::new(config.timing_anomaly_ms);
        Self { config, markers }
    }

    pub fn evaluate(
        &self,
        baseline: &BaselineProfile,
        result: &ExecutionResult,
        technique: &Technique,
        token: &str,
    ) -> Assessment {
        let response = match &result.outcome {
            Outcome::Failed(failure) => {
                return Assessment {
                    verdict: Verdict::Error,
                    confidence: Confidence::Low,
                    evidence: Evidence::transport(
                        baseline.status,
                        format!("{} failure: {}", failure.kind, failure.detail),
                    ),
                };
            }
            Outcome::Response(r) => r,
        };

        let mut assessment = self.evaluate_response(baseline, response, technique);

        // Marker rule: applied last so it can upgrade an otherwise
        // inconclusive result, and so the marker policy can temper a
        // status-flip verdict.
        let marker = self.markers.scan(baseline, response, technique, token);
        match (assessment.verdict, marker) {
            (Verdict::Inconclusive, Some(hit)) => {
                assessment = Assessment {
                    verdict: Verdict::Bypassed,
                    confidence: hit.strength,
                    evidence: Evidence::status_pair(
                        baseline.status,
                        response.status,
                        hit.description.clone(),
                    )
                    .with_marker(hit.description),
                };
            }
            (Verdict::Bypassed, Some(hit)) => {
                assessment.evidence.marker = Some(hit.description);
            }
            (Verdict::Bypassed, None) => {
                if self.config.marker_policy == MarkerPolicy::RequireMarker
                    && expects_marker(technique)
                {
                    assessment.confidence = assessment.confidence.min(Confidence::Medium);
                    assessment.evidence.summary =
                        format!("{} (expected marker absent)", assessment.evidence.summary);
                }
            }
            _ => {}
        }

        // Results obtained while the target was throttling us are not
        // trustworthy bypass evidence.
        if result.throttled && assessment.verdict == Verdict::Bypassed {
            assessment.confidence = assessment.confidence.downgraded();
        }

        assessment
    }

    fn evaluate_response(
        &self,
        baseline: &BaselineProfile,
        response: &ResponseProfile,
        _technique: &Technique,
    ) -> Assessment {
        let status = response.status;

        // Identical status and content: the filter treated the variant
        // exactly like the reference request. Suppressed on a degraded
        // baseline, where the recorded hash is unreliable.
        if !baseline.degraded
            && status == baseline.status
            && response.content_hash == baseline.content_hash
        {
            return Assessment {
                verdict: Verdict::Blocked,
                confidence: Confidence::High,
                evidence: Evidence::status_pair(
                    baseline.status,
                    status,
                    "response identical to baseline",
                ),
            };
        }

        // A variant answered with a block code is not a bypass, whatever
        // the body says.
        if is_block_code(status) && !(is_block_code(baseline.status) && status != baseline.status) {
            return Assessment {
                verdict: Verdict::Blocked,
                confidence: if status == baseline.status {
                    Confidence::High
                } else {
                    Confidence::Medium
                },
                evidence: Evidence::status_pair(
                    baseline.status,
                    status,
                    format!("variant blocked with {}", status),
                ),
            };
        }

        // Block code flipped to success/redirect.
        if is_block_code(baseline.status) && response.is_success_or_redirect() {
            let delta = response.size as i64 - baseline.size as i64;
            return Assessment {
                verdict: Verdict::Bypassed,
                confidence: Confidence::High,
                evidence: Evidence::status_pair(
                    baseline.status,
                    status,
                    format!("status flip {} -> {}", baseline.status, status),
                )
                .with_size_delta(delta),
            };
        }

        // Same status, different content, meaningful size change.
        if !baseline.degraded && status == baseline.status {
            let delta = response.size as i64 - baseline.size as i64;
            let ratio = delta.unsigned_abs() as f64 / baseline.size.max(1) as f64;
            if response.content_hash != baseline.content_hash && ratio > self.config.size_delta_ratio
            {
                return Assessment {
                    verdict: Verdict::Bypassed,
                    confidence: Confidence::Medium,
                    evidence: Evidence::status_pair(
                        baseline.status,
                        status,
                        format!(
                            "content diverged: {} -> {} bytes ({:.0}% change)",
                            baseline.size,
                            response.size,
                            ratio * 100.0
                        ),
                    )
                    .with_size_delta(delta),
                };
            }
        }

        Assessment {
            verdict: Verdict::Inconclusive,
            confidence: Confidence::Low,
            evidence: Evidence::status_pair(
                baseline.status,
                status,
                "no behavioral change attributable to the technique",
            ),
        }
    }
}

fn expects_marker(technique: &Technique) -> bool {
    matches!(
        technique.signal,
        Signal::ReflectedToken | Signal::EchoedHeader(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    const TOKEN: &str = "wp-0badc0de";

    fn evaluator() -> Evaluator {
        Evaluator::new(EvaluatorConfig::default())
    }

    fn technique(signal: Signal) -> Technique {
        Technique {
            id: "under-test",
            name: "under test",
            category: crate::techniques::Category::Header,
            mutations: &[],
            signal,
        }
    }

    fn baseline(status: u16, size: usize, hash: &str) -> BaselineProfile {
        BaselineProfile {
            status,
            size,
            content_hash: hash.into(),
            header_fingerprint: String::new(),
            headers: BTreeMap::new(),
            missing_status: Some(404),
            captured_at: Utc::now(),
            degraded: false,
        }
    }

    fn response(status: u16, size: usize, hash: &str, body: &str) -> ResponseProfile {
        ResponseProfile {
            status,
            size,
            content_hash: hash.into(),
            headers: BTreeMap::new(),
            body: body.into(),
            latency_ms: 40,
        }
    }

    fn result(outcome: Outcome) -> ExecutionResult {
        ExecutionResult {
            technique_id: "under-test",
            target: "https://example.com".into(),
            outcome,
            throttled: false,
            from_cache: false,
            completed_at: Utc::now(),
        }
    }

    fn assess(baseline_: &BaselineProfile, response_: ResponseProfile) -> Assessment {
        evaluator().evaluate(
            baseline_,
            &result(Outcome::Response(response_)),
            &technique(Signal::None),
            TOKEN,
        )
    }

    #[test]
    fn test_scenario_a_status_flip_is_high_confidence_bypass() {
        let b = baseline(403, 280, "H0");
        let a = assess(&b, response(200, 1450, "H1", "<html>app</html>"));
        assert_eq!(a.verdict, Verdict::Bypassed);
        assert_eq!(a.confidence, Confidence::High);
        assert_eq!(a.evidence.size_delta, Some(1170));
    }

    #[test]
    fn test_scenario_b_identical_response_is_blocked() {
        let b = baseline(404, 150, "H0");
        let a = assess(&b, response(404, 150, "H0", "not found"));
        assert_eq!(a.verdict, Verdict::Blocked);
        assert_eq!(a.confidence, Confidence::High);
    }

    #[test]
    fn test_scenario_c_transport_error() {
        let b = baseline(403, 280, "H0");
        let a = evaluator().evaluate(
            &b,
            &result(Outcome::Failed(crate::models::TransportFailure {
                kind: crate::error::NetworkKind::Timeout,
                detail: "operation timed out".into(),
                latency_ms: 10_000,
            })),
            &technique(Signal::None),
            TOKEN,
        );
        assert_eq!(a.verdict, Verdict::Error);
        assert!(a.evidence.summary.contains("timeout"));
    }

    #[test]
    fn test_identical_hash_never_bypasses_even_with_flip_candidates() {
        // Same status + same hash must win over every bypass rule.
        let b = baseline(200, 500, "same");
        let a = assess(&b, response(200, 500, "same", "body"));
        assert_eq!(a.verdict, Verdict::Blocked);
    }

    #[test]
    fn test_block_code_variant_is_blocked_not_inconclusive() {
        let b = baseline(200, 500, "H0");
        let a = assess(&b, response(403, 120, "H1", "forbidden"));
        assert_eq!(a.verdict, Verdict::Blocked);
        assert_eq!(a.confidence, Confidence::Medium);
    }

    #[test]
    fn test_5xx_baseline_to_2xx_is_flip() {
        let b = baseline(503, 90, "H0");
        let a = assess(&b, response(200, 1200, "H1", "ok"));
        assert_eq!(a.verdict, Verdict::Bypassed);
        assert_eq!(a.confidence, Confidence::High);
    }

    #[test]
    fn test_content_divergence_medium_confidence() {
        let b = baseline(200, 1000, "H0");
        let a = assess(&b, response(200, 1300, "H1", "different page"));
        assert_eq!(a.verdict, Verdict::Bypassed);
        assert_eq!(a.confidence, Confidence::Medium);
        assert_eq!(a.evidence.size_delta, Some(300));
    }

    #[test]
    fn test_small_content_drift_is_inconclusive() {
        // Hash differs but the size moved under the threshold: dynamic
        // pages drift without any bypass.
        let b = baseline(200, 1000, "H0");
        let a = assess(&b, response(200, 1020, "H1", "near identical"));
        assert_eq!(a.verdict, Verdict::Inconclusive);
    }

    #[test]
    fn test_degraded_baseline_skips_hash_and_size_rules() {
        let mut b = baseline(200, 1000, "H0");
        b.degraded = true;

        // Would be Blocked via the identical rule on a healthy baseline.
        let a = assess(&b, response(200, 1000, "H0", "body"));
        assert_eq!(a.verdict, Verdict::Inconclusive);

        // Would be a content-divergence bypass on a healthy baseline.
        let a = assess(&b, response(200, 2000, "H1", "body"));
        assert_eq!(a.verdict, Verdict::Inconclusive);
    }

    #[test]
    fn test_degraded_baseline_still_sees_status_flip() {
        let mut b = baseline(403, 280, "H0");
        b.degraded = true;
        let a = assess(&b, response(200, 900, "H1", "welcome"));
        assert_eq!(a.verdict, Verdict::Bypassed);
        assert_eq!(a.confidence, Confidence::High);
    }

    #[test]
    fn test_marker_upgrades_inconclusive() {
        let b = baseline(200, 1000, "H0");
        let body = format!("<p>you searched for {}</p>", TOKEN);
        // Small size drift keeps the status rules inconclusive.
        let a = evaluator().evaluate(
            &b,
            &result(Outcome::Response(response(200, 1010, "H1", &body))),
            &technique(Signal::ReflectedToken),
            TOKEN,
        );
        assert_eq!(a.verdict, Verdict::Bypassed);
        assert_eq!(a.confidence, Confidence::High);
        assert!(a.evidence.marker.is_some());
    }

    #[test]
    fn test_marker_does_not_upgrade_blocked() {
        let b = baseline(200, 1000, "H0");
        let a = evaluator().evaluate(
            &b,
            &result(Outcome::Response(response(
                403,
                500,
                "H1",
                "fatal error: denied",
            ))),
            &technique(Signal::None),
            TOKEN,
        );
        assert_eq!(a.verdict, Verdict::Blocked);
    }

    #[test]
    fn test_marker_policy_status_wins() {
        let b = baseline(403, 280, "H0");
        let a = evaluator().evaluate(
            &b,
            &result(Outcome::Response(response(200, 1450, "H1", "no token here"))),
            &technique(Signal::ReflectedToken),
            TOKEN,
        );
        assert_eq!(a.verdict, Verdict::Bypassed);
        assert_eq!(a.confidence, Confidence::High);
    }

    #[test]
    fn test_marker_policy_require_marker_downgrades() {
        let config = EvaluatorConfig {
            marker_policy: MarkerPolicy::RequireMarker,
            ..EvaluatorConfig::default()
        };
        let b = baseline(403, 280, "H0");
        let a = Evaluator::new(config).evaluate(
            &b,
            &result(Outcome::Response(response(200, 1450, "H1", "no token here"))),
            &technique(Signal::ReflectedToken),
            TOKEN,
        );
        assert_eq!(a.verdict, Verdict::Bypassed);
        assert_eq!(a.confidence, Confidence::Medium);
        assert!(a.evidence.summary.contains("expected marker absent"));
    }

    #[test]
    fn test_require_marker_leaves_plain_techniques_alone() {
        let config = EvaluatorConfig {
            marker_policy: MarkerPolicy::RequireMarker,
            ..EvaluatorConfig::default()
        };
        let b = baseline(403, 280, "H0");
        let a = Evaluator::new(config).evaluate(
            &b,
            &result(Outcome::Response(response(200, 1450, "H1", "page"))),
            &technique(Signal::None),
            TOKEN,
        );
        assert_eq!(a.confidence, Confidence::High);
    }

    #[test]
    fn test_throttled_result_downgrades_bypass_confidence() {
        let b = baseline(403, 280, "H0");
        let mut r = result(Outcome::Response(response(200, 1450, "H1", "page")));
        r.throttled = true;

        let a = evaluator().evaluate(&b, &r, &technique(Signal::None), TOKEN);
        assert_eq!(a.verdict, Verdict::Bypassed);
        assert_eq!(a.confidence, Confidence::Medium);
    }

    #[test]
    fn test_throttled_does_not_touch_blocked() {
        let b = baseline(404, 150, "H0");
        let mut r = result(Outcome::Response(response(404, 150, "H0", "nope")));
        r.throttled = true;

        let a = evaluator().evaluate(&b, &r, &technique(Signal::None), TOKEN);
        assert_eq!(a.verdict, Verdict::Blocked);
        assert_eq!(a.confidence, Confidence::High);
    }
}
