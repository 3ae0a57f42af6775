use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::baseline::BaselineCapturer;
use super::cache::{RequestSignature, ResponseCache};
use super::ratelimit::{RateLimitConfig, RateLimiter, parse_retry_after};
use crate::analyzer::{Aggregator, Evaluator, EvaluatorConfig};
use crate::error::PierceError;
use crate::fingerprint::{ProfileBuilder, preferred_categories};
use crate::http::HttpClient;
use crate::models::{ExecutionResult, ScanSession, ScanStatus, Target};
use crate::techniques::{ApplyContext, Category, RequestSpec, Technique, TechniqueCatalog};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    /// Polite pause after each network dispatch.
    pub delay_ms: u64,
    /// Restrict the scan to these categories; `None` runs the full catalog.
    pub categories: Option<Vec<Category>>,
    pub evaluator: EvaluatorConfig,
    pub rate_limit: RateLimitConfig,
    /// Error fraction above which the session is marked PartiallyScanned.
    pub max_error_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            timeout_secs: 10,
            delay_ms: 200,
            categories: None,
            evaluator: EvaluatorConfig::default(),
            rate_limit: RateLimitConfig::default(),
            max_error_fraction: 0.5,
        }
    }
}

enum WorkerMessage {
    Result(&'static Technique, ExecutionResult),
    Skipped(&'static str),
}

/// Drives one target through fingerprint, baseline, and concurrent
/// technique execution. All per-target state (pool, cache, rate-limit)
/// lives inside one `scan` call; concurrent scans of different targets
/// cannot interfere.
#[derive(Debug)]
pub struct ScanEngine {
    catalog: TechniqueCatalog,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl ScanEngine {
    pub fn new(config: EngineConfig) -> Result<Self, PierceError> {
        if config.concurrency == 0 {
            return Err(PierceError::ZeroConcurrency);
        }
        if config.timeout_secs == 0 {
            return Err(PierceError::ZeroTimeout);
        }
        Ok(Self {
            catalog: TechniqueCatalog::load(),
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Token for cooperative cancellation: new dispatch halts promptly,
    /// in-flight requests finish within their timeout, collected findings
    /// stay intact.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn scan(&self, target_url: &str) -> Result<ScanSession, PierceError> {
        let started_at = Utc::now();
        let mut target = Target::parse(target_url)?;

        let client = Arc::new(HttpClient::new(&target.url, self.config.timeout_secs)?);
        let limiter = Arc::new(RateLimiter::new(self.config.rate_limit.clone()));
        let cache = Arc::new(ResponseCache::new());

        info!(target = %target.url, "starting scan");

        ProfileBuilder::new(&client).build(&mut target).await;
        match &target.waf {
            Some(m) => info!(vendor = %m.vendor, confidence = %m.confidence, "WAF identified"),
            None => info!("WAF vendor unknown, continuing"),
        }

        // Barrier: nothing dispatches until the baseline exists.
        let baseline = BaselineCapturer::new(&client, &limiter).capture().await;
        if baseline.degraded {
            warn!("baseline degraded, evaluation limited to status codes");
        } else {
            info!(
                status = baseline.status,
                size = baseline.size,
                "baseline captured"
            );
        }

        // Per-session reflection token, unique so cached or stale pages
        // can never fake a reflection.
        let token = format!("wp-{:016x}", rand::thread_rng().r#gen::<u64>());

        let preferred: &[Category] = target
            .waf
            .as_ref()
            .map(|m| preferred_categories(m.vendor))
            .unwrap_or(&[]);
        let techniques = self
            .catalog
            .prioritized(self.config.categories.as_deref(), preferred);
        let total = techniques.len();
        info!(techniques = total, "dispatching technique catalog");

        let pb = create_progress_bar(total);
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMessage>();
        let delay = Duration::from_millis(self.config.delay_ms);

        let mut handles = Vec::with_capacity(total);
        for &technique in &techniques {
            let spec = technique.apply(
                &RequestSpec::base(),
                &ApplyContext {
                    host: &target.host,
                    token: &token,
                },
            );

            let tx = tx.clone();
            let client = Arc::clone(&client);
            let limiter = Arc::clone(&limiter);
            let cache = Arc::clone(&cache);
            let cancel = self.cancel.clone();
            let semaphore = Arc::clone(&semaphore);
            let target_id = target.url.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore closed during scan");

                if cancel.is_cancelled() {
                    let _ = tx.send(WorkerMessage::Skipped(technique.id));
                    return;
                }

                let result =
                    execute_one(technique, spec, &target_id, &client, &limiter, &cache, delay)
                        .await;
                let _ = tx.send(WorkerMessage::Result(technique, result));
            }));
        }
        drop(tx);

        // Single consumer: evaluation, classification, and aggregation all
        // happen here, so the append path needs no locking at all.
        let evaluator = Evaluator::new(self.config.evaluator.clone());
        let mut aggregator = Aggregator::new(&target.url);
        let mut skipped = 0usize;
        let mut errored = 0usize;
        let mut throttled = 0usize;
        let mut cached = 0usize;

        while let Some(message) = rx.recv().await {
            match message {
                WorkerMessage::Skipped(id) => {
                    debug!(technique = id, "skipped by cancellation");
                    skipped += 1;
                }
                WorkerMessage::Result(technique, result) => {
                    if result.is_error() {
                        errored += 1;
                    }
                    if result.throttled {
                        throttled += 1;
                    }
                    if result.from_cache {
                        cached += 1;
                    }
                    let assessment = evaluator.evaluate(&baseline, &result, technique, &token);
                    aggregator.append(technique, assessment);
                }
            }
            pb.inc(1);
        }
        let _ = join_all(handles).await;
        pb.finish_and_clear();

        let status = resolve_status(
            total,
            skipped,
            errored,
            limiter.budget_exhausted(),
            self.config.max_error_fraction,
        );
        if status == ScanStatus::PartiallyScanned {
            warn!(skipped, errored, "scan finished partially");
        }

        Ok(ScanSession {
            target,
            baseline,
            concurrency: self.config.concurrency,
            findings: aggregator.into_findings(),
            status,
            skipped,
            errored,
            throttled,
            cached,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// One technique dispatch: cache lookup, rate-limit gate, network call,
/// observation. Transport failures surface as error-marked results.
async fn execute_one(
    technique: &'static Technique,
    spec: RequestSpec,
    target_id: &str,
    client: &HttpClient,
    limiter: &RateLimiter,
    cache: &ResponseCache,
    delay: Duration,
) -> ExecutionResult {
    let signature = RequestSignature::of(&spec);

    if let Some(hit) = cache.lookup(&signature) {
        debug!(technique = technique.id, "served from response cache");
        return ExecutionResult {
            technique_id: technique.id,
            target: target_id.to_string(),
            outcome: hit.outcome,
            throttled: hit.throttled,
            from_cache: true,
            completed_at: Utc::now(),
        };
    }

    let throttled = limiter.admit().await;
    let outcome = client.execute(&spec).await;
    if let Some(response) = outcome.response() {
        let hint = response.header("retry-after").and_then(parse_retry_after);
        limiter.observe(response.status, hint);
    }
    cache.store(signature, outcome.clone(), throttled);

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    ExecutionResult {
        technique_id: technique.id,
        target: target_id.to_string(),
        outcome,
        throttled,
        from_cache: false,
        completed_at: Utc::now(),
    }
}

fn resolve_status(
    total: usize,
    skipped: usize,
    errored: usize,
    budget_exhausted: bool,
    max_error_fraction: f64,
) -> ScanStatus {
    let executed = total.saturating_sub(skipped);
    let error_fraction = if executed > 0 {
        errored as f64 / executed as f64
    } else {
        0.0
    };

    if skipped > 0 || budget_exhausted || error_fraction > max_error_fraction {
        ScanStatus::PartiallyScanned
    } else {
        ScanStatus::Complete
    }
}

fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, ResponseProfile, Verdict};
    use crate::techniques::{ApplyContext, BUILTIN};
    use std::collections::BTreeMap;

    fn offline_config() -> EngineConfig {
        EngineConfig {
            concurrency: 8,
            timeout_secs: 2,
            delay_ms: 0,
            rate_limit: RateLimitConfig {
                retry_budget: 0,
                ..RateLimitConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_zero_concurrency_is_fatal() {
        let config = EngineConfig {
            concurrency: 0,
            ..EngineConfig::default()
        };
        let err = ScanEngine::new(config).unwrap_err();
        assert!(matches!(err, PierceError::ZeroConcurrency));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_zero_timeout_is_fatal() {
        let config = EngineConfig {
            timeout_secs: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            ScanEngine::new(config),
            Err(PierceError::ZeroTimeout)
        ));
    }

    #[tokio::test]
    async fn test_invalid_target_fails_before_network() {
        let engine = ScanEngine::new(offline_config()).unwrap();
        let err = engine.scan("not a url").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_resolve_status() {
        assert_eq!(resolve_status(40, 0, 0, false, 0.5), ScanStatus::Complete);
        assert_eq!(resolve_status(40, 0, 10, false, 0.5), ScanStatus::Complete);
        assert_eq!(
            resolve_status(40, 0, 30, false, 0.5),
            ScanStatus::PartiallyScanned
        );
        assert_eq!(
            resolve_status(40, 1, 0, false, 0.5),
            ScanStatus::PartiallyScanned
        );
        assert_eq!(
            resolve_status(40, 0, 0, true, 0.5),
            ScanStatus::PartiallyScanned
        );
        assert_eq!(resolve_status(0, 0, 0, false, 0.5), ScanStatus::Complete);
    }

    // Unreachable loopback port: every dispatch fails fast at the
    // transport layer. Exercises the full engine path without a network.
    #[tokio::test]
    async fn test_unreachable_target_yields_one_error_finding_per_technique() {
        let engine = ScanEngine::new(offline_config()).unwrap();
        let session = engine.scan("http://127.0.0.1:9").await.unwrap();

        let catalog = TechniqueCatalog::load();
        assert_eq!(session.findings.len(), catalog.len());

        let mut ids: Vec<_> = session.findings.iter().map(|f| f.technique.clone()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len(), "duplicate finding for a technique");

        assert!(session.findings.iter().all(|f| f.verdict == Verdict::Error));
        assert!(session.baseline.degraded);
        assert_eq!(session.status, ScanStatus::PartiallyScanned);

        for finding in &session.findings {
            assert!(finding.timestamp >= session.baseline.captured_at);
        }
    }

    // The client points at an unreachable port, so a real dispatch would
    // come back as a transport error; the cached 200 proves no network
    // call was made.
    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let client = HttpClient::new("http://127.0.0.1:9", 1).unwrap();
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let cache = ResponseCache::new();
        let technique = &BUILTIN[0];

        let spec = technique.apply(
            &RequestSpec::base(),
            &ApplyContext {
                host: "example.com",
                token: "wp-test",
            },
        );
        cache.store(
            RequestSignature::of(&spec),
            Outcome::Response(ResponseProfile {
                status: 200,
                size: 5,
                content_hash: "h".into(),
                headers: BTreeMap::new(),
                body: "hello".into(),
                latency_ms: 3,
            }),
            false,
        );

        let result = execute_one(
            technique,
            spec,
            "http://example.com",
            &client,
            &limiter,
            &cache,
            Duration::ZERO,
        )
        .await;

        assert!(result.from_cache);
        assert_eq!(result.outcome.response().unwrap().status, 200);
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_engine_skips_everything() {
        let engine = ScanEngine::new(offline_config()).unwrap();
        engine.cancellation_token().cancel();

        let session = engine.scan("http://127.0.0.1:9").await.unwrap();
        assert!(session.findings.is_empty());
        assert_eq!(session.skipped, TechniqueCatalog::load().len());
        assert_eq!(session.status, ScanStatus::PartiallyScanned);
    }

    #[tokio::test]
    async fn test_category_filter_limits_dispatch() {
        let config = EngineConfig {
            categories: Some(vec![Category::Encoding]),
            ..offline_config()
        };
        let engine = ScanEngine::new(config).unwrap();
        let session = engine.scan("http://127.0.0.1:9").await.unwrap();

        let encoding_total = TechniqueCatalog::load()
            .filtered(Some(&[Category::Encoding]))
            .len();
        assert_eq!(session.findings.len(), encoding_total);
        assert!(
            session
                .findings
                .iter()
                .all(|f| f.category == Category::Encoding)
        );
    }
}
