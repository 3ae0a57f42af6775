use chrono::Utc;
use rand::Rng;
use tracing::{debug, warn};

use super::ratelimit::{RateLimiter, parse_retry_after};
use crate::http::HttpClient;
use crate::models::{BaselineProfile, Outcome};
use crate::techniques::RequestSpec;

/// Captures the unmodified reference response before any technique runs.
/// Uses the same pooled client and backoff policy as the execution engine
/// so the baseline is not skewed against later measurements.
pub struct BaselineCapturer<'a> {
    client: &'a HttpClient,
    limiter: &'a RateLimiter,
}

impl<'a> BaselineCapturer<'a> {
    pub fn new(client: &'a HttpClient, limiter: &'a RateLimiter) -> Self {
        Self { client, limiter }
    }

    /// Always returns a profile: when the target is rate-limiting past the
    /// retry budget, or the transport keeps failing, the profile comes
    /// back `degraded` and the evaluator drops to status-only comparison.
    pub async fn capture(&self) -> BaselineProfile {
        let home = RequestSpec::base();

        loop {
            self.limiter.admit().await;
            match self.client.execute(&home).await {
                Outcome::Response(response) => {
                    let retry_after = response
                        .header("retry-after")
                        .and_then(parse_retry_after);
                    self.limiter.observe(response.status, retry_after);

                    if matches!(response.status, 429 | 503) {
                        if self.limiter.try_consume_retry() {
                            debug!(status = response.status, "baseline throttled, retrying");
                            continue;
                        }
                        warn!("baseline retry budget exhausted, marking degraded");
                        return self.finish(Some(response), true).await;
                    }

                    return self.finish(Some(response), false).await;
                }
                Outcome::Failed(failure) => {
                    if self.limiter.try_consume_retry() {
                        debug!(kind = %failure.kind, "baseline probe failed, retrying");
                        continue;
                    }
                    warn!(kind = %failure.kind, "baseline capture failed, marking degraded");
                    return self.finish(None, true).await;
                }
            }
        }
    }

    async fn finish(
        &self,
        response: Option<crate::models::ResponseProfile>,
        degraded: bool,
    ) -> BaselineProfile {
        // Reference probe of a path that cannot exist: tells us what the
        // filter does with a miss (some rewrite 404 into 403).
        let missing_path = format!("/wp-{:08x}-baseline", rand::thread_rng().r#gen::<u32>());
        let missing_status = match self.client.execute(&RequestSpec::get(missing_path)).await {
            Outcome::Response(r) => {
                self.limiter.observe(r.status, None);
                Some(r.status)
            }
            Outcome::Failed(_) => None,
        };

        match response {
            Some(r) => BaselineProfile {
                status: r.status,
                size: r.size,
                content_hash: r.content_hash,
                header_fingerprint: BaselineProfile::fingerprint_headers(&r.headers),
                headers: r.headers,
                missing_status,
                captured_at: Utc::now(),
                degraded,
            },
            None => BaselineProfile {
                status: 0,
                size: 0,
                content_hash: String::new(),
                header_fingerprint: String::new(),
                headers: Default::default(),
                missing_status,
                captured_at: Utc::now(),
                degraded: true,
            },
        }
    }
}
