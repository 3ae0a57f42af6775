//! Target profile builder: best-effort WAF/CDN vendor identification from
//! a small number of low-risk probes. Inconclusive is a valid outcome and
//! only ever affects technique scheduling order.

mod signatures;

pub use signatures::{SIGNATURES, VendorSignature, detect_cdn};

use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

use crate::http::HttpClient;
use crate::models::{Confidence, Target, VendorMatch, WafVendor};
use crate::techniques::{Category, RequestSpec};

/// Evidence tiers, strongest first. When several signatures match, the
/// highest tier wins; ties go to the signature with more evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    DefaultDeny,
    BodyPattern,
    Cookie,
    Header,
}

impl Tier {
    fn confidence(self) -> Confidence {
        match self {
            Tier::Header => Confidence::High,
            Tier::Cookie => Confidence::Medium,
            Tier::BodyPattern | Tier::DefaultDeny => Confidence::Low,
        }
    }
}

pub struct ProfileBuilder<'a> {
    client: &'a HttpClient,
}

impl<'a> ProfileBuilder<'a> {
    pub fn new(client: &'a HttpClient) -> Self {
        Self { client }
    }

    /// Probes the default path and a synthetic missing path, then matches
    /// both responses against the signature table. Never fails: transport
    /// errors leave the vendor unknown.
    pub async fn build(&self, target: &mut Target) {
        let missing = format!("/wp-{:08x}-missing", rand::thread_rng().r#gen::<u32>());
        let probes = [RequestSpec::base(), RequestSpec::get(missing)];

        let mut best: Option<(WafVendor, Tier, Vec<String>)> = None;

        for spec in &probes {
            let outcome = self.client.execute(spec).await;
            let Some(response) = outcome.response() else {
                continue;
            };

            if target.cdn.is_none() {
                target.cdn = detect_cdn(&response.headers);
            }

            if let Some(candidate) =
                match_response(response.status, &response.headers, &response.body)
            {
                let better = match &best {
                    None => true,
                    Some((_, tier, evidence)) => {
                        candidate.1 > *tier
                            || (candidate.1 == *tier && candidate.2.len() > evidence.len())
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }

        if let Some((vendor, tier, evidence)) = best {
            debug!(%vendor, ?tier, "fingerprint matched");
            target.waf = Some(VendorMatch {
                vendor,
                confidence: tier.confidence(),
                evidence,
            });
        } else {
            debug!("fingerprint inconclusive, proceeding with unknown vendor");
        }
    }
}

/// Pure matching core, factored out of the probe loop so it can be tested
/// without a network.
fn match_response(
    status: u16,
    headers: &BTreeMap<String, String>,
    body: &str,
) -> Option<(WafVendor, Tier, Vec<String>)> {
    let body_lower = body.to_lowercase();
    let cookie_names = headers
        .get("set-cookie")
        .map(String::as_str)
        .unwrap_or_default()
        .to_lowercase();

    let mut best: Option<(WafVendor, Tier, Vec<String>)> = None;

    for sig in SIGNATURES {
        let mut tier = None;
        let mut evidence = Vec::new();

        for (name, pattern) in sig.headers {
            if let Some(value) = headers.get(*name) {
                if pattern.is_empty() || value.to_lowercase().contains(pattern) {
                    tier = Some(Tier::Header);
                    evidence.push(format!("header {}: {}", name, value));
                }
            }
        }

        for cookie in sig.cookies {
            if cookie_names.contains(cookie) {
                tier = tier.max(Some(Tier::Cookie));
                evidence.push(format!("cookie {}", cookie));
            }
        }

        for pattern in sig.body_patterns {
            if body_lower.contains(pattern) {
                tier = tier.max(Some(Tier::BodyPattern));
                evidence.push(format!("body pattern \"{}\"", pattern));
            }
        }

        if let Some(tier) = tier {
            let better = match &best {
                None => true,
                Some((_, best_tier, best_evidence)) => {
                    tier > *best_tier || (tier == *best_tier && evidence.len() > best_evidence.len())
                }
            };
            if better {
                best = Some((sig.vendor, tier, evidence));
            }
        }
    }

    // No named vendor matched; a generic deny page still tells us a filter
    // is in the path.
    if best.is_none() && matches!(status, 403 | 406) {
        let generic = ["access denied", "forbidden", "request rejected", "security policy"];
        if let Some(hit) = generic.iter().find(|p| body_lower.contains(**p)) {
            best = Some((
                WafVendor::Generic,
                Tier::DefaultDeny,
                vec![format!("default-deny page ({})", hit)],
            ));
        }
    }

    best
}

/// Scheduling preference per identified vendor: which technique families
/// historically pay off first. Order only; never excludes techniques.
pub fn preferred_categories(vendor: WafVendor) -> &'static [Category] {
    match vendor {
        WafVendor::Cloudflare => &[Category::Header, Category::Protocol, Category::Encoding],
        WafVendor::CloudFront | WafVendor::AwsWaf => &[
            Category::Header,
            Category::BusinessLogic,
            Category::Protocol,
        ],
        WafVendor::Akamai => &[Category::BusinessLogic, Category::Header, Category::Encoding],
        WafVendor::Imperva => &[Category::Protocol, Category::Encoding, Category::Header],
        WafVendor::ModSecurity => &[Category::Encoding, Category::Injection, Category::Protocol],
        WafVendor::Sucuri | WafVendor::F5BigIp | WafVendor::Fastly | WafVendor::Generic => {
            &[Category::Header, Category::Encoding, Category::Protocol]
        }
    }
}
