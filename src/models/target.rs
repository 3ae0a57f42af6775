use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::PierceError;
use crate::models::Confidence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WafVendor {
    Cloudflare,
    CloudFront,
    AwsWaf,
    Akamai,
    Imperva,
    Sucuri,
    F5BigIp,
    ModSecurity,
    Fastly,
    /// Default-deny behavior observed, vendor not identifiable.
    Generic,
}

impl fmt::Display for WafVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WafVendor::Cloudflare => "Cloudflare",
            WafVendor::CloudFront => "Amazon CloudFront",
            WafVendor::AwsWaf => "AWS WAF",
            WafVendor::Akamai => "Akamai",
            WafVendor::Imperva => "Imperva Incapsula",
            WafVendor::Sucuri => "Sucuri CloudProxy",
            WafVendor::F5BigIp => "F5 BIG-IP ASM",
            WafVendor::ModSecurity => "ModSecurity",
            WafVendor::Fastly => "Fastly",
            WafVendor::Generic => "Unidentified WAF",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CdnVendor {
    CloudFront,
    Cloudflare,
    Akamai,
    Fastly,
}

impl fmt::Display for CdnVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CdnVendor::CloudFront => "CloudFront",
            CdnVendor::Cloudflare => "Cloudflare",
            CdnVendor::Akamai => "Akamai",
            CdnVendor::Fastly => "Fastly",
        };
        write!(f, "{}", s)
    }
}

/// Fingerprinting outcome with the evidence that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorMatch {
    pub vendor: WafVendor,
    pub confidence: Confidence,
    pub evidence: Vec<String>,
}

/// A scan target. Vendor fields are set at most once, by the profile
/// builder, before the session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    pub host: String,
    pub scheme: String,
    pub waf: Option<VendorMatch>,
    pub cdn: Option<CdnVendor>,
}

impl Target {
    /// Validates and normalizes the target URL. The only fatal error path
    /// in the engine starts here.
    pub fn parse(raw: &str) -> Result<Self, PierceError> {
        let trimmed = raw.trim_end_matches('/');
        let parsed = url::Url::parse(trimmed).map_err(|e| PierceError::InvalidTarget {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(PierceError::InvalidScheme(other.to_string())),
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| PierceError::InvalidTarget {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();

        Ok(Self {
            url: trimmed.to_string(),
            host,
            scheme: parsed.scheme().to_string(),
            waf: None,
            cdn: None,
        })
    }
}

/// The unmodified reference response, captured exactly once per target
/// before any technique runs. Never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineProfile {
    pub status: u16,
    pub size: usize,
    pub content_hash: String,
    pub header_fingerprint: String,
    /// Lowercased response headers retained for divergence markers.
    pub headers: BTreeMap<String, String>,
    /// Status observed on the synthetic known-missing path.
    pub missing_status: Option<u16>,
    pub captured_at: DateTime<Utc>,
    /// Capture was throttled or failed past its retry budget; hash/size
    /// comparison downstream is unreliable and gets suppressed.
    pub degraded: bool,
}

impl BaselineProfile {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Sorted `name:value` lines over a stable header subset; volatile
    /// headers (dates, request ids) would churn the fingerprint.
    pub fn fingerprint_headers(headers: &BTreeMap<String, String>) -> String {
        const STABLE: &[&str] = &[
            "server",
            "content-type",
            "via",
            "x-cache",
            "x-powered-by",
            "location",
            "www-authenticate",
        ];
        let mut lines: Vec<String> = headers
            .iter()
            .filter(|(k, _)| STABLE.contains(&k.as_str()))
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect();
        lines.sort_unstable();
        lines.join("\n")
    }
}
