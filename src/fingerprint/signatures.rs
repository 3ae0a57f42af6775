//! Static vendor signature table. Adding a vendor means adding a row, not
//! a subtype.

use crate::models::{CdnVendor, WafVendor};
use std::collections::BTreeMap;

/// Patterns identifying one vendor. Header values and body patterns match
/// case-insensitively as substrings; an empty header pattern matches on
/// presence alone.
pub struct VendorSignature {
    pub vendor: WafVendor,
    pub headers: &'static [(&'static str, &'static str)],
    pub cookies: &'static [&'static str],
    pub body_patterns: &'static [&'static str],
}

pub static SIGNATURES: &[VendorSignature] = &[
    VendorSignature {
        vendor: WafVendor::Cloudflare,
        headers: &[("cf-ray", ""), ("server", "cloudflare"), ("cf-cache-status", "")],
        cookies: &["__cfduid", "cf_clearance", "__cf_bm"],
        body_patterns: &["attention required! | cloudflare", "cloudflare ray id"],
    },
    VendorSignature {
        vendor: WafVendor::CloudFront,
        headers: &[("via", "cloudfront"), ("x-amz-cf-id", ""), ("x-amz-cf-pop", "")],
        cookies: &[],
        body_patterns: &["generated by cloudfront", "request could not be satisfied"],
    },
    VendorSignature {
        vendor: WafVendor::AwsWaf,
        headers: &[("x-amzn-requestid", ""), ("x-amzn-waf-action", "")],
        cookies: &["aws-waf-token"],
        body_patterns: &["aws waf"],
    },
    VendorSignature {
        vendor: WafVendor::Akamai,
        headers: &[("server", "akamaighost"), ("x-akamai-transformed", "")],
        cookies: &["ak_bmsc", "bm_sz", "abck"],
        body_patterns: &["reference&#32;#", "reference #"],
    },
    VendorSignature {
        vendor: WafVendor::Imperva,
        headers: &[("x-iinfo", ""), ("x-cdn", "incapsula")],
        cookies: &["incap_ses", "visid_incap"],
        body_patterns: &["incident id", "incapsula"],
    },
    VendorSignature {
        vendor: WafVendor::Sucuri,
        headers: &[("server", "sucuri"), ("x-sucuri-id", ""), ("x-sucuri-cache", "")],
        cookies: &["sucuri_cloudproxy"],
        body_patterns: &["sucuri website firewall"],
    },
    VendorSignature {
        vendor: WafVendor::F5BigIp,
        headers: &[("server", "bigip"), ("server", "big-ip")],
        cookies: &["bigipserver", "ts0"],
        body_patterns: &["the requested url was rejected"],
    },
    VendorSignature {
        vendor: WafVendor::ModSecurity,
        headers: &[("server", "mod_security")],
        cookies: &[],
        body_patterns: &["mod_security", "this error was generated by mod_security"],
    },
    VendorSignature {
        vendor: WafVendor::Fastly,
        headers: &[("x-served-by", "cache-"), ("via", "fastly")],
        cookies: &[],
        body_patterns: &["fastly error"],
    },
];

/// Edge-layer detection from response headers alone. Orthogonal to WAF
/// identification: a CDN may front an origin with no filtering at all.
pub fn detect_cdn(headers: &BTreeMap<String, String>) -> Option<CdnVendor> {
    let has = |name: &str| headers.contains_key(name);
    let contains = |name: &str, needle: &str| {
        headers
            .get(name)
            .is_some_and(|v| v.to_lowercase().contains(needle))
    };

    if has("x-amz-cf-id") || has("x-amz-cf-pop") || contains("via", "cloudfront") {
        return Some(CdnVendor::CloudFront);
    }
    if has("cf-ray") || contains("server", "cloudflare") {
        return Some(CdnVendor::Cloudflare);
    }
    if has("x-akamai-transformed") || contains("server", "akamaighost") {
        return Some(CdnVendor::Akamai);
    }
    if contains("via", "fastly") || contains("x-served-by", "cache-") {
        return Some(CdnVendor::Fastly);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_signature_has_some_pattern() {
        for sig in SIGNATURES {
            assert!(
                !sig.headers.is_empty() || !sig.cookies.is_empty() || !sig.body_patterns.is_empty(),
                "{:?} has no patterns",
                sig.vendor
            );
        }
    }

    #[test]
    fn test_cdn_detection_cloudfront() {
        let mut headers = BTreeMap::new();
        headers.insert("via".to_string(), "1.1 abc.cloudfront.net (CloudFront)".to_string());
        assert_eq!(detect_cdn(&headers), Some(CdnVendor::CloudFront));
    }

    #[test]
    fn test_cdn_detection_none_for_plain_origin() {
        let mut headers = BTreeMap::new();
        headers.insert("server".to_string(), "nginx/1.25".to_string());
        assert_eq!(detect_cdn(&headers), None);
    }
}
