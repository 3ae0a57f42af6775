use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::http::hash_bytes;
use crate::models::Outcome;
use crate::techniques::RequestSpec;

/// Normalized request identity: method, path, sorted header set, body
/// hash. Two specs with the same signature are the same request on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSignature(String);

impl RequestSignature {
    pub fn of(spec: &RequestSpec) -> Self {
        let mut headers: Vec<String> = spec
            .headers
            .iter()
            .map(|(k, v)| format!("{}:{}", k.to_lowercase(), v))
            .collect();
        headers.sort_unstable();

        let body_hash = match &spec.body {
            Some(body) => hash_bytes(body.as_bytes()),
            None => String::new(),
        };

        Self(format!(
            "{} {}\n{}\n{}",
            spec.method,
            spec.path,
            headers.join("\n"),
            body_hash
        ))
    }
}

/// Per-target, per-session response dedup. An explicit context object
/// handed to workers; never shared across targets.
#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<RequestSignature, CachedOutcome>>,
    hits: AtomicUsize,
}

#[derive(Clone)]
pub struct CachedOutcome {
    pub outcome: Outcome,
    pub throttled: bool,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, signature: &RequestSignature) -> Option<CachedOutcome> {
        let entries = self.entries.lock().expect("cache mutex poisoned");
        let hit = entries.get(signature).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    pub fn store(&self, signature: RequestSignature, outcome: Outcome, throttled: bool) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries
            .entry(signature)
            .or_insert(CachedOutcome { outcome, throttled });
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponseProfile;
    use crate::techniques::HttpMethod;
    use std::collections::BTreeMap;

    fn response_outcome(status: u16) -> Outcome {
        Outcome::Response(ResponseProfile {
            status,
            size: 10,
            content_hash: "h".into(),
            headers: BTreeMap::new(),
            body: String::new(),
            latency_ms: 5,
        })
    }

    fn spec(headers: &[(&str, &str)]) -> RequestSpec {
        RequestSpec {
            method: HttpMethod::Get,
            path: "/".into(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: None,
        }
    }

    #[test]
    fn test_signature_ignores_header_order_and_name_case() {
        let a = spec(&[("X-One", "1"), ("X-Two", "2")]);
        let b = spec(&[("x-two", "2"), ("X-One", "1")]);
        assert_eq!(RequestSignature::of(&a), RequestSignature::of(&b));
    }

    #[test]
    fn test_signature_differs_on_method_path_body() {
        let base = spec(&[]);

        let mut other_method = base.clone();
        other_method.method = HttpMethod::Post;
        assert_ne!(RequestSignature::of(&base), RequestSignature::of(&other_method));

        let mut other_path = base.clone();
        other_path.path = "/admin".into();
        assert_ne!(RequestSignature::of(&base), RequestSignature::of(&other_path));

        let mut other_body = base.clone();
        other_body.body = Some("x".into());
        assert_ne!(RequestSignature::of(&base), RequestSignature::of(&other_body));
    }

    #[test]
    fn test_lookup_after_store_hits() {
        let cache = ResponseCache::new();
        let sig = RequestSignature::of(&spec(&[("Host", "localhost")]));

        assert!(cache.lookup(&sig).is_none());
        assert_eq!(cache.hits(), 0);

        cache.store(sig.clone(), response_outcome(200), false);
        let cached = cache.lookup(&sig).expect("cache hit");
        assert_eq!(cached.outcome.response().unwrap().status, 200);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_keeps_first_entry() {
        let cache = ResponseCache::new();
        let sig = RequestSignature::of(&spec(&[]));

        cache.store(sig.clone(), response_outcome(200), false);
        cache.store(sig.clone(), response_outcome(500), true);

        let cached = cache.lookup(&sig).unwrap();
        assert_eq!(cached.outcome.response().unwrap().status, 200);
        assert!(!cached.throttled);
    }
}
