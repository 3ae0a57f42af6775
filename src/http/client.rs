use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::error::{NetworkKind, PierceError};
use crate::models::{Outcome, ResponseProfile, TransportFailure};
use crate::techniques::RequestSpec;

/// Body text kept for marker scanning; anything past this is hashed but
/// not retained.
const BODY_RETAIN_LIMIT: usize = 64 * 1024;

/// One pooled client per target. Redirects are never followed: a changed
/// `Location` is evidence, not something to chase.
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, PierceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(PierceError::ClientBuild)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Executes one request spec. Every transport failure becomes an
    /// `Outcome::Failed`; nothing here aborts a batch. Wall-clock latency
    /// is recorded on both paths.
    pub async fn execute(&self, spec: &RequestSpec) -> Outcome {
        let start = Instant::now();
        let url = format!("{}{}", self.base_url, spec.path);

        let mut request = self.client.request(spec.method.as_reqwest(), &url);
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &spec.body {
            request = request.body(body.clone());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let headers: BTreeMap<String, String> = response
                    .headers()
                    .iter()
                    .map(|(k, v)| {
                        (
                            k.as_str().to_lowercase(),
                            v.to_str().unwrap_or("").to_string(),
                        )
                    })
                    .collect();

                let bytes = response.bytes().await.unwrap_or_default();
                let latency_ms = start.elapsed().as_millis() as u64;

                let mut body = String::from_utf8_lossy(&bytes).into_owned();
                if body.len() > BODY_RETAIN_LIMIT {
                    let mut cut = BODY_RETAIN_LIMIT;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }

                Outcome::Response(ResponseProfile {
                    status,
                    size: bytes.len(),
                    content_hash: hash_bytes(&bytes),
                    headers,
                    body,
                    latency_ms,
                })
            }
            Err(e) => Outcome::Failed(TransportFailure {
                kind: NetworkKind::classify(&e),
                detail: e.to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_hex() {
        let a = hash_bytes(b"hello");
        let b = hash_bytes(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_bytes(b"hello!"));
    }

    #[test]
    fn test_client_builds_with_sane_config() {
        assert!(HttpClient::new("https://example.com/", 5).is_ok());
    }
}
