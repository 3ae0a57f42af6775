use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::NetworkKind;

/// Response descriptor for one dispatched request.
#[derive(Debug, Clone)]
pub struct ResponseProfile {
    pub status: u16,
    pub size: usize,
    pub content_hash: String,
    /// Lowercased header names.
    pub headers: BTreeMap<String, String>,
    /// Body text retained for marker scanning, truncated at capture.
    pub body: String,
    pub latency_ms: u64,
}

impl ResponseProfile {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn is_success_or_redirect(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Transport failure recorded in place of a response.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub kind: NetworkKind,
    pub detail: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Response(ResponseProfile),
    Failed(TransportFailure),
}

impl Outcome {
    pub fn response(&self) -> Option<&ResponseProfile> {
        match self {
            Outcome::Response(r) => Some(r),
            Outcome::Failed(_) => None,
        }
    }

    pub fn latency_ms(&self) -> u64 {
        match self {
            Outcome::Response(r) => r.latency_ms,
            Outcome::Failed(f) => f.latency_ms,
        }
    }
}

/// Produced exactly once per (target, technique) per session.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub technique_id: &'static str,
    pub target: String,
    pub outcome: Outcome,
    /// Dispatched while the target had us in backoff; the evaluator
    /// downgrades confidence on these.
    pub throttled: bool,
    /// Served from the per-session response cache, no network I/O.
    pub from_cache: bool,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}
