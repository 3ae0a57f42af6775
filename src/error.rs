use thiserror::Error;

/// Errors surfaced by the assessment engine.
///
/// Only `Config` is fatal; everything network-shaped is caught at the
/// execution boundary and converted into an error-marked result instead.
#[derive(Debug, Error)]
pub enum PierceError {
    #[error("invalid target '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("unsupported scheme '{0}': only http and https are scanned")]
    InvalidScheme(String),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("request timeout must be at least 1 second")]
    ZeroTimeout,

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("export failed: {0}")]
    Export(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PierceError {
    /// True for configuration errors that must abort before any network
    /// activity.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PierceError::InvalidTarget { .. }
                | PierceError::InvalidScheme(_)
                | PierceError::ZeroConcurrency
                | PierceError::ZeroTimeout
                | PierceError::ClientBuild(_)
        )
    }
}

/// Transport failure classification recorded on error-marked results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Timeout,
    Connect,
    Dns,
    Tls,
    Other,
}

impl NetworkKind {
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return NetworkKind::Timeout;
        }
        if err.is_connect() {
            let detail = format!("{err:?}").to_lowercase();
            if detail.contains("dns") || detail.contains("resolve") {
                return NetworkKind::Dns;
            }
            if detail.contains("tls") || detail.contains("certificate") {
                return NetworkKind::Tls;
            }
            return NetworkKind::Connect;
        }
        NetworkKind::Other
    }
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NetworkKind::Timeout => "timeout",
            NetworkKind::Connect => "connect",
            NetworkKind::Dns => "dns",
            NetworkKind::Tls => "tls",
            NetworkKind::Other => "network",
        };
        write!(f, "{}", s)
    }
}
