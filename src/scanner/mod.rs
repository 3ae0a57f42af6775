mod baseline;
mod cache;
mod engine;
mod ratelimit;

pub use baseline::BaselineCapturer;
pub use cache::{CachedOutcome, RequestSignature, ResponseCache};
pub use engine::{EngineConfig, ScanEngine};
pub use ratelimit::{RateLimitConfig, RateLimiter, parse_retry_after};
