mod execution;
mod finding;
mod session;
mod target;

pub use execution::{ExecutionResult, Outcome, ResponseProfile, TransportFailure};
pub use finding::{Confidence, Evidence, Finding, Severity, Verdict};
pub use session::{ScanSession, ScanStatus, ScanSummary};
pub use target::{BaselineProfile, CdnVendor, Target, VendorMatch, WafVendor};
