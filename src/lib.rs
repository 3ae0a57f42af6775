pub mod analyzer;
pub mod cli;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod models;
pub mod reporter;
pub mod scanner;
pub mod techniques;

pub use analyzer::{Evaluator, EvaluatorConfig, MarkerPolicy};
pub use error::PierceError;
pub use models::{
    BaselineProfile, Confidence, Finding, ScanSession, ScanStatus, Severity, Target, Verdict,
};
pub use reporter::{ConsoleReporter, JsonExporter, ResultSink};
pub use scanner::{EngineConfig, ScanEngine};
pub use techniques::{Category, Technique, TechniqueCatalog};
