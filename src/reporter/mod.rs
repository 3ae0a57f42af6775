mod console;
mod export;

pub use console::ConsoleReporter;
pub use export::JsonExporter;

use anyhow::Result;

use crate::models::ScanSession;

/// Boundary between the assessment engine and its consumers. The engine
/// hands a finished session to any number of sinks; reporting and viewer
/// collaborators live behind this trait.
pub trait ResultSink {
    fn accept(&mut self, session: &ScanSession) -> Result<()>;
}
