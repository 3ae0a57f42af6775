use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wafpierce")]
#[command(version, about = "WAF/CDN bypass assessment scanner")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assess a target's bypass surface
    Scan {
        /// Target URL (http or https)
        #[arg(short, long)]
        url: String,

        /// Concurrent in-flight requests
        #[arg(short, long, default_value = "10")]
        concurrency: usize,

        /// Per-request timeout in seconds
        #[arg(short, long, default_value = "10")]
        timeout: u64,

        /// Pause between dispatches, in milliseconds
        #[arg(short, long, default_value = "200")]
        delay: u64,

        /// Comma-separated technique categories
        /// (header,encoding,protocol,injection,business-logic,reconnaissance)
        #[arg(long)]
        categories: Option<String>,

        /// Require the technique's expected marker before trusting a
        /// status-code flip at full confidence
        #[arg(long)]
        require_marker: bool,

        /// Write the session as JSON to this path
        #[arg(short, long)]
        output: Option<String>,

        /// Include Info-level findings in console output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Re-render a previously exported session
    Report {
        /// Path to an exported session JSON file
        #[arg(short, long)]
        input: String,

        /// Include Info-level findings
        #[arg(short, long)]
        verbose: bool,
    },
}
