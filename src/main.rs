use anyhow::{Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wafpierce::analyzer::MarkerPolicy;
use wafpierce::cli::{Cli, Commands};
use wafpierce::reporter::{ConsoleReporter, JsonExporter, ResultSink};
use wafpierce::scanner::{EngineConfig, ScanEngine};
use wafpierce::techniques::Category;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wafpierce=info")),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Scan {
            url,
            concurrency,
            timeout,
            delay,
            categories,
            require_marker,
            output,
            verbose,
        } => {
            let categories = categories.map(parse_categories).transpose()?;

            let mut config = EngineConfig {
                concurrency,
                timeout_secs: timeout,
                delay_ms: delay,
                categories,
                ..EngineConfig::default()
            };
            if require_marker {
                config.evaluator.marker_policy = MarkerPolicy::RequireMarker;
            }

            let engine = ScanEngine::new(config)?;

            let cancel = engine.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\ninterrupted, letting in-flight requests drain...");
                    cancel.cancel();
                }
            });

            let session = engine.scan(&url).await?;

            ConsoleReporter::new(verbose).accept(&session)?;
            if let Some(path) = output {
                JsonExporter::new(&path).accept(&session)?;
                println!("Session written to {}", path);
            }
        }

        Commands::Report { input, verbose } => {
            let session = JsonExporter::load(&input)?;
            ConsoleReporter::new(verbose).accept(&session)?;
        }
    }

    Ok(())
}

fn parse_categories(raw: String) -> Result<Vec<Category>> {
    let mut categories = Vec::new();
    for part in raw.split(',') {
        match Category::parse(part) {
            Some(category) => categories.push(category),
            None => bail!(
                "unknown category '{}': expected header, encoding, protocol, injection, business-logic, or reconnaissance",
                part.trim()
            ),
        }
    }
    if categories.is_empty() {
        bail!("no categories given");
    }
    Ok(categories)
}
