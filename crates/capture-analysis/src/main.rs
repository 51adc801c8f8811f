//! Capture Anomaly Analyzer - Main Entry Point

use anyhow::Context;
use capture_analysis::{init_logging, CaptureAnalyzer};
use capture_log::CaptureParser;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Scan decoded ELM327 capture dumps for protocol anomalies.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the decoded capture dump.
    #[arg(default_value = "decoded.txt")]
    input: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    info!("=== Capture Anomaly Analyzer v{} ===", env!("CARGO_PKG_VERSION"));

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("cannot read capture dump {}", args.input.display()))?;

    let parser = CaptureParser::new();
    let captures = parser.parse(&text);
    println!("Parsed {} captures\n", captures.len());

    let analyzer = CaptureAnalyzer::default();
    for capture in &captures {
        println!("{}", analyzer.analyze(capture));
    }

    Ok(())
}
