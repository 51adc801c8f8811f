//! Capture Anomaly Analysis
//!
//! Heuristic passes over parsed ELM327 capture logs: prompt framing,
//! response fragmentation, PCI length validation, command-format
//! transitions, and request/response round-trip timing. Each capture is
//! analyzed independently into a [`CaptureReport`] that renders the
//! human-readable per-capture block.

mod analyzer;
mod config;
mod report;

pub use analyzer::CaptureAnalyzer;
pub use config::{AnalyzerConfig, DEFAULT_RESPONSE_LOOKAHEAD};
pub use report::{
    CaptureReport, CommandFormat, FormatSplit, FormatTransition, MultiPidCombined,
    NegotiationMarkers, PciCheck, PciMismatch, PromptDelivery, ResetResponse, RoundTripStats,
};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize tracing for the analyzer binary.
///
/// Diagnostics go to stderr so the report stream on stdout stays clean.
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
