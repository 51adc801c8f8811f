//! Per-Capture Anomaly Report
//!
//! The report is a plain value: the analyzer fills it once and `Display`
//! renders the human-readable block. Sections with no applicable data are
//! `None` and simply do not render; a missing section is a finding in
//! itself, not an error.

use serde::Serialize;
use std::fmt;

/// First response observed after the adapter reset command
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    /// Response payload in decoded escape-literal form
    pub payload: String,
    /// Byte count declared by the capture record
    pub byte_count: u32,
}

/// How the command prompt reached the client
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptDelivery {
    /// Responses that were nothing but a bare prompt read
    pub split_reads: usize,
    /// Responses carrying the prompt together with data
    pub combined_reads: usize,
}

/// Protocol negotiation chatter seen on the receive side
#[derive(Debug, Clone, Default, Serialize)]
pub struct NegotiationMarkers {
    pub searching: usize,
    pub no_data: usize,
}

/// One declared-vs-actual PCI disagreement
#[derive(Debug, Clone, Serialize)]
pub struct PciMismatch {
    /// Byte count declared by the PCI field
    pub declared: u8,
    /// Byte count implied by the hex characters that follow it
    pub actual: usize,
    /// Payload with prompt literals stripped
    pub payload: String,
}

/// PCI field check over headers-on ECU responses
#[derive(Debug, Clone, Serialize)]
pub struct PciCheck {
    /// RX records carrying the ECU response header
    pub responses: usize,
    /// Total disagreements found
    pub mismatches: usize,
    /// Leading mismatch samples, capped by config
    pub samples: Vec<PciMismatch>,
}

/// Responses that pack two PID answers into a single read
#[derive(Debug, Clone, Serialize)]
pub struct MultiPidCombined {
    pub count: usize,
    pub examples: Vec<String>,
}

/// Which formatting an OBD request used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandFormat {
    /// Plain request, no response-count suffix
    Plain,
    /// Request carrying the " 1" response-count suffix
    CountSuffixed,
}

impl CommandFormat {
    /// Label used in report lines
    pub fn label(&self) -> &'static str {
        match self {
            CommandFormat::Plain => "without count",
            CommandFormat::CountSuffixed => "with count",
        }
    }
}

/// Split of OBD requests by command format, with the switch point if one
/// exists
#[derive(Debug, Clone, Serialize)]
pub struct FormatSplit {
    pub without_suffix: usize,
    pub with_suffix: usize,
    /// First suffixed request whose predecessor was unsuffixed
    pub transition: Option<FormatTransition>,
}

/// Where the command format switched mid-session
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FormatTransition {
    pub sequence: u32,
    pub timestamp_ms: u64,
}

/// Round-trip aggregate for one command format group
#[derive(Debug, Clone, Serialize)]
pub struct RoundTripStats {
    pub format: CommandFormat,
    pub mean_ms: f64,
    pub min_ms: i64,
    pub max_ms: i64,
    pub samples: usize,
}

/// Full anomaly report for one capture
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    /// Capture name from the segment header
    pub name: String,
    pub reset_response: Option<ResetResponse>,
    pub prompt_delivery: PromptDelivery,
    pub negotiation: NegotiationMarkers,
    /// Requests whose response arrived split over more than one read
    pub fragmented_requests: usize,
    pub pci_check: Option<PciCheck>,
    pub multi_pid: Option<MultiPidCombined>,
    pub format_split: Option<FormatSplit>,
    pub round_trips: Vec<RoundTripStats>,
}

impl fmt::Display for CaptureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.name)?;

        if let Some(reset) = &self.reset_response {
            writeln!(
                f,
                "  ATZ response: {:?} ({} bytes)",
                reset.payload, reset.byte_count
            )?;
        }

        writeln!(
            f,
            r"  Split prompt (separate '\r>' read): {}",
            self.prompt_delivery.split_reads
        )?;
        writeln!(
            f,
            "  Prompt combined with data: {}",
            self.prompt_delivery.combined_reads
        )?;

        writeln!(f, "  SEARCHING... responses: {}", self.negotiation.searching)?;
        writeln!(f, "  NO DATA responses: {}", self.negotiation.no_data)?;

        writeln!(
            f,
            "  Commands with split RX (>1 read per response): {}",
            self.fragmented_requests
        )?;

        if let Some(pci) = &self.pci_check {
            writeln!(
                f,
                "  ATH1 responses: {}, PCI mismatches: {}",
                pci.responses, pci.mismatches
            )?;
            for m in &pci.samples {
                writeln!(
                    f,
                    "    PCI={}, actual={}, line={:?}",
                    m.declared, m.actual, m.payload
                )?;
            }
        }

        if let Some(multi) = &self.multi_pid {
            writeln!(
                f,
                "  Multi-PID combined responses (010C+05): {}",
                multi.count
            )?;
            for example in &multi.examples {
                writeln!(f, "    Example: {:?}", example)?;
            }
        }

        if let Some(split) = &self.format_split {
            writeln!(
                f,
                "  Commands without count suffix: {}",
                split.without_suffix
            )?;
            writeln!(f, "  Commands with ' 1' suffix: {}", split.with_suffix)?;
            if let Some(transition) = &split.transition {
                writeln!(
                    f,
                    "  Mode transition at record #{} (t={}ms)",
                    transition.sequence, transition.timestamp_ms
                )?;
            }
        }

        for rt in &self.round_trips {
            writeln!(
                f,
                "  RT ({}): avg={:.1}ms, min={}ms, max={}ms, n={}",
                rt.format.label(),
                rt.mean_ms,
                rt.min_ms,
                rt.max_ms,
                rt.samples
            )?;
        }

        Ok(())
    }
}
