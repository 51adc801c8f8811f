//! Analyzer Configuration

use serde::{Deserialize, Serialize};

/// How many records past a request to search for its first response.
///
/// Matches the worst adapter turnaround fragmentation seen in real
/// captures; widening the window changes which RX a TX gets paired with.
pub const DEFAULT_RESPONSE_LOOKAHEAD: usize = 4;

/// Analyzer tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Lookahead window (in records) for request/response pairing
    pub response_lookahead: usize,
    /// Maximum PCI mismatch samples kept in a report
    pub max_pci_mismatch_samples: usize,
    /// Maximum multi-PID example payloads kept in a report
    pub max_multi_pid_examples: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            response_lookahead: DEFAULT_RESPONSE_LOOKAHEAD,
            max_pci_mismatch_samples: 5,
            max_multi_pid_examples: 3,
        }
    }
}
