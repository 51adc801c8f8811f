//! Anomaly Heuristics over One Capture
//!
//! Eight read-only passes over a capture's ordered record sequence.
//! Request/response causality is inferred positionally: the first RX
//! within a bounded lookahead window after a TX counts as its response.
//! There is no explicit link field in the capture format, so the window
//! size is a config knob rather than a protocol guarantee.

use crate::config::AnalyzerConfig;
use crate::report::{
    CaptureReport, CommandFormat, FormatSplit, FormatTransition, MultiPidCombined,
    NegotiationMarkers, PciCheck, PciMismatch, PromptDelivery, ResetResponse, RoundTripStats,
};
use capture_log::{token, CaptureLog, CaptureRecord, Direction};
use tracing::debug;

/// Payloads longer than this carry data alongside the prompt; the longest
/// bare prompt literal is exactly this many characters.
const BARE_PROMPT_MAX_LEN: usize = 5;

/// Character offset of the PCI byte in a cleaned headers-on response:
/// the `7E8` header occupies offsets 0-2, the PCI hex pair follows.
const PCI_OFFSET: usize = 3;

/// Runs the anomaly passes over parsed captures
#[derive(Debug, Clone)]
pub struct CaptureAnalyzer {
    config: AnalyzerConfig,
}

impl CaptureAnalyzer {
    /// Create an analyzer with the given config
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Produce the anomaly report for one capture.
    ///
    /// A pure projection of the record sequence: no state is kept between
    /// calls and analyzing the same capture twice yields identical
    /// reports. Passes that find no applicable data leave their section
    /// empty instead of failing.
    pub fn analyze(&self, capture: &CaptureLog) -> CaptureReport {
        let records = &capture.records;
        let rx = capture.rx_records();

        // OBD data requests: every TX that is not an AT command
        let obd_tx: Vec<&CaptureRecord> = capture
            .tx_records()
            .into_iter()
            .filter(|r| !r.payload.starts_with(token::AT_PREFIX))
            .collect();

        debug!(
            "analyzing {}: {} records, {} RX, {} OBD requests",
            capture.name,
            records.len(),
            rx.len(),
            obd_tx.len()
        );

        CaptureReport {
            name: capture.name.clone(),
            reset_response: self.reset_response(records),
            prompt_delivery: Self::prompt_delivery(&rx),
            negotiation: Self::negotiation_markers(&rx),
            fragmented_requests: Self::fragmented_requests(records),
            pci_check: self.pci_check(&rx),
            multi_pid: self.multi_pid_combined(&rx),
            format_split: Self::format_split(&obd_tx),
            round_trips: self.round_trips(records, &obd_tx),
        }
    }

    /// First RX inside the lookahead window after `index`
    fn first_rx_within<'a>(
        &self,
        records: &'a [CaptureRecord],
        index: usize,
    ) -> Option<&'a CaptureRecord> {
        let window_end = (index + 1 + self.config.response_lookahead).min(records.len());
        records[index + 1..window_end]
            .iter()
            .find(|r| r.direction == Direction::Rx)
    }

    /// Response to the first reset command. The pass binds to the first
    /// ATZ even when its window holds no RX; later resets are not
    /// considered.
    fn reset_response(&self, records: &[CaptureRecord]) -> Option<ResetResponse> {
        let at = records.iter().position(|r| {
            r.direction == Direction::Tx && r.payload.contains(token::RESET_COMMAND)
        })?;
        self.first_rx_within(records, at).map(|rx| ResetResponse {
            payload: rx.payload.clone(),
            byte_count: rx.byte_count,
        })
    }

    /// Count prompts delivered as their own read versus combined with
    /// response data. The length threshold keeps bare prompt reads out of
    /// the combined count.
    fn prompt_delivery(rx: &[&CaptureRecord]) -> PromptDelivery {
        let split_reads = rx
            .iter()
            .filter(|r| r.payload == token::BARE_PROMPT || r.payload == token::BARE_PROMPT_DOUBLE)
            .count();
        let combined_reads = rx
            .iter()
            .filter(|r| {
                r.payload.contains(token::PROMPT) && r.payload.len() > BARE_PROMPT_MAX_LEN
            })
            .count();
        PromptDelivery {
            split_reads,
            combined_reads,
        }
    }

    /// Case-sensitive substring counts, no normalization
    fn negotiation_markers(rx: &[&CaptureRecord]) -> NegotiationMarkers {
        NegotiationMarkers {
            searching: rx
                .iter()
                .filter(|r| r.payload.contains(token::SEARCHING_MARKER))
                .count(),
            no_data: rx
                .iter()
                .filter(|r| r.payload.contains(token::NO_DATA_MARKER))
                .count(),
        }
    }

    /// Requests answered across more than one read. Only TX boundaries
    /// delimit a response run; lifecycle records inside the run neither
    /// end nor extend it.
    fn fragmented_requests(records: &[CaptureRecord]) -> usize {
        let mut fragmented = 0;
        for (i, record) in records.iter().enumerate() {
            if record.direction != Direction::Tx {
                continue;
            }
            let mut reads = 0;
            for follower in &records[i + 1..] {
                match follower.direction {
                    Direction::Tx => break,
                    Direction::Rx => reads += 1,
                    Direction::Connect | Direction::Disconnect => {}
                }
            }
            if reads > 1 {
                fragmented += 1;
            }
        }
        fragmented
    }

    /// Validate the PCI byte of every headers-on ECU response: the hex
    /// pair after the header must equal the byte count implied by the
    /// remaining hex characters (two per byte, no separators). Records
    /// too short or with unparsable PCI hex are skipped, not reported.
    fn pci_check(&self, rx: &[&CaptureRecord]) -> Option<PciCheck> {
        let headered: Vec<&&CaptureRecord> = rx
            .iter()
            .filter(|r| r.payload.contains(token::ECU_RESPONSE_HEADER))
            .collect();
        if headered.is_empty() {
            return None;
        }

        let mut samples = Vec::new();
        for record in &headered {
            // strip the longer prompt literal first so its prefix form
            // does not leave a stray "\r" behind
            let cleaned = record
                .payload
                .replace(token::BARE_PROMPT_DOUBLE, "")
                .replace(token::BARE_PROMPT, "");

            let Some(pci_hex) = cleaned.get(PCI_OFFSET..PCI_OFFSET + 2) else {
                continue;
            };
            let Some(data_hex) = cleaned.get(PCI_OFFSET + 2..) else {
                continue;
            };
            let Ok(declared) = u8::from_str_radix(pci_hex, 16) else {
                continue;
            };

            let actual = data_hex.len() / 2;
            if usize::from(declared) != actual {
                samples.push(PciMismatch {
                    declared,
                    actual,
                    payload: cleaned,
                });
            }
        }

        let mismatches = samples.len();
        samples.truncate(self.config.max_pci_mismatch_samples);
        Some(PciCheck {
            responses: headered.len(),
            mismatches,
            samples,
        })
    }

    /// Flag responses that merge an RPM answer and a coolant answer into
    /// one prompt-terminated read
    fn multi_pid_combined(&self, rx: &[&CaptureRecord]) -> Option<MultiPidCombined> {
        let combined: Vec<&&CaptureRecord> = rx
            .iter()
            .filter(|r| {
                r.payload.contains(token::RPM_RESPONSE_HEADER)
                    && r.payload.contains(token::COOLANT_PID)
                    && r.payload.contains(token::PROMPT)
            })
            .collect();
        if combined.is_empty() {
            return None;
        }

        let examples = combined
            .iter()
            .take(self.config.max_multi_pid_examples)
            .map(|r| r.payload.clone())
            .collect();
        Some(MultiPidCombined {
            count: combined.len(),
            examples,
        })
    }

    /// Partition OBD requests by count-suffix use and locate the switch
    /// point. Reported only when both formats occur; the transition line
    /// is absent when the suffix was there from the first request.
    fn format_split(obd_tx: &[&CaptureRecord]) -> Option<FormatSplit> {
        let with_suffix = obd_tx
            .iter()
            .filter(|r| r.payload.contains(token::COUNT_SUFFIX))
            .count();
        let without_suffix = obd_tx.len() - with_suffix;
        if with_suffix == 0 || without_suffix == 0 {
            return None;
        }

        let mut transition = None;
        for (i, record) in obd_tx.iter().enumerate() {
            if record.payload.contains(token::COUNT_SUFFIX) {
                if i > 0 && !obd_tx[i - 1].payload.contains(token::COUNT_SUFFIX) {
                    transition = Some(FormatTransition {
                        sequence: record.sequence,
                        timestamp_ms: record.timestamp_ms,
                    });
                }
                break;
            }
        }

        Some(FormatSplit {
            without_suffix,
            with_suffix,
            transition,
        })
    }

    /// Round-trip aggregates per command format, unsuffixed group first.
    /// Deltas are signed: the input clock is assumed monotonic but never
    /// verified, so a clock reset shows up as a negative sample rather
    /// than an error.
    fn round_trips(
        &self,
        records: &[CaptureRecord],
        obd_tx: &[&CaptureRecord],
    ) -> Vec<RoundTripStats> {
        [CommandFormat::Plain, CommandFormat::CountSuffixed]
            .into_iter()
            .filter_map(|format| {
                let wants_suffix = format == CommandFormat::CountSuffixed;
                let samples: Vec<i64> = obd_tx
                    .iter()
                    .filter(|r| r.payload.contains(token::COUNT_SUFFIX) == wants_suffix)
                    .filter_map(|request| {
                        let index = records
                            .iter()
                            .position(|r| r.sequence == request.sequence)?;
                        let response = self.first_rx_within(records, index)?;
                        Some(response.timestamp_ms as i64 - request.timestamp_ms as i64)
                    })
                    .collect();
                Self::aggregate(format, &samples)
            })
            .collect()
    }

    fn aggregate(format: CommandFormat, samples: &[i64]) -> Option<RoundTripStats> {
        if samples.is_empty() {
            return None;
        }
        Some(RoundTripStats {
            format,
            mean_ms: samples.iter().sum::<i64>() as f64 / samples.len() as f64,
            min_ms: samples.iter().copied().min()?,
            max_ms: samples.iter().copied().max()?,
            samples: samples.len(),
        })
    }
}

impl Default for CaptureAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(sequence: u32, timestamp_ms: u64, direction: Direction, payload: &str) -> CaptureRecord {
        CaptureRecord {
            sequence,
            timestamp_ms,
            direction,
            byte_count: payload.len() as u32,
            payload: payload.to_string(),
        }
    }

    fn capture(records: Vec<CaptureRecord>) -> CaptureLog {
        CaptureLog {
            name: "capture_test.ttcap".to_string(),
            records,
        }
    }

    fn analyze(records: Vec<CaptureRecord>) -> CaptureReport {
        CaptureAnalyzer::default().analyze(&capture(records))
    }

    #[test]
    fn test_reset_response_found_in_window() {
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"ATZ\r"),
            rec(2, 5, Direction::Connect, ""),
            rec(3, 61, Direction::Rx, r"\rELM327 v1.5\r\r>"),
        ]);
        let reset = report.reset_response.unwrap();
        assert_eq!(reset.payload, r"\rELM327 v1.5\r\r>");
        assert_eq!(reset.byte_count, 18);
    }

    #[test]
    fn test_reset_response_outside_window_omitted() {
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"ATZ\r"),
            rec(2, 1, Direction::Connect, ""),
            rec(3, 2, Direction::Connect, ""),
            rec(4, 3, Direction::Connect, ""),
            rec(5, 4, Direction::Connect, ""),
            rec(6, 70, Direction::Rx, r"\rELM327 v1.5\r\r>"),
        ]);
        assert!(report.reset_response.is_none());
    }

    #[test]
    fn test_reset_response_binds_to_first_atz() {
        // the first ATZ has no response; a later one does, but the pass
        // must not fall through to it
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"ATZ\r"),
            rec(2, 10, Direction::Tx, r"ATZ\r"),
        ]);
        assert!(report.reset_response.is_none());
    }

    #[test]
    fn test_prompt_delivery_classification() {
        let report = analyze(vec![
            rec(1, 0, Direction::Rx, r"\r>"),
            rec(2, 1, Direction::Rx, r"\r\r>"),
            rec(3, 2, Direction::Rx, r"41 0C 1A F8\r\r>"),
            rec(4, 3, Direction::Rx, r"OK\r"),
        ]);
        assert_eq!(report.prompt_delivery.split_reads, 2);
        assert_eq!(report.prompt_delivery.combined_reads, 1);
    }

    #[test]
    fn test_negotiation_marker_counts() {
        let report = analyze(vec![
            rec(1, 0, Direction::Rx, r"SEARCHING...\r"),
            rec(2, 1, Direction::Rx, r"SEARCHING...\rNO DATA\r\r>"),
            rec(3, 2, Direction::Rx, r"41 00 BE 3E\r\r>"),
        ]);
        assert_eq!(report.negotiation.searching, 2);
        assert_eq!(report.negotiation.no_data, 1);
    }

    #[test]
    fn test_fragmented_request_counting() {
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"010C\r"),
            rec(2, 10, Direction::Rx, r"41 0C 1A F8"),
            rec(3, 12, Direction::Rx, r"\r\r>"),
            rec(4, 20, Direction::Tx, r"010D\r"),
            rec(5, 30, Direction::Rx, r"41 0D 55\r\r>"),
        ]);
        assert_eq!(report.fragmented_requests, 1);
    }

    #[test]
    fn test_lifecycle_records_do_not_break_response_runs() {
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"010C\r"),
            rec(2, 10, Direction::Rx, r"41 0C 1A F8"),
            rec(3, 11, Direction::Disconnect, ""),
            rec(4, 12, Direction::Rx, r"\r\r>"),
        ]);
        assert_eq!(report.fragmented_requests, 1);
    }

    #[test]
    fn test_pci_mismatch_flagged() {
        let report = analyze(vec![rec(1, 0, Direction::Rx, "7E803410C")]);
        let pci = report.pci_check.unwrap();
        assert_eq!(pci.responses, 1);
        assert_eq!(pci.mismatches, 1);
        assert_eq!(pci.samples[0].declared, 3);
        assert_eq!(pci.samples[0].actual, 2);
        assert_eq!(pci.samples[0].payload, "7E803410C");
    }

    #[test]
    fn test_pci_match_not_flagged() {
        // declared 02 with exactly four data hex characters
        let report = analyze(vec![rec(1, 0, Direction::Rx, "7E802410C")]);
        let pci = report.pci_check.unwrap();
        assert_eq!(pci.responses, 1);
        assert_eq!(pci.mismatches, 0);
        assert!(pci.samples.is_empty());
    }

    #[test]
    fn test_pci_strips_prompt_literals_before_offsets() {
        let report = analyze(vec![rec(1, 0, Direction::Rx, r"7E803410C\r\r>")]);
        let pci = report.pci_check.unwrap();
        assert_eq!(pci.mismatches, 1);
        assert_eq!(pci.samples[0].payload, "7E803410C");
    }

    #[test]
    fn test_pci_malformed_hex_skipped_silently() {
        let report = analyze(vec![
            rec(1, 0, Direction::Rx, "7E8ZZ410C"),
            rec(2, 1, Direction::Rx, "7E8"),
        ]);
        let pci = report.pci_check.unwrap();
        // both count toward the headered total, neither toward mismatches
        assert_eq!(pci.responses, 2);
        assert_eq!(pci.mismatches, 0);
    }

    #[test]
    fn test_pci_section_omitted_without_headers() {
        let report = analyze(vec![rec(1, 0, Direction::Rx, r"41 0C 1A F8\r\r>")]);
        assert!(report.pci_check.is_none());
    }

    #[test]
    fn test_multi_pid_combined_detection() {
        let report = analyze(vec![
            rec(1, 0, Direction::Rx, r"410C1AF8\r4105 7B\r\r>"),
            rec(2, 1, Direction::Rx, r"410C1AF8\r\r>"),
        ]);
        let multi = report.multi_pid.unwrap();
        assert_eq!(multi.count, 1);
        assert_eq!(multi.examples, vec![r"410C1AF8\r4105 7B\r\r>".to_string()]);
    }

    #[test]
    fn test_format_transition_detection() {
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"010C\r"),
            rec(2, 10, Direction::Tx, r"010D\r"),
            rec(3, 20, Direction::Tx, r"010C 1\r"),
            rec(4, 30, Direction::Tx, r"010D 1\r"),
        ]);
        let split = report.format_split.unwrap();
        assert_eq!(split.without_suffix, 2);
        assert_eq!(split.with_suffix, 2);
        let transition = split.transition.unwrap();
        assert_eq!(transition.sequence, 3);
        assert_eq!(transition.timestamp_ms, 20);
    }

    #[test]
    fn test_format_split_requires_both_groups() {
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"010C 1\r"),
            rec(2, 10, Direction::Tx, r"010D 1\r"),
        ]);
        assert!(report.format_split.is_none());
    }

    #[test]
    fn test_transition_absent_when_suffix_present_from_start() {
        // both formats occur but the suffixed request comes first, so no
        // unsuffixed-to-suffixed adjacency exists at the first suffix
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"010C 1\r"),
            rec(2, 10, Direction::Tx, r"010D\r"),
        ]);
        let split = report.format_split.unwrap();
        assert_eq!(split.without_suffix, 1);
        assert_eq!(split.with_suffix, 1);
        assert!(split.transition.is_none());
    }

    #[test]
    fn test_at_commands_excluded_from_format_split() {
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"ATE0\r"),
            rec(2, 10, Direction::Tx, r"010C\r"),
            rec(3, 20, Direction::Tx, r"010C 1\r"),
        ]);
        let split = report.format_split.unwrap();
        assert_eq!(split.without_suffix + split.with_suffix, 2);
    }

    #[test]
    fn test_round_trip_single_sample() {
        let report = analyze(vec![
            rec(1, 100, Direction::Tx, r"010C\r"),
            rec(2, 140, Direction::Rx, r"41 0C 1A F8\r\r>"),
        ]);
        assert_eq!(report.round_trips.len(), 1);
        let rt = &report.round_trips[0];
        assert_eq!(rt.format, CommandFormat::Plain);
        assert_eq!(rt.samples, 1);
        assert!((rt.mean_ms - 40.0).abs() < 0.001);
        assert_eq!(rt.min_ms, 40);
        assert_eq!(rt.max_ms, 40);
    }

    #[test]
    fn test_round_trip_groups_ordered_unsuffixed_first() {
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"010C 1\r"),
            rec(2, 25, Direction::Rx, r"41 0C 1A F8\r\r>"),
            rec(3, 50, Direction::Tx, r"010D\r"),
            rec(4, 80, Direction::Rx, r"41 0D 55\r\r>"),
        ]);
        assert_eq!(report.round_trips.len(), 2);
        assert_eq!(report.round_trips[0].format, CommandFormat::Plain);
        assert_eq!(report.round_trips[0].min_ms, 30);
        assert_eq!(report.round_trips[1].format, CommandFormat::CountSuffixed);
        assert_eq!(report.round_trips[1].min_ms, 25);
    }

    #[test]
    fn test_round_trip_respects_lookahead_window() {
        let report = analyze(vec![
            rec(1, 0, Direction::Tx, r"010C\r"),
            rec(2, 1, Direction::Connect, ""),
            rec(3, 2, Direction::Connect, ""),
            rec(4, 3, Direction::Connect, ""),
            rec(5, 4, Direction::Connect, ""),
            rec(6, 90, Direction::Rx, r"41 0C 1A F8\r\r>"),
        ]);
        assert!(report.round_trips.is_empty());
    }

    #[test]
    fn test_report_is_idempotent() {
        let log = capture(vec![
            rec(1, 0, Direction::Tx, r"ATZ\r"),
            rec(2, 61, Direction::Rx, r"\rELM327 v1.5\r\r>"),
            rec(3, 100, Direction::Tx, r"010C\r"),
            rec(4, 140, Direction::Rx, "7E803410C"),
            rec(5, 160, Direction::Tx, r"010C 1\r"),
            rec(6, 185, Direction::Rx, r"410C1AF8\r4105 7B\r\r>"),
        ]);
        let analyzer = CaptureAnalyzer::default();
        let first = analyzer.analyze(&log).to_string();
        let second = analyzer.analyze(&log).to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_capture_degrades_gracefully() {
        let report = analyze(Vec::new());
        assert!(report.reset_response.is_none());
        assert_eq!(report.prompt_delivery.split_reads, 0);
        assert_eq!(report.fragmented_requests, 0);
        assert!(report.pci_check.is_none());
        assert!(report.round_trips.is_empty());
    }
}
