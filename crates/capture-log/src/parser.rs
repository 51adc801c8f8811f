//! Decoded Capture Dump Parser

use crate::record::{CaptureLog, CaptureRecord};
use regex::Regex;
use tracing::debug;

/// Header line opening one capture segment
const SEGMENT_HEADER_PATTERN: &str = r"(?m)^=== (capture_.*?\.ttcap) ===$";

/// Grammar of one record line: indentation, sequence number, timestamp,
/// direction token, declared byte count, then the payload to end of line
const RECORD_LINE_PATTERN: &str = r"^\s+(\d+)\s+(\d+)\s+(TX|RX|CONNECT|DISCONNECT)\s+(\d+)\s+(.*)$";

/// Parser for multi-capture decoded text dumps
///
/// The parser never fails: a dump with no segment headers parses to an
/// empty result, and lines that do not match the record grammar (blank
/// lines, comments, stray headers) are dropped without diagnostic.
pub struct CaptureParser {
    header_re: Regex,
    record_re: Regex,
}

impl CaptureParser {
    /// Create a parser with the segment and record grammars compiled
    pub fn new() -> Self {
        Self {
            header_re: Regex::new(SEGMENT_HEADER_PATTERN)
                .expect("segment header pattern must compile"),
            record_re: Regex::new(RECORD_LINE_PATTERN)
                .expect("record line pattern must compile"),
        }
    }

    /// Split a decoded dump into per-capture record sequences.
    ///
    /// Each segment runs from its header to the next header or end of
    /// text. Record order mirrors source line order; duplicate or
    /// out-of-order sequence numbers pass through unchanged.
    pub fn parse(&self, text: &str) -> Vec<CaptureLog> {
        let headers: Vec<(usize, usize, &str)> = self
            .header_re
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let name = caps.get(1)?;
                Some((whole.start(), whole.end(), name.as_str()))
            })
            .collect();

        let mut logs = Vec::with_capacity(headers.len());
        for (i, &(_, body_start, name)) in headers.iter().enumerate() {
            let body_end = headers
                .get(i + 1)
                .map_or(text.len(), |&(next_start, _, _)| next_start);
            let records = self.parse_segment(&text[body_start..body_end]);
            debug!("capture {}: {} records", name, records.len());
            logs.push(CaptureLog {
                name: name.to_string(),
                records,
            });
        }
        logs
    }

    fn parse_segment(&self, segment: &str) -> Vec<CaptureRecord> {
        segment
            .lines()
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    fn parse_line(&self, line: &str) -> Option<CaptureRecord> {
        let caps = self.record_re.captures(line)?;
        Some(CaptureRecord {
            sequence: caps.get(1)?.as_str().parse().ok()?,
            timestamp_ms: caps.get(2)?.as_str().parse().ok()?,
            direction: caps.get(3)?.as_str().parse().ok()?,
            byte_count: caps.get(4)?.as_str().parse().ok()?,
            payload: caps.get(5)?.as_str().trim().to_string(),
        })
    }
}

impl Default for CaptureParser {
    fn default() -> Self {
        Self::new()
    }
}
