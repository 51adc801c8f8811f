//! Capture Record Data Model

use crate::error::RecordParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a single capture record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Data sent to the adapter
    Tx,
    /// Data received from the adapter
    Rx,
    /// Session opened
    Connect,
    /// Session closed
    Disconnect,
}

impl Direction {
    /// Token used for this direction in decoded dumps
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Tx => "TX",
            Direction::Rx => "RX",
            Direction::Connect => "CONNECT",
            Direction::Disconnect => "DISCONNECT",
        }
    }

    /// Whether this record carries payload data
    pub fn carries_payload(&self) -> bool {
        matches!(self, Direction::Tx | Direction::Rx)
    }
}

impl FromStr for Direction {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TX" => Ok(Direction::Tx),
            "RX" => Ok(Direction::Rx),
            "CONNECT" => Ok(Direction::Connect),
            "DISCONNECT" => Ok(Direction::Disconnect),
            other => Err(RecordParseError::UnknownDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped event from a capture
///
/// `byte_count` is the length declared on the dump line; it is never
/// cross-checked against `payload.len()` (the declared length may cover
/// framing bytes the textual rendering does not show).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Sequence number as printed in the dump, unique within a capture
    pub sequence: u32,
    /// Milliseconds since capture start
    pub timestamp_ms: u64,
    /// Record direction
    pub direction: Direction,
    /// Payload length declared by the dump line
    pub byte_count: u32,
    /// Decoded payload text, trimmed, with control bytes as escape literals
    pub payload: String,
}

/// One recorded adapter session: a named, ordered record sequence
///
/// Record order mirrors the source text; nothing is sorted or deduplicated,
/// and the analyzer relies on that positional order to pair requests with
/// responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureLog {
    /// Capture file name from the segment header
    pub name: String,
    /// Records in source order
    pub records: Vec<CaptureRecord>,
}

impl CaptureLog {
    /// Records sent to the adapter, in source order
    pub fn tx_records(&self) -> Vec<&CaptureRecord> {
        self.records
            .iter()
            .filter(|r| r.direction == Direction::Tx)
            .collect()
    }

    /// Records received from the adapter, in source order
    pub fn rx_records(&self) -> Vec<&CaptureRecord> {
        self.records
            .iter()
            .filter(|r| r.direction == Direction::Rx)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_round_trip() {
        for token in ["TX", "RX", "CONNECT", "DISCONNECT"] {
            let direction: Direction = token.parse().unwrap();
            assert_eq!(direction.as_str(), token);
        }
    }

    #[test]
    fn test_direction_rejects_unknown_token() {
        let err = "SEND".parse::<Direction>().unwrap_err();
        assert_eq!(err, RecordParseError::UnknownDirection("SEND".to_string()));
    }

    #[test]
    fn test_lifecycle_records_carry_no_payload() {
        assert!(Direction::Tx.carries_payload());
        assert!(Direction::Rx.carries_payload());
        assert!(!Direction::Connect.carries_payload());
        assert!(!Direction::Disconnect.carries_payload());
    }
}
