//! Decoded Capture Log Parsing
//!
//! Data model and parser for textual dumps of recorded ELM327 adapter
//! sessions. A dump holds one or more named captures; each capture is an
//! ordered list of direction-tagged records exactly as they appear in the
//! source text.

mod error;
mod parser;
mod record;

pub use error::RecordParseError;
pub use parser::CaptureParser;
pub use record::{CaptureLog, CaptureRecord, Direction};

/// Protocol text literals the analysis heuristics match on.
///
/// Capture payloads are decoded text: control bytes appear as literal
/// two-character escapes (`\r` is a backslash followed by an `r`), so every
/// comparison uses that textual form, never the unescaped bytes.
pub mod token {
    /// Adapter reset command
    pub const RESET_COMMAND: &str = "ATZ";
    /// AT command prefix; any other TX payload is an OBD data request
    pub const AT_PREFIX: &str = "AT";
    /// Command prompt character
    pub const PROMPT: char = '>';
    /// Prompt delivered on its own after a single carriage return
    pub const BARE_PROMPT: &str = r"\r>";
    /// Prompt delivered on its own after a double carriage return
    pub const BARE_PROMPT_DOUBLE: &str = r"\r\r>";
    /// Adapter is still searching for a protocol
    pub const SEARCHING_MARKER: &str = "SEARCHING";
    /// Adapter had no data for the request
    pub const NO_DATA_MARKER: &str = "NO DATA";
    /// ECU response header visible when headers are switched on
    pub const ECU_RESPONSE_HEADER: &str = "7E8";
    /// Mode 01 engine-RPM response header
    pub const RPM_RESPONSE_HEADER: &str = "410C";
    /// Coolant temperature PID tag
    pub const COOLANT_PID: &str = "05";
    /// Expected-response-count suffix appended to OBD requests
    pub const COUNT_SUFFIX: &str = r" 1\r";
}
