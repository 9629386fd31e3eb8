//! Incremental decoder for the camera event protocol.
//!
//! The attach stream is plain text: CRLF-terminated lines, most of them
//! multipart framing we don't care about. Two kinds of line matter:
//!
//! - `HTTP/1.1 200 OK`: the camera echoes its status line into the body
//!   on some firmware; treated as a connect signal.
//! - `Code=<name>;action=<Start|Stop>;<key>=<value>;...`: an alarm event.
//!
//! [`EventParser`] buffers partial lines across reads so an event split
//! over two chunks is still seen exactly once.

use std::collections::HashMap;

use strum::{Display, EnumString};
use thiserror::Error;

/// Status line that signals an established stream.
pub const STATUS_LINE_OK: &str = "HTTP/1.1 200 OK";

/// Prefix of every alarm line.
pub const EVENT_CODE_MARKER: &str = "Code=";

/// Longest unterminated line we'll hold on to.
pub const MAX_PENDING_LINE: usize = 64 * 1024;

// ── AlarmRecord ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum AlarmAction {
    Start,
    Stop,
}

/// One decoded alarm line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmRecord {
    pub code: String,
    pub action: AlarmAction,
    /// Every other `key=value` pair on the line (`index`, `data`, ...).
    pub fields: HashMap<String, String>,
}

// ── Line outcomes ────────────────────────────────────────────────────

/// Why an alarm line was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("token '{0}' has no '='")]
    MissingSeparator(String),

    #[error("token '{0}' has an empty key")]
    EmptyKey(String),

    #[error("missing '{0}' field")]
    MissingField(&'static str),

    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Connected,
    Alarm(AlarmRecord),
    Ignored,
    Malformed { line: String, error: LineError },
}

/// Decode a single line (without its terminator).
pub fn parse_line(line: &str) -> LineOutcome {
    if line == STATUS_LINE_OK {
        return LineOutcome::Connected;
    }
    if !line.starts_with(EVENT_CODE_MARKER) {
        return LineOutcome::Ignored;
    }
    match parse_alarm(line) {
        Ok(record) => LineOutcome::Alarm(record),
        Err(error) => LineOutcome::Malformed {
            line: line.to_owned(),
            error,
        },
    }
}

fn parse_alarm(line: &str) -> Result<AlarmRecord, LineError> {
    let mut fields = HashMap::new();

    for token in line.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| LineError::MissingSeparator(token.to_owned()))?;
        if key.is_empty() {
            return Err(LineError::EmptyKey(token.to_owned()));
        }
        fields.insert(key.to_owned(), value.to_owned());
    }

    let code = fields
        .remove("Code")
        .ok_or(LineError::MissingField("Code"))?;
    let action = fields
        .remove("action")
        .ok_or(LineError::MissingField("action"))?;
    let action = action
        .parse::<AlarmAction>()
        .map_err(|_| LineError::UnknownAction(action))?;

    Ok(AlarmRecord {
        code,
        action,
        fields,
    })
}

// ── EventParser ──────────────────────────────────────────────────────

/// Per-connection line decoder.
///
/// Reset it (or build a new one) whenever the underlying connection is
/// replaced; leftover bytes from a dead stream must not prefix the next.
#[derive(Debug, Default)]
pub struct EventParser {
    pending: Vec<u8>,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read's worth of bytes; returns the outcome of every line
    /// completed by it, in order. Ignored lines are left out.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<LineOutcome> {
        self.pending.extend_from_slice(chunk);

        let mut outcomes = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let raw = &self.pending[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw);

            match parse_line(&line) {
                LineOutcome::Ignored => {}
                outcome => outcomes.push(outcome),
            }
            start = end + 1;
        }
        self.pending.drain(..start);

        if self.pending.len() > MAX_PENDING_LINE {
            tracing::warn!(
                bytes = self.pending.len(),
                "Discarding over-long unterminated line"
            );
            self.pending.clear();
        }

        outcomes
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn alarm(outcome: &LineOutcome) -> &AlarmRecord {
        match outcome {
            LineOutcome::Alarm(record) => record,
            other => panic!("expected alarm, got {other:?}"),
        }
    }

    #[test]
    fn parses_start_line() {
        let mut parser = EventParser::new();
        let out = parser.feed(b"Code=VideoMotion;action=Start;index=0\r\n");

        assert_eq!(out.len(), 1);
        let record = alarm(&out[0]);
        assert_eq!(record.code, "VideoMotion");
        assert_eq!(record.action, AlarmAction::Start);
        assert_eq!(record.fields.get("index").map(String::as_str), Some("0"));
        assert!(!record.fields.contains_key("Code"));
    }

    #[test]
    fn malformed_line_is_skipped_and_stream_continues() {
        let mut parser = EventParser::new();
        let out = parser.feed(
            b"Code=VideoMotion;garbage\r\nCode=VideoMotion;action=Stop;index=0\r\n",
        );

        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0],
            LineOutcome::Malformed {
                line: "Code=VideoMotion;garbage".into(),
                error: LineError::MissingSeparator("garbage".into()),
            }
        );
        assert_eq!(alarm(&out[1]).action, AlarmAction::Stop);
    }

    #[test]
    fn empty_key_is_malformed() {
        assert!(matches!(
            parse_line("Code=VideoMotion;=oops;action=Start"),
            LineOutcome::Malformed {
                error: LineError::EmptyKey(_),
                ..
            }
        ));
    }

    #[test]
    fn unknown_action_is_malformed() {
        assert!(matches!(
            parse_line("Code=VideoMotion;action=Pulse"),
            LineOutcome::Malformed {
                error: LineError::UnknownAction(_),
                ..
            }
        ));
    }

    #[test]
    fn missing_action_is_malformed() {
        assert!(matches!(
            parse_line("Code=VideoMotion;index=0"),
            LineOutcome::Malformed {
                error: LineError::MissingField("action"),
                ..
            }
        ));
    }

    #[test]
    fn trailing_semicolon_and_equals_in_value() {
        let out = parse_line("Code=AudioMutation;action=Start;data={\"a\":\"b=c\"};");
        let record = alarm(&out);
        assert_eq!(record.code, "AudioMutation");
        assert_eq!(
            record.fields.get("data").map(String::as_str),
            Some("{\"a\":\"b=c\"}")
        );
    }

    #[test]
    fn status_line_signals_connected() {
        let mut parser = EventParser::new();
        assert_eq!(parser.feed(b"HTTP/1.1 200 OK\r\n"), vec![LineOutcome::Connected]);
    }

    #[test]
    fn framing_lines_are_ignored() {
        let mut parser = EventParser::new();
        let out = parser.feed(
            b"--myboundary\r\nContent-Type: text/plain\r\nContent-Length: 37\r\n\r\n",
        );
        assert!(out.is_empty());
        assert_eq!(parser.pending_len(), 0);
    }

    #[test]
    fn line_split_across_chunks() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"Code=VideoMo").is_empty());
        assert!(parser.feed(b"tion;action=Sta").is_empty());
        assert_eq!(parser.pending_len(), 27);

        let out = parser.feed(b"rt;index=0\r");
        assert!(out.is_empty());

        let out = parser.feed(b"\nCode=VideoMotion;action=Stop;index=0\r\n");
        assert_eq!(out.len(), 2);
        assert_eq!(alarm(&out[0]).action, AlarmAction::Start);
        assert_eq!(alarm(&out[1]).action, AlarmAction::Stop);
        assert_eq!(parser.pending_len(), 0);
    }

    #[test]
    fn bare_newlines_are_accepted() {
        let mut parser = EventParser::new();
        let out = parser.feed(b"Code=VideoMotion;action=Start\n");
        assert_eq!(alarm(&out[0]).code, "VideoMotion");
    }

    #[test]
    fn oversized_partial_line_is_dropped() {
        let mut parser = EventParser::new();
        let junk = vec![b'x'; MAX_PENDING_LINE + 1];
        assert!(parser.feed(&junk).is_empty());
        assert_eq!(parser.pending_len(), 0);

        let out = parser.feed(b"Code=VideoMotion;action=Start\r\n");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn reset_discards_partial_line() {
        let mut parser = EventParser::new();
        parser.feed(b"Code=VideoMotion;act");
        parser.reset();
        let out = parser.feed(b"ion=Start\r\n");
        assert!(out.is_empty());
    }
}
