//! Tolerant line-oriented parser for the `stream-json` passthrough used by
//! the one-shot admin commands and by tests that want to replay a captured
//! transcript. The long-lived session itself uses `framer`/`control`
//! instead; this module is for batch decoding a complete text blob.

use serde_json::Value;

use crate::{error::StreamJsonLineError, message::SdkMessage};

#[derive(Debug, Clone)]
pub struct ClaudeStreamJsonEvent {
    pub value: Value,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ClaudeStreamJsonParseError {
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClaudeStreamJsonParser;

impl ClaudeStreamJsonParser {
    pub fn new() -> Self {
        Self
    }

    pub fn reset(&mut self) {}

    pub fn parse_line(
        &mut self,
        line: &str,
    ) -> Result<Option<ClaudeStreamJsonEvent>, ClaudeStreamJsonParseError> {
        let line = line.trim_end_matches('\r');
        if line.chars().all(char::is_whitespace) {
            return Ok(None);
        }

        serde_json::from_str::<Value>(line)
            .map(|value| Some(ClaudeStreamJsonEvent { value }))
            .map_err(|err| ClaudeStreamJsonParseError {
                message: err.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct StreamJsonLine {
    pub line_number: usize,
    pub raw: String,
}

#[derive(Debug, Clone)]
pub enum StreamJsonLineOutcome {
    Ok {
        line: StreamJsonLine,
        message: SdkMessage,
    },
    Err {
        line: StreamJsonLine,
        error: StreamJsonLineError,
    },
}

/// Parses a complete `stream-json` transcript into typed messages, one
/// outcome per non-blank line. Blank lines are skipped rather than treated
/// as errors, matching the wire's own tolerance for stray newlines.
pub fn parse_stream_json_lines(text: &str) -> Vec<StreamJsonLineOutcome> {
    let mut out = Vec::new();
    let mut parser = ClaudeStreamJsonParser::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_number = idx + 1;
        let raw = raw.trim_end_matches('\r');
        if raw.trim().is_empty() {
            continue;
        }
        let line = StreamJsonLine {
            line_number,
            raw: raw.to_string(),
        };
        match parser.parse_line(&line.raw) {
            Ok(Some(event)) => match serde_json::from_value::<SdkMessage>(event.value) {
                Ok(message) => out.push(StreamJsonLineOutcome::Ok { line, message }),
                Err(err) => out.push(StreamJsonLineOutcome::Err {
                    line,
                    error: StreamJsonLineError {
                        line_number,
                        message: err.to_string(),
                    },
                }),
            },
            Ok(None) => {}
            Err(err) => out.push(StreamJsonLineOutcome::Err {
                line,
                error: StreamJsonLineError {
                    line_number,
                    message: err.message,
                },
            }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_is_tolerant_and_line_oriented() {
        let mut parser = ClaudeStreamJsonParser::new();

        assert!(parser.parse_line("   ").unwrap().is_none());
        assert!(parser.parse_line("{\"k\":1}").unwrap().is_some());
        assert!(parser.parse_line("{not-json}").is_err());
        assert!(parser.parse_line("{\"k\":2}").unwrap().is_some());
    }

    #[test]
    fn batch_decode_produces_typed_messages() {
        let text = "\n{\"type\":\"result\",\"subtype\":\"success\",\"session_id\":\"s1\"}\n";
        let outcomes = parse_stream_json_lines(text);
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            StreamJsonLineOutcome::Ok { message, .. } => assert!(message.is_result()),
            StreamJsonLineOutcome::Err { error, .. } => panic!("unexpected error: {error}"),
        }
    }
}
