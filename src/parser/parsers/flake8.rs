//! flake8 violation lines

use crate::parser::traits::{LogParser, ParseError, ParseHint};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::Serialize;

const VIOLATION_LINE: &str = r"(?m)^(.+?):(\d+):(\d+):\s+([A-Z]\d+)\s+(.+)$";

#[derive(Debug, Serialize)]
struct Violation<'a> {
    file: &'a str,
    line: u32,
    column: u32,
    code: &'a str,
    message: &'a str,
}

/// `path:line:col: CODE message`
pub struct Flake8Parser;

#[async_trait]
impl LogParser for Flake8Parser {
    fn name(&self) -> &str {
        "flake8"
    }

    async fn parse(&self, raw: &str, _hint: &ParseHint) -> Result<serde_json::Value, ParseError> {
        let pattern = Regex::new(VIOLATION_LINE)?;

        let mut violations = Vec::new();
        for caps in pattern.captures_iter(raw) {
            let (Ok(line), Ok(column)) = (caps[2].parse::<u32>(), caps[3].parse::<u32>()) else {
                continue;
            };
            violations.push(Violation {
                file: caps.get(1).map_or("", |m| m.as_str()),
                line,
                column,
                code: caps.get(4).map_or("", |m| m.as_str()),
                message: caps.get(5).map_or("", |m| m.as_str().trim()),
            });
        }

        Ok(serde_json::json!({
            "violation_count": violations.len(),
            "violations": violations,
        }))
    }
}
