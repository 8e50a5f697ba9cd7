//! `[PASS] name` / `[FAIL] name` marker lines

use crate::parser::traits::{LogParser, ParseError, ParseHint};
use async_trait::async_trait;
use serde_json::json;

/// Counts pass/fail marker lines and lists the failing names
pub struct MarkerParser;

#[async_trait]
impl LogParser for MarkerParser {
    fn name(&self) -> &str {
        "markers"
    }

    async fn parse(&self, raw: &str, _hint: &ParseHint) -> Result<serde_json::Value, ParseError> {
        let mut passed = 0usize;
        let mut failures = Vec::new();

        for line in raw.lines().map(str::trim) {
            if let Some(name) = line.strip_prefix("[PASS]") {
                if !name.trim().is_empty() {
                    passed += 1;
                }
            } else if let Some(name) = line.strip_prefix("[FAIL]") {
                let name = name.trim();
                if !name.is_empty() {
                    failures.push(name.to_string());
                }
            }
        }

        Ok(json!({
            "passed": passed,
            "failed": failures.len(),
            "failures": failures,
        }))
    }
}
