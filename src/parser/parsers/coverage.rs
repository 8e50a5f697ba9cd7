//! coverage.py / pytest-cov report tables

use crate::parser::traits::{LogParser, ParseError, ParseHint};
use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::json;

const HEADER: &str = r"(?i)Name\s+Stmts\s+Miss\s+Cover";
// missing-line ranges must start with a digit so separator dashes don't match
const MODULE_LINE: &str = r"(?m)^([\w/._-]+\.py)\s+(\d+)\s+(\d+)\s+(\d+)%(?:\s+(\d[\d,\s-]*))?\s*$";
const TOTAL_LINE: &str = r"(?m)^TOTAL\s+(\d+)\s+(\d+)\s+(\d+)%";

/// Extracts total and per-module coverage
pub struct CoverageParser;

impl CoverageParser {
    fn number(parser: &str, text: &str) -> Result<u64, ParseError> {
        text.parse().map_err(|e| ParseError::Failed {
            parser: parser.to_string(),
            message: format!("bad number '{}': {}", text, e),
        })
    }
}

#[async_trait]
impl LogParser for CoverageParser {
    fn name(&self) -> &str {
        "coverage"
    }

    async fn parse(&self, raw: &str, _hint: &ParseHint) -> Result<serde_json::Value, ParseError> {
        let no_match = || ParseError::NoMatch {
            parser: self.name().to_string(),
        };

        if !Regex::new(HEADER)?.is_match(raw) {
            return Err(no_match());
        }
        let total = Regex::new(TOTAL_LINE)?.captures(raw).ok_or_else(no_match)?;

        let mut modules = Vec::new();
        for caps in Regex::new(MODULE_LINE)?.captures_iter(raw) {
            modules.push(json!({
                "name": &caps[1],
                "statements": Self::number(self.name(), &caps[2])?,
                "missing": Self::number(self.name(), &caps[3])?,
                "coverage": Self::number(self.name(), &caps[4])? as f64,
                "missing_lines": caps.get(5).map(|m| m.as_str().trim()).unwrap_or(""),
            }));
        }

        Ok(json!({
            "total_statements": Self::number(self.name(), &total[1])?,
            "total_missing": Self::number(self.name(), &total[2])?,
            "total_coverage": Self::number(self.name(), &total[3])? as f64,
            "modules": modules,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
---------- coverage: platform linux, python 3.11 -----------
Name                 Stmts   Miss  Cover   Missing
--------------------------------------------------
src/module_a.py         45      3    93%   12, 25-27
src/module_b.py         20      0   100%
--------------------------------------------------
TOTAL                   65      3    95%
";

    #[tokio::test]
    async fn test_parses_totals_and_modules() {
        let data = CoverageParser.parse(REPORT, &ParseHint::default()).await.unwrap();
        assert_eq!(data["total_statements"], 65);
        assert_eq!(data["total_missing"], 3);
        assert_eq!(data["total_coverage"], 95.0);

        let modules = data["modules"].as_array().unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0]["name"], "src/module_a.py");
        assert_eq!(modules[0]["missing_lines"], "12, 25-27");
        assert_eq!(modules[1]["missing_lines"], "");
    }

    #[tokio::test]
    async fn test_missing_total_is_no_match() {
        let raw = "Name Stmts Miss Cover\nsrc/a.py 1 0 100%\n";
        let err = CoverageParser.parse(raw, &ParseHint::default()).await.unwrap_err();
        assert!(matches!(err, ParseError::NoMatch { .. }));
    }

    #[tokio::test]
    async fn test_no_table_is_no_match() {
        let err = CoverageParser.parse("[PASS] t1", &ParseHint::default()).await.unwrap_err();
        assert!(matches!(err, ParseError::NoMatch { .. }));
    }
}
