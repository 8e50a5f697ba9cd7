//! pytest verbose output

use crate::parser::traits::{LogParser, ParseError, ParseHint};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::Serialize;

const RESULT_LINE: &str = r"(?m)^(.+?)::([\w\[\],-]+)\s+(PASSED|FAILED|SKIPPED|ERROR)";
const SUMMARY_LINE: &str = r"(?m)^(FAILED|ERROR)\s+(.+?)\s+-\s+(.+)$";
const DURATION_LINE: &str = r"(?m)(\d+\.\d+)s\s+call\s+(.+)$";
const SECTION_HEADER: &str = r"^={3,}\s+(FAILURES|ERRORS)\s+={3,}";
const ENTRY_HEADER: &str = r"^_{3,}\s+(?:ERROR at setup of |FAILED )?(.+?)\s+_{3,}$";
const ERROR_LINE: &str = r"^E\s+(.+)$";

#[derive(Debug, Clone, Serialize)]
struct TestResult {
    test_nodeid: String,
    #[serde(skip)]
    outcome: Outcome,
    error_message: Option<String>,
    duration: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl Outcome {
    fn from_marker(marker: &str) -> Self {
        match marker {
            "PASSED" => Outcome::Passed,
            "FAILED" => Outcome::Failed,
            "SKIPPED" => Outcome::Skipped,
            _ => Outcome::Error,
        }
    }
}

/// Extracts per-test outcomes, failure messages and call durations
pub struct PytestParser;

impl PytestParser {
    fn collect_results(raw: &str) -> Result<Vec<TestResult>, ParseError> {
        let result_line = Regex::new(RESULT_LINE)?;
        Ok(result_line
            .captures_iter(raw)
            .map(|caps| TestResult {
                test_nodeid: format!("{}::{}", caps[1].trim(), &caps[2]),
                outcome: Outcome::from_marker(&caps[3]),
                error_message: None,
                duration: None,
            })
            .collect())
    }

    /// `E   ...` lines from the FAILURES / ERRORS sections
    fn attach_failure_sections(raw: &str, results: &mut [TestResult]) -> Result<(), ParseError> {
        let section_header = Regex::new(SECTION_HEADER)?;
        let entry_header = Regex::new(ENTRY_HEADER)?;
        let error_line = Regex::new(ERROR_LINE)?;

        let mut in_section = false;
        let mut current: Option<(String, Vec<String>)> = None;

        let flush = |entry: Option<(String, Vec<String>)>, results: &mut [TestResult]| {
            let Some((identifier, lines)) = entry else { return };
            if lines.is_empty() {
                return;
            }
            // section headers name the test without its path; classes are dotted
            let suffixes = [format!("::{}", identifier), format!("::{}", identifier.replace('.', "::"))];
            if let Some(result) = results.iter_mut().find(|r| {
                matches!(r.outcome, Outcome::Failed | Outcome::Error)
                    && (r.test_nodeid == identifier || suffixes.iter().any(|s| r.test_nodeid.ends_with(s.as_str())))
            }) {
                result.error_message = Some(lines.join("\n"));
            }
        };

        for line in raw.lines() {
            let line = line.trim_end();
            if section_header.is_match(line) {
                flush(current.take(), results);
                in_section = true;
                continue;
            }
            if !in_section {
                continue;
            }
            if line.starts_with("===") {
                flush(current.take(), results);
                in_section = false;
            } else if let Some(caps) = entry_header.captures(line) {
                flush(current.take(), results);
                current = Some((caps[1].trim().to_string(), Vec::new()));
            } else if let (Some(caps), Some((_, lines))) = (error_line.captures(line), current.as_mut()) {
                lines.push(caps[1].trim().to_string());
            }
        }
        flush(current.take(), results);

        Ok(())
    }

    /// Short test summary lines fill messages the sections didn't provide
    fn attach_summary_messages(raw: &str, results: &mut [TestResult]) -> Result<(), ParseError> {
        let summary_line = Regex::new(SUMMARY_LINE)?;
        for caps in summary_line.captures_iter(raw) {
            let nodeid = caps[2].trim();
            if let Some(result) = results.iter_mut().find(|r| r.test_nodeid == nodeid) {
                if result.error_message.is_none() {
                    result.error_message = Some(caps[3].trim().to_string());
                }
            }
        }
        Ok(())
    }

    fn attach_durations(raw: &str, results: &mut [TestResult]) -> Result<(), ParseError> {
        let duration_line = Regex::new(DURATION_LINE)?;
        for caps in duration_line.captures_iter(raw) {
            let nodeid = caps[2].trim();
            let Ok(duration) = caps[1].parse::<f64>() else { continue };
            if let Some(result) = results.iter_mut().find(|r| r.test_nodeid == nodeid) {
                result.duration = Some(duration);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LogParser for PytestParser {
    fn name(&self) -> &str {
        "pytest"
    }

    async fn parse(&self, raw: &str, _hint: &ParseHint) -> Result<serde_json::Value, ParseError> {
        let mut results = Self::collect_results(raw)?;
        Self::attach_failure_sections(raw, &mut results)?;
        Self::attach_summary_messages(raw, &mut results)?;
        Self::attach_durations(raw, &mut results)?;

        let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let failed_tests: Vec<&TestResult> = results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed | Outcome::Error))
            .collect();
        let passed_tests: Vec<&str> = results
            .iter()
            .filter(|r| r.outcome == Outcome::Passed)
            .map(|r| r.test_nodeid.as_str())
            .collect();

        Ok(serde_json::json!({
            "total_tests": results.len(),
            "passed": count(Outcome::Passed),
            "failed": count(Outcome::Failed),
            "skipped": count(Outcome::Skipped),
            "errors": count(Outcome::Error),
            "failed_tests": failed_tests,
            "passed_tests": passed_tests,
        }))
    }
}
