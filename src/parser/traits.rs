//! Log parser traits defining the parse interface

use crate::case::CaseIdentifier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from parser resolution or from a parser itself
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no parser configured for {0}")]
    NoParser(String),

    #[error("unknown parser: {0}")]
    UnknownParser(String),

    #[error("{parser}: no recognizable output")]
    NoMatch { parser: String },

    #[error("{parser} failed: {message}")]
    Failed { parser: String, message: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}

/// What a parser may know about the content besides the text itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseHint {
    /// Human-readable job name, used to pick parsers
    pub action_name: Option<String>,
}

impl ParseHint {
    pub fn for_case(case: &CaseIdentifier) -> Self {
        Self {
            action_name: case.action_name().map(str::to_string),
        }
    }

    /// Label used in error messages
    pub fn label(&self) -> String {
        match &self.action_name {
            Some(name) => format!("job '{}'", name),
            None => "unnamed job".to_string(),
        }
    }
}

/// One parser's normalized output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAnalysis {
    /// Name of the parser; stored as the analysis kind
    pub kind: String,
    pub data: serde_json::Value,
}

/// Trait for log parsers
///
/// Parsers turn raw job output into a structured JSON document. They are
/// pure with respect to the pipeline: no storage, no provider calls.
///
/// # Example
///
/// ```ignore
/// struct LineCounter;
///
/// #[async_trait]
/// impl LogParser for LineCounter {
///     fn name(&self) -> &str { "lines" }
///
///     async fn parse(&self, raw: &str, _hint: &ParseHint) -> Result<serde_json::Value, ParseError> {
///         Ok(serde_json::json!({ "lines": raw.lines().count() }))
///     }
/// }
/// ```
#[async_trait]
pub trait LogParser: Send + Sync {
    /// Unique name; doubles as the analysis kind
    fn name(&self) -> &str;

    async fn parse(&self, raw: &str, hint: &ParseHint) -> Result<serde_json::Value, ParseError>;
}
