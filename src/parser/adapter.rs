//! Parser adapter: picks parsers for a job and normalizes their output

use super::registry::ParserRegistry;
use super::resolver::ParserResolver;
use super::traits::{ParseError, ParseHint, ParsedAnalysis};

/// Runs the parsers selected for a job over raw content.
///
/// Selection order: job-name patterns (when a resolver is configured and the
/// job has a name), then the default parser list.
#[derive(Clone)]
pub struct ParserAdapter {
    registry: ParserRegistry,
    resolver: Option<ParserResolver>,
    defaults: Vec<String>,
}

impl ParserAdapter {
    pub fn new(registry: ParserRegistry) -> Self {
        Self {
            registry,
            resolver: None,
            defaults: Vec::new(),
        }
    }

    /// Built-in parsers, falling back to `markers`
    pub fn builtin() -> Self {
        Self::new(ParserRegistry::with_builtins()).with_defaults(vec!["markers".to_string()])
    }

    pub fn with_resolver(mut self, resolver: ParserResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_defaults(mut self, defaults: Vec<String>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Parser names for a job, validated against the registry
    pub fn resolve_parsers(&self, hint: &ParseHint) -> Result<Vec<String>, ParseError> {
        let from_patterns = match (&self.resolver, &hint.action_name) {
            (Some(resolver), Some(action)) => resolver.resolve(action),
            _ => None,
        };
        let names = from_patterns.unwrap_or_else(|| self.defaults.clone());

        if names.is_empty() {
            return Err(ParseError::NoParser(hint.label()));
        }
        if let Some(unknown) = names.iter().find(|name| !self.registry.contains(name)) {
            return Err(ParseError::UnknownParser(unknown.clone()));
        }
        Ok(names)
    }

    /// Run every selected parser in order; the first failure fails the parse
    pub async fn parse(&self, raw: &str, hint: &ParseHint) -> Result<Vec<ParsedAnalysis>, ParseError> {
        let mut analyses = Vec::new();

        for name in self.resolve_parsers(hint)? {
            let parser = self
                .registry
                .get(&name)
                .ok_or_else(|| ParseError::UnknownParser(name.clone()))?;

            let data = parser.parse(raw, hint).await?;
            tracing::debug!(parser = %name, job = %hint.label(), "parsed raw content");
            analyses.push(ParsedAnalysis { kind: name, data });
        }

        Ok(analyses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::resolver::JobPattern;
    use serde_json::json;

    fn hint(action: &str) -> ParseHint {
        ParseHint {
            action_name: Some(action.to_string()),
        }
    }

    #[tokio::test]
    async fn test_defaults_when_no_pattern_matches() {
        let adapter = ParserAdapter::builtin();
        let analyses = adapter.parse("[PASS] t1\n[FAIL] t2", &hint("build")).await.unwrap();

        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].kind, "markers");
        assert_eq!(analyses[0].data, json!({"passed": 1, "failed": 1, "failures": ["t2"]}));
    }

    #[tokio::test]
    async fn test_patterns_select_multiple_parsers() {
        let adapter = ParserAdapter::builtin().with_resolver(ParserResolver::new(vec![
            JobPattern::with_parsers("lint", vec!["flake8".into(), "markers".into()]),
        ]));

        let analyses = adapter.parse("a.py:1:1: E302 x", &hint("lint")).await.unwrap();
        let kinds: Vec<_> = analyses.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["flake8", "markers"]);
    }

    #[tokio::test]
    async fn test_unknown_parser_name() {
        let adapter = ParserAdapter::builtin().with_defaults(vec!["junit".into()]);
        let err = adapter.parse("", &ParseHint::default()).await.unwrap_err();
        assert!(matches!(err, ParseError::UnknownParser(name) if name == "junit"));
    }

    #[tokio::test]
    async fn test_no_parser_configured() {
        let adapter = ParserAdapter::new(ParserRegistry::with_builtins());
        let err = adapter.parse("", &hint("test")).await.unwrap_err();
        assert!(matches!(err, ParseError::NoParser(_)));
    }

    #[tokio::test]
    async fn test_any_parser_failure_fails_parse() {
        let adapter = ParserAdapter::builtin().with_defaults(vec!["markers".into(), "coverage".into()]);
        let err = adapter.parse("[PASS] t1", &ParseHint::default()).await.unwrap_err();
        assert!(matches!(err, ParseError::NoMatch { .. }));
    }
}
