//! Registry of available parsers

use super::parsers::{CoverageParser, Flake8Parser, MarkerParser, PytestParser};
use super::traits::LogParser;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Parsers by name
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: BTreeMap<String, Arc<dyn LogParser>>,
}

impl ParserRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in parser
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(MarkerParser);
        registry.register(PytestParser);
        registry.register(CoverageParser);
        registry.register(Flake8Parser);
        registry
    }

    /// Register a parser, replacing any parser with the same name
    pub fn register<P: LogParser + 'static>(&mut self, parser: P) {
        self.parsers.insert(parser.name().to_string(), Arc::new(parser));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LogParser>> {
        self.parsers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.parsers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ParserRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["coverage", "flake8", "markers", "pytest"]);
        assert!(registry.get("pytest").is_some());
        assert!(registry.get("junit").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ParserRegistry::new();
        assert!(registry.is_empty());
        registry.register(MarkerParser);
        registry.register(MarkerParser);
        assert_eq!(registry.len(), 1);
    }
}
