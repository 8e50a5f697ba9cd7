//! Log parsing
//!
//! - **LogParser**: turns raw job output into a structured document
//! - **ParserRegistry**: available parsers by name
//! - **ParserResolver**: job-name patterns → parser names
//! - **ParserAdapter**: resolves and runs parsers for one case

mod adapter;
pub mod parsers;
mod registry;
mod resolver;
mod traits;

pub use adapter::ParserAdapter;
pub use parsers::{CoverageParser, Flake8Parser, MarkerParser, PytestParser};
pub use registry::ParserRegistry;
pub use resolver::{JobPattern, ParserResolver};
pub use traits::{LogParser, ParseError, ParseHint, ParsedAnalysis};
