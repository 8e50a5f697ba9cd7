//! Built-in log parsers

mod coverage;
mod flake8;
mod markers;
mod pytest;

pub use coverage::CoverageParser;
pub use flake8::Flake8Parser;
pub use markers::MarkerParser;
pub use pytest::PytestParser;
