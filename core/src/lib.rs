pub mod analyzer;
pub mod ast;
pub mod binding;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod parse;
pub mod scope;
pub mod typ;

#[cfg(test)]
mod config_test;

pub use analyzer::{AnalysisSummary, Analyzer, Phase};
pub use config::AnalyzerOptions;
pub use error::AnalysisError;
