//! Parser boundary.
//!
//! The analyzer never parses source text itself: a [`SourceParser`] hands it
//! a finished [`Ast`]. Two implementations ship with the crate, both built on
//! the JSON dump format understood by [`convert::ast_from_json`].

use crate::ast::Ast;
use std::hash::Hasher;
use std::path::Path;
use tracing::debug;
use twox_hash::XxHash64;

mod command;
pub mod convert;

#[cfg(test)]
mod convert_test;

pub use command::CommandParser;

/// Produces a syntax tree for one file.
///
/// Implementations must return `None` on any unreadable or malformed input
/// and must not panic; the analyzer records such files as failed to parse.
pub trait SourceParser: Send + Sync {
    fn parse(&self, path: &Path) -> Option<Ast>;
}

/// Content hash used for tree identity and disk-cache keys.
pub fn content_hash(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Reads files whose contents are already a JSON AST dump.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonAstParser;

impl JsonAstParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse an in-memory dump attributed to `path`.
    pub fn parse_bytes(&self, path: &Path, bytes: &[u8]) -> Option<Ast> {
        let value: serde_json::Value = match serde_json::from_slice(bytes) {
            Ok(v) => v,
            Err(e) => {
                debug!(file = %path.display(), error = %e, "malformed ast dump");
                return None;
            }
        };
        match convert::ast_from_json(path, content_hash(bytes), &value) {
            Ok(ast) => Some(ast),
            Err(e) => {
                debug!(file = %path.display(), error = %e, "ast dump conversion failed");
                None
            }
        }
    }
}

impl SourceParser for JsonAstParser {
    fn parse(&self, path: &Path) -> Option<Ast> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                debug!(file = %path.display(), error = %e, "unreadable source");
                return None;
            }
        };
        self.parse_bytes(path, &bytes)
    }
}
