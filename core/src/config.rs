//! Analyzer options, read from `sonar.toml`.

use crate::error::AnalysisError;
use crate::parse::{CommandParser, JsonAstParser, SourceParser};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_FILE: &str = "sonar.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// Source files already hold JSON AST dumps.
    #[default]
    Json,
    /// Run an external dumper per file.
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    pub kind: ParserKind,
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            kind: ParserKind::Json,
            program: None,
            args: Vec::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalyzerOptions {
    /// Source file suffix, including the dot.
    pub suffix: String,
    /// Extra roots searched by `require`.
    pub load_path: Vec<PathBuf>,
    /// Path substrings skipped by the directory walk.
    pub exclude: Vec<String>,
    pub cache_dir: PathBuf,
    pub disk_cache: bool,
    pub prewarm: bool,
    /// Transform nesting budget.
    pub max_depth: usize,
    /// Per-file AST size budget.
    pub max_nodes: usize,
    /// Simultaneously active applications allowed per function.
    pub max_recursion: usize,
    /// Require `snake_case.rb` when a constant is unresolved.
    pub autoload_constants: bool,
    pub parser: ParserOptions,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            suffix: ".rb".to_string(),
            load_path: Vec::new(),
            exclude: Vec::new(),
            cache_dir: std::env::temp_dir().join("sonar").join("ast_cache"),
            disk_cache: true,
            prewarm: true,
            max_depth: 2000,
            max_nodes: 2_000_000,
            max_recursion: 3,
            autoload_constants: false,
            parser: ParserOptions::default(),
        }
    }
}

impl AnalyzerOptions {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid analyzer configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AnalysisError::ConfigurationError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text).map_err(|e| {
            AnalysisError::ConfigurationError {
                path: path.to_path_buf(),
                reason: format!("{e:#}"),
            }
            .into()
        })
    }

    /// Options for analyzing `root`: its `sonar.toml` if present, otherwise
    /// defaults. Either way `RUBYLIB` is appended to the load path.
    pub fn discover(root: &Path) -> Result<Self> {
        let dir = if root.is_file() {
            root.parent().unwrap_or(root)
        } else {
            root
        };
        let candidate = dir.join(CONFIG_FILE);
        let opts = if candidate.is_file() {
            Self::load(&candidate)?
        } else {
            Self::default()
        };
        Ok(opts.with_env())
    }

    /// Append `RUBYLIB` entries to the load path.
    pub fn with_env(mut self) -> Self {
        if let Some(lib) = std::env::var_os("RUBYLIB") {
            for p in std::env::split_paths(&lib) {
                if !p.as_os_str().is_empty() && !self.load_path.contains(&p) {
                    self.load_path.push(p);
                }
            }
        }
        self
    }

    pub fn build_parser(&self) -> Result<Arc<dyn SourceParser>> {
        match self.parser.kind {
            ParserKind::Json => Ok(Arc::new(JsonAstParser::new())),
            ParserKind::Command => {
                let program = self.parser.program.clone().ok_or_else(|| AnalysisError::ConfigurationError {
                    path: PathBuf::from(CONFIG_FILE),
                    reason: "parser.kind = \"command\" needs parser.program".to_string(),
                })?;
                Ok(Arc::new(CommandParser::new(
                    program,
                    self.parser.args.clone(),
                    Duration::from_secs(self.parser.timeout_secs.max(1)),
                )))
            }
        }
    }
}
