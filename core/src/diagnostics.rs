use crate::ast::NodeRef;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Error,
    Warning,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Error => "error",
            Category::Warning => "warning",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub category: Category,
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn at(node: &NodeRef, category: Category, message: impl Into<String>) -> Self {
        let span = node.span();
        Self {
            file: node.file().to_path_buf(),
            category,
            start: span.start,
            end: span.end,
            line: span.line,
            col: span.col,
            message: message.into(),
        }
    }

    /// Whole-file diagnostic (e.g. a parse failure).
    pub fn file_level(file: &Path, category: Category, message: impl Into<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            category,
            start: 0,
            end: 0,
            line: 1,
            col: 1,
            message: message.into(),
        }
    }

    fn same_report(&self, other: &Diagnostic) -> bool {
        self.start == other.start && self.end == other.end && self.message == other.message
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file.display(),
            self.line,
            self.col,
            self.category,
            self.message
        )
    }
}

/// Diagnostics grouped per file, deduplicated by range and message.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    by_file: IndexMap<PathBuf, Vec<Diagnostic>>,
}

impl Diagnostics {
    /// Record `d`; returns false if an identical report already exists.
    pub fn push(&mut self, d: Diagnostic) -> bool {
        let list = self.by_file.entry(d.file.clone()).or_default();
        if list.iter().any(|x| x.same_report(&d)) {
            return false;
        }
        list.push(d);
        true
    }

    pub fn for_file(&self, file: &Path) -> &[Diagnostic] {
        self.by_file.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn remove_file(&mut self, file: &Path) {
        self.by_file.shift_remove(file);
    }

    /// Withdraw a previously recorded report; returns whether one existed.
    pub fn retract(&mut self, d: &Diagnostic) -> bool {
        let Some(list) = self.by_file.get_mut(&d.file) else {
            return false;
        };
        let before = list.len();
        list.retain(|x| !x.same_report(d));
        before != list.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.by_file.values().flatten()
    }

    pub fn total(&self) -> usize {
        self.by_file.values().map(Vec::len).sum()
    }

    pub fn files_with_problems(&self) -> usize {
        self.by_file.values().filter(|v| !v.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
