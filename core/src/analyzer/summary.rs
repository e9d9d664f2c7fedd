use super::Analyzer;
use serde::Serialize;
use std::fmt;

/// Counts describing one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub duration_ms: u64,
    pub files_loaded: usize,
    pub failed_to_parse: usize,
    pub files_with_problems: usize,
    pub diagnostics: usize,
    pub definitions: usize,
    pub cross_references: usize,
    pub referencing_nodes: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Percentage of name occurrences that resolved.
    pub resolve_rate: f64,
    pub calls: usize,
}

impl Analyzer {
    pub fn summary(&self) -> AnalysisSummary {
        let resolved = self.resolved.len();
        let unresolved = self.unresolved.len();
        let total = resolved + unresolved;
        let resolve_rate = if total == 0 {
            100.0
        } else {
            resolved as f64 * 100.0 / total as f64
        };
        AnalysisSummary {
            duration_ms: self.started.elapsed().as_millis() as u64,
            files_loaded: self.loaded.len(),
            failed_to_parse: self.failed_to_parse.len(),
            files_with_problems: self.diagnostics.files_with_problems(),
            diagnostics: self.diagnostics.total(),
            definitions: self.registry.len(),
            cross_references: self.registry.cross_references(),
            referencing_nodes: self.registry.referencing_nodes(),
            resolved,
            unresolved,
            resolve_rate,
            calls: self.calls,
        }
    }
}

impl fmt::Display for AnalysisSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "analyzed {} files in {}ms ({} failed to parse): {} diagnostics in {} files, \
             {} definitions, {} cross references, {} resolved / {} unresolved names ({:.1}%), {} calls",
            self.files_loaded,
            self.duration_ms,
            self.failed_to_parse,
            self.diagnostics,
            self.files_with_problems,
            self.definitions,
            self.cross_references,
            self.resolved,
            self.unresolved,
            self.resolve_rate,
            self.calls
        )
    }
}
