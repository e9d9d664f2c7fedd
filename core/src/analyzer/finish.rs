//! Uncalled-function fixpoint and the unused-variable scan.

use super::call::CallArgs;
use super::{AnalysisSummary, Analyzer, Phase};
use crate::diagnostics::{Category, Diagnostic};
use crate::typ::FunId;
use tracing::{debug, info};

impl Analyzer {
    /// Apply every function no call site reached, until none is left, then
    /// report unused variables. Safe to call more than once.
    ///
    /// Draining applies each function with unknown arguments. That is a
    /// heuristic: a body that only makes sense for particular argument
    /// shapes may produce diagnostics a real call would not.
    pub fn finish(&mut self) -> AnalysisSummary {
        self.phase = Phase::Fixpoint;
        let mut rounds = 0usize;
        while !self.uncalled.is_empty() {
            rounds += 1;
            let pending: Vec<FunId> = self.uncalled.iter().copied().collect();
            for fun in pending {
                // an earlier drain in this round may have applied it
                if !self.uncalled.contains(&fun) {
                    continue;
                }
                let this = self.default_self(fun);
                self.apply(fun, this, CallArgs::default());
                self.exhausted = false;
                self.depth = 0;
            }
        }
        debug!(rounds, "uncalled functions drained");

        self.report_unused();
        self.phase = Phase::Done;
        let summary = self.summary();
        info!("{summary}");
        summary
    }

    /// One warning per variable, parameter or attribute nobody refers to.
    /// Warnings from an earlier scan are withdrawn once a reference exists.
    fn report_unused(&mut self) {
        let mut unused = Vec::new();
        let mut used = Vec::new();
        for (_, b) in self.registry.all() {
            if b.kind().exempt_from_unused() {
                continue;
            }
            let d = Diagnostic::at(b.node(), Category::Warning, format!("unused variable: {}", b.name()));
            if b.is_unused() {
                unused.push(d);
            } else {
                used.push(d);
            }
        }
        for d in &used {
            self.diagnostics.retract(d);
        }
        for d in unused {
            self.diagnostics.push(d);
        }
    }
}
