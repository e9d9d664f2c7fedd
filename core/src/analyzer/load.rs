//! File loading, requires and incremental re-analysis.

use super::{Analyzer, Phase};
use crate::ast::NodeRef;
use crate::diagnostics::{Category, Diagnostic};
use crate::error::AnalysisError;
use crate::typ::{FunId, Type};
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

impl Analyzer {
    /// Load every source file under `root` (a directory or a single file).
    ///
    /// Fails only when `root` itself is unusable; problems inside individual
    /// files are recorded as diagnostics.
    pub fn analyze(&mut self, root: &Path) -> Result<()> {
        let root = fs::canonicalize(root).map_err(|e| AnalysisError::ConfigurationError {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if self.phase == Phase::Idle {
            self.started = Instant::now();
        }
        self.phase = Phase::Loading;

        let project = if root.is_dir() {
            root.clone()
        } else {
            root.parent().map_or_else(|| root.clone(), Path::to_path_buf)
        };
        self.project_dir = Some(project);

        let files = self.collect_files(&root);
        info!(root = %root.display(), files = files.len(), "loading");
        if self.options.prewarm {
            self.cache.prewarm(&files);
        }

        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            if !self.loaded.contains(file) {
                self.load(file, false);
            }
            debug!(done = i + 1, total, "progress");
        }
        Ok(())
    }

    fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        if root.is_file() {
            return vec![root.to_path_buf()];
        }
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                let s = p.to_string_lossy();
                s.ends_with(&self.options.suffix) && !self.options.exclude.iter().any(|x| s.contains(x.as_str()))
            })
            .collect()
    }

    /// Transform one file under the global scope unless it is already loaded.
    pub fn load_file(&mut self, path: &Path) -> Option<Type> {
        self.load(path, false)
    }

    /// Forget `path` and analyze it again from a fresh parse.
    pub fn reload(&mut self, path: &Path) -> Option<Type> {
        self.remove_file(path);
        self.load(path, true)
    }

    pub(super) fn load(&mut self, path: &Path, force: bool) -> Option<Type> {
        let path = canonical(path);
        if self.import_stack.contains(&path) {
            debug!(file = %path.display(), "circular load skipped");
            return None;
        }
        if !force && self.loaded.contains(&path) {
            return None;
        }

        let Some(ast) = self.cache.get_ast(&path) else {
            let err = AnalysisError::ParseFailure { path: path.clone() };
            debug!("{err}");
            self.diagnostics
                .push(Diagnostic::file_level(&path, Category::Error, "failed to parse"));
            self.failed_to_parse.insert(path);
            return None;
        };
        if ast.len() > self.options.max_nodes {
            self.skip_exhausted(&path, "max_nodes");
            return None;
        }
        self.failed_to_parse.shift_remove(&path);

        self.import_stack.insert(path.clone());
        let depth = self.depth;
        let saved = std::mem::replace(&mut self.cwd, path.parent().map(Path::to_path_buf));

        let root = NodeRef::new(Arc::clone(&ast), ast.root());
        let global = self.scopes.global();
        let ty = self.transform(&root, global);

        self.cwd = saved;
        self.import_stack.remove(&path);

        if self.exhausted {
            self.skip_exhausted(&path, "max_depth");
            // only this file is dropped; the requirer carries on
            self.exhausted = false;
            self.depth = depth;
            return None;
        }
        self.loaded.insert(path);
        Some(ty)
    }

    fn skip_exhausted(&mut self, path: &Path, limit: &'static str) {
        let err = AnalysisError::ResourceExhausted {
            path: path.to_path_buf(),
            limit,
        };
        warn!("{err}, skipping file");
        self.cache.clear();
    }

    /// `require 'name'`: find `name` (plus the source suffix) on the load path
    /// and load it. `force` re-transforms an already loaded file.
    pub(super) fn require_file(&mut self, name: &str, force: bool) {
        let rel = if name.ends_with(&self.options.suffix) {
            name.to_string()
        } else {
            format!("{name}{}", self.options.suffix)
        };
        match self.find_required(Path::new(&rel)) {
            Some(path) => {
                self.load(&path, force);
            }
            None => debug!(name, "require target not found"),
        }
    }

    fn find_required(&self, rel: &Path) -> Option<PathBuf> {
        if rel.is_absolute() {
            return rel.is_file().then(|| canonical(rel));
        }
        let roots: Vec<&PathBuf> = self
            .options
            .load_path
            .iter()
            .chain(self.cwd.iter())
            .chain(self.project_dir.iter())
            .collect();

        for root in &roots {
            let candidate = root.join(rel);
            if candidate.is_file() {
                return Some(canonical(&candidate));
            }
        }
        roots.iter().filter(|r| r.is_dir()).find_map(|root| {
            WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .find(|e| e.file_type().is_file() && e.path().ends_with(rel))
                .map(|e| canonical(e.path()))
        })
    }

    /// Require the file a constant conventionally lives in (`FooBar` in
    /// `foo_bar.rb`). True if that loaded something new.
    pub(super) fn autoload_constant(&mut self, name: &str) -> bool {
        let file = snake_case(name);
        if !self.autoloaded.insert(file.clone()) {
            return false;
        }
        let before = self.loaded.len();
        self.require_file(&file, false);
        self.loaded.len() > before
    }

    /// Drop everything `path` contributed: its bindings and references,
    /// diagnostics, cached tree and pending functions. References other
    /// files hold to its bindings are dropped with them.
    pub fn remove_file(&mut self, path: &Path) {
        let path = canonical(path);
        let removed = self.registry.remove_file(&path);
        self.scopes.purge(&removed);
        self.diagnostics.remove_file(&path);
        self.loaded.shift_remove(&path);
        self.failed_to_parse.shift_remove(&path);
        self.resolved.retain(|n| n.file() != path.as_path());
        self.unresolved.retain(|n| n.file() != path.as_path());
        self.cache.remove(&path);

        let stale: Vec<FunId> = self
            .uncalled
            .iter()
            .copied()
            .filter(|f| self.functions[f.index()].node.file() == path.as_path())
            .collect();
        for f in stale {
            self.uncalled.shift_remove(&f);
        }
        self.fun_by_node.retain(|n, _| n.file() != path.as_path());
        debug!(file = %path.display(), bindings = removed.len(), "file removed");
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// `FooBar` -> `foo_bar`, `HTTPServer` -> `http_server`.
pub(super) fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
