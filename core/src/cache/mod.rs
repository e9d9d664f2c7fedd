//! Two-tier memoization of parsed trees.
//!
//! Lookups go memory, then disk (keyed by a hash of the file's bytes), then
//! the parser. A remembered `None` means the file failed to parse and will not
//! be retried until it is removed from the cache.

use crate::ast::Ast;
use crate::parse::{SourceParser, content_hash};
use anyhow::Result;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, error, info, warn};

mod disk;

#[cfg(test)]
mod cache_test;

pub use disk::{CURRENT_VERSION, DiskCache, decode_ast, encode_ast};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: usize,
    pub disk_hits: usize,
    pub parses: usize,
}

pub struct AstCache {
    memory: DashMap<PathBuf, Option<Arc<Ast>>>,
    disk: Option<DiskCache>,
    parser: Arc<dyn SourceParser>,
    memory_hits: AtomicUsize,
    disk_hits: AtomicUsize,
    parses: AtomicUsize,
}

impl std::fmt::Debug for AstCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AstCache")
            .field("entries", &self.memory.len())
            .field("disk", &self.disk)
            .finish()
    }
}

impl AstCache {
    /// Memory-only cache in front of `parser`.
    pub fn new(parser: Arc<dyn SourceParser>) -> Self {
        Self {
            memory: DashMap::new(),
            disk: None,
            parser,
            memory_hits: AtomicUsize::new(0),
            disk_hits: AtomicUsize::new(0),
            parses: AtomicUsize::new(0),
        }
    }

    /// Add an on-disk tier under `dir`. If the directory cannot be created the
    /// cache stays memory-only.
    pub fn with_disk_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match fs::create_dir_all(&dir) {
            Ok(()) => self.disk = Some(DiskCache::new(dir)),
            Err(e) => error!(dir = %dir.display(), error = %e, "failed to create AST cache directory"),
        }
        self
    }

    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    pub fn get_ast(&self, path: &Path) -> Option<Arc<Ast>> {
        if let Some(entry) = self.memory.get(path) {
            self.memory_hits.fetch_add(1, Ordering::Relaxed);
            debug!(file = %path.display(), "ast cache hit");
            return entry.value().clone();
        }

        let source = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(file = %path.display(), error = %e, "unreadable source");
                self.memory.insert(path.to_path_buf(), None);
                return None;
            }
        };
        let hash = content_hash(&source);

        if let Some(disk) = &self.disk
            && let Some(ast) = disk.load(path, hash)
        {
            self.disk_hits.fetch_add(1, Ordering::Relaxed);
            debug!(file = %path.display(), "ast disk cache hit");
            let ast = Arc::new(ast);
            self.memory.insert(path.to_path_buf(), Some(Arc::clone(&ast)));
            return Some(ast);
        }

        debug!(file = %path.display(), "ast cache miss, parsing");
        self.parses.fetch_add(1, Ordering::Relaxed);
        let parsed = self.parser.parse(path).map(Arc::new);
        if let (Some(ast), Some(disk)) = (&parsed, &self.disk)
            && let Err(e) = disk.store(path, ast)
        {
            warn!(file = %path.display(), error = %e, "failed to write AST cache entry");
        }
        self.memory.insert(path.to_path_buf(), parsed.clone());
        parsed
    }

    pub fn put(&self, path: impl Into<PathBuf>, ast: Arc<Ast>) {
        self.memory.insert(path.into(), Some(ast));
    }

    pub fn remove(&self, path: &Path) {
        self.memory.remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.memory.contains_key(path)
    }

    /// Drop the in-memory tier.
    pub fn clear(&self) {
        self.memory.clear();
    }

    pub fn clear_disk_cache(&self) -> Result<()> {
        match &self.disk {
            Some(disk) => disk.clear(),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            parses: self.parses.load(Ordering::Relaxed),
        }
    }

    /// Parse `files` concurrently on `available_parallelism + 1` workers.
    /// Returns once every file has an entry.
    pub fn prewarm(&self, files: &[PathBuf]) {
        let pending: Vec<&PathBuf> = files.iter().filter(|f| !self.contains(f)).collect();
        if pending.is_empty() {
            return;
        }
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            + 1;
        let workers = workers.min(pending.len());
        info!(files = pending.len(), workers, "pre-warming AST cache");

        let (tx, rx) = crossbeam::channel::unbounded::<&Path>();
        for f in &pending {
            let _ = tx.send(f.as_path());
        }
        drop(tx);

        thread::scope(|s| {
            for _ in 0..workers {
                let rx = rx.clone();
                s.spawn(move || {
                    for path in rx.iter() {
                        let _ = self.get_ast(path);
                    }
                });
            }
        });
    }
}
