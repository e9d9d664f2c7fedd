//! On-disk tier of the AST cache.
//!
//! One file per tree, named `<basename><content hash>.ast`. Entries are
//! content-addressed, so concurrent writers never contend for a slot with
//! different inputs, and a torn or stale entry reads as a miss.

use crate::ast::Ast;
use anyhow::{Context, Result, bail, ensure};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const MAGIC: [u8; 4] = *b"RSAC";
pub const CURRENT_VERSION: u16 = 1;
const HEADER_LEN: usize = 16;

/// Encode a tree: magic, version, reserved, content hash, JSON payload.
pub fn encode_ast(ast: &Ast) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(ast).context("serialize ast")?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&CURRENT_VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // reserved
    out.extend_from_slice(&ast.content_hash().to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode_ast(bytes: &[u8]) -> Result<Ast> {
    ensure!(bytes.len() >= HEADER_LEN, "cache entry too small");
    ensure!(bytes[..4] == MAGIC, "invalid cache entry magic");
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != CURRENT_VERSION {
        bail!("unsupported cache entry version {version} (reader supports {CURRENT_VERSION})");
    }
    let mut hash = [0u8; 8];
    hash.copy_from_slice(&bytes[8..HEADER_LEN]);
    let hash = u64::from_le_bytes(hash);
    let ast: Ast = serde_json::from_slice(&bytes[HEADER_LEN..]).context("deserialize ast")?;
    ensure!(ast.content_hash() == hash, "cache entry hash mismatch");
    Ok(ast)
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, source: &Path, hash: u64) -> PathBuf {
        let base = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir.join(format!("{base}{hash:016x}.ast"))
    }

    /// Cached tree for `source` with content hash `hash`, if a valid one exists.
    pub fn load(&self, source: &Path, hash: u64) -> Option<Ast> {
        let path = self.entry_path(source, hash);
        let bytes = fs::read(&path).ok()?;
        match decode_ast(&bytes) {
            Ok(mut ast) => {
                ast.set_file(source.to_path_buf());
                Some(ast)
            }
            Err(e) => {
                warn!(entry = %path.display(), error = %e, "corrupt cache entry, ignoring");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Write `ast` atomically: readers see either the old entry, nothing, or
    /// the complete new one.
    pub fn store(&self, source: &Path, ast: &Ast) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create cache dir {}", self.dir.display()))?;
        let bytes = encode_ast(ast)?;
        let mut tmp = NamedTempFile::new_in(&self.dir).context("create cache temp file")?;
        tmp.write_all(&bytes).context("write cache entry")?;
        let dest = self.entry_path(source, ast.content_hash());
        tmp.persist(&dest)
            .with_context(|| format!("persist cache entry {}", dest.display()))?;
        debug!(entry = %dest.display(), "cached ast on disk");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)
                .with_context(|| format!("remove cache dir {}", self.dir.display()))?;
        }
        Ok(())
    }
}
