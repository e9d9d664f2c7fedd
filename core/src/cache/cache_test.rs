#[cfg(test)]
mod tests {
    use crate::ast::Ast;
    use crate::cache::*;
    use crate::parse::{JsonAstParser, SourceParser};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl SourceParser for Counting {
        fn parse(&self, path: &Path) -> Option<Ast> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            JsonAstParser.parse(path)
        }
    }

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, body).expect("write source");
        p
    }

    const ONE: &str = r#"{"type": "program", "body": {"type": "block", "stmts": [{"type": "int", "value": "1"}]}}"#;
    const TWO: &str = r#"{"type": "program", "body": {"type": "block", "stmts": [{"type": "int", "value": "2"}]}}"#;

    #[test]
    fn memory_hit_skips_parser() {
        let dir = tempfile::tempdir().expect("tempdir");
        let f = write(dir.path(), "a.rb", ONE);
        let parser = Arc::new(Counting::default());
        let cache = AstCache::new(parser.clone());

        let first = cache.get_ast(&f).expect("parses");
        let second = cache.get_ast(&f).expect("cached");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().memory_hits, 1);
    }

    #[test]
    fn failures_are_remembered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let f = write(dir.path(), "bad.rb", "not json");
        let parser = Arc::new(Counting::default());
        let cache = AstCache::new(parser.clone());
        assert!(cache.get_ast(&f).is_none());
        assert!(cache.get_ast(&f).is_none());
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&f));
    }

    #[test]
    fn remove_then_get_reparses_new_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let f = write(dir.path(), "a.rb", ONE);
        let parser = Arc::new(Counting::default());
        let cache = AstCache::new(parser.clone());
        let old = cache.get_ast(&f).expect("parses");

        fs::write(&f, TWO).expect("rewrite");
        // still the stale tree until invalidated
        assert!(Arc::ptr_eq(&old, &cache.get_ast(&f).expect("cached")));
        cache.remove(&f);
        let new = cache.get_ast(&f).expect("reparses");
        assert_ne!(old.content_hash(), new.content_hash());
        assert_eq!(parser.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disk_tier_survives_a_fresh_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache_dir = dir.path().join("cache");
        let f = write(dir.path(), "a.rb", ONE);

        let parser = Arc::new(Counting::default());
        let first = AstCache::new(parser.clone()).with_disk_cache(&cache_dir);
        let parsed = first.get_ast(&f).expect("parses");
        let entry = cache_dir.join(format!("a.rb{:016x}.ast", parsed.content_hash()));
        assert!(entry.exists(), "entry {} written", entry.display());

        let second = AstCache::new(parser.clone()).with_disk_cache(&cache_dir);
        let loaded = second.get_ast(&f).expect("from disk");
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.stats().disk_hits, 1);
        assert_eq!(*loaded, *parsed);
        assert_eq!(loaded.file(), f.as_path());
    }

    #[test]
    fn corrupt_disk_entry_is_a_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache_dir = dir.path().join("cache");
        let f = write(dir.path(), "a.rb", ONE);
        let parser = Arc::new(Counting::default());

        let ast = AstCache::new(parser.clone())
            .with_disk_cache(&cache_dir)
            .get_ast(&f)
            .expect("parses");
        let entry = DiskCache::new(&cache_dir).entry_path(&f, ast.content_hash());
        fs::write(&entry, b"RSAC garbage").expect("corrupt entry");

        let fresh = AstCache::new(parser.clone()).with_disk_cache(&cache_dir);
        assert!(fresh.get_ast(&f).is_some());
        assert_eq!(parser.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_drops_memory_and_clear_disk_removes_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache_dir = dir.path().join("cache");
        let f = write(dir.path(), "a.rb", ONE);
        let cache = AstCache::new(Arc::new(JsonAstParser)).with_disk_cache(&cache_dir);
        cache.get_ast(&f);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        cache.clear_disk_cache().expect("clear disk");
        assert!(!cache_dir.exists());
    }

    #[test]
    fn prewarm_parses_every_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files: Vec<PathBuf> = (0..12)
            .map(|i| write(dir.path(), &format!("f{i}.rb"), ONE))
            .collect();
        let parser = Arc::new(Counting::default());
        let cache = AstCache::new(parser.clone());
        cache.prewarm(&files);
        assert_eq!(cache.len(), files.len());
        assert_eq!(parser.calls.load(Ordering::SeqCst), files.len());
        cache.prewarm(&files);
        assert_eq!(parser.calls.load(Ordering::SeqCst), files.len());
    }

    #[test]
    fn codec_checks_header() {
        let ast = JsonAstParser
            .parse_bytes(Path::new("a.rb"), ONE.as_bytes())
            .expect("parses");
        let mut bytes = encode_ast(&ast).expect("encode");
        assert_eq!(&bytes[..4], b"RSAC");
        assert_eq!(decode_ast(&bytes).expect("decode"), ast);

        bytes[4] = CURRENT_VERSION.wrapping_add(1) as u8;
        assert!(decode_ast(&bytes).is_err());
        assert!(decode_ast(b"RSA").is_err());
    }
}
