#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::error::AnalysisError;
    use std::path::PathBuf;

    #[test]
    fn empty_file_gives_defaults() {
        let opts = AnalyzerOptions::from_toml("").expect("parse");
        assert_eq!(opts, AnalyzerOptions::default());
        assert_eq!(opts.suffix, ".rb");
        assert_eq!(opts.max_recursion, 3);
        assert!(opts.disk_cache);
    }

    #[test]
    fn fields_override_defaults() {
        let opts = AnalyzerOptions::from_toml(
            r#"
            suffix = ".rbx"
            load_path = ["lib", "vendor"]
            exclude = ["spec/"]
            disk_cache = false
            max_depth = 50

            [parser]
            kind = "command"
            program = "ruby"
            args = ["dump.rb"]
            timeout_secs = 5
            "#,
        )
        .expect("parse");
        assert_eq!(opts.suffix, ".rbx");
        assert_eq!(opts.load_path, vec![PathBuf::from("lib"), PathBuf::from("vendor")]);
        assert_eq!(opts.exclude, vec!["spec/".to_string()]);
        assert!(!opts.disk_cache);
        assert_eq!(opts.max_depth, 50);
        assert_eq!(opts.max_nodes, 2_000_000);
        assert_eq!(opts.parser.kind, ParserKind::Command);
        assert_eq!(opts.parser.timeout_secs, 5);
        assert!(opts.build_parser().is_ok());
    }

    #[test]
    fn command_parser_without_program_is_a_configuration_error() {
        let opts = AnalyzerOptions::from_toml("[parser]\nkind = \"command\"\n").expect("parse");
        let err = opts.build_parser().err().expect("must fail");
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn unknown_parser_kind_is_rejected() {
        assert!(AnalyzerOptions::from_toml("[parser]\nkind = \"yaml\"\n").is_err());
    }

    #[test]
    fn discover_reads_sonar_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), "suffix = \".json\"\n").expect("write");
        let opts = AnalyzerOptions::discover(dir.path()).expect("discover");
        assert_eq!(opts.suffix, ".json");

        let empty = tempfile::tempdir().expect("tempdir");
        let opts = AnalyzerOptions::discover(empty.path()).expect("discover");
        assert_eq!(opts.suffix, ".rb");
    }

    #[test]
    fn bad_toml_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "suffix = [").expect("write");
        let err = AnalyzerOptions::load(&path).err().expect("must fail");
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::ConfigurationError { .. })
        ));
    }
}
