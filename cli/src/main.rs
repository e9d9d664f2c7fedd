use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sonar_core::cache::AstCache;
use sonar_core::config::ParserKind;
use sonar_core::diagnostics::Diagnostic;
use sonar_core::{AnalysisError, AnalysisSummary, Analyzer, AnalyzerOptions};
use tracing::debug;


const DEFAULT_FILTER: &str = "sonar_core=info,sonar_cli=info";
const VERBOSE_FILTER: &str = "sonar_core=debug,sonar_cli=debug";

/// Initial stack for the analysis thread; deeper recursion grows it on demand.
const ANALYSIS_STACK_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "sonar",
    author,
    version,
    about = "Static analysis and cross references for Ruby source trees",
    long_about = None
)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (SONAR_LOG / RUST_LOG still win)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a directory or file and print its diagnostics.
    Analyze {
        /// Directory or single source file
        #[arg(value_name = "ROOT")]
        root: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
        /// Print diagnostics and the summary as one JSON document
        #[arg(long)]
        json: bool,
    },
    /// Delete the on-disk AST cache.
    ClearCache {
        /// Options file naming the cache directory
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// List every resolved name in FILE with the bindings it refers to.
    Refs {
        #[arg(value_name = "ROOT")]
        root: PathBuf,
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
    },
}

#[derive(Debug, Clone, Default, Args)]
struct OptionArgs {
    /// Options file (default: sonar.toml in ROOT)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Neither read nor write the on-disk AST cache
    #[arg(long)]
    no_disk_cache: bool,
    /// Parse files one at a time as they are loaded
    #[arg(long)]
    no_prewarm: bool,
    /// How source files are turned into trees
    #[arg(long, value_enum)]
    parser: Option<ParserArg>,
    /// Source file suffix, including the dot
    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ParserArg {
    Json,
    Command,
}

impl From<ParserArg> for ParserKind {
    fn from(value: ParserArg) -> Self {
        match value {
            ParserArg::Json => ParserKind::Json,
            ParserArg::Command => ParserKind::Command,
        }
    }
}

impl OptionArgs {
    /// File options for `root` with the command-line flags laid over them.
    fn resolve(&self, root: &Path) -> anyhow::Result<AnalyzerOptions> {
        let base = match &self.config {
            Some(path) => AnalyzerOptions::load(path)?.with_env(),
            None => AnalyzerOptions::discover(root)?,
        };
        Ok(self.apply(base))
    }

    fn apply(&self, mut opts: AnalyzerOptions) -> AnalyzerOptions {
        if self.no_disk_cache {
            opts.disk_cache = false;
        }
        if self.no_prewarm {
            opts.prewarm = false;
        }
        if let Some(kind) = self.parser {
            opts.parser.kind = kind.into();
        }
        if let Some(suffix) = &self.suffix {
            opts.suffix = if suffix.starts_with('.') {
                suffix.clone()
            } else {
                format!(".{suffix}")
            };
        }
        opts
    }
}

/// `SONAR_LOG`, then `RUST_LOG`, then the built-in default.
fn filter_directives(sonar_log: Option<String>, rust_log: Option<String>, verbose: bool) -> String {
    sonar_log
        .into_iter()
        .chain(rust_log)
        .map(|raw| raw.trim().to_string())
        .find(|raw| !raw.is_empty())
        .unwrap_or_else(|| (if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }).to_string())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    let directives = filter_directives(std::env::var("SONAR_LOG").ok(), std::env::var("RUST_LOG").ok(), verbose);
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = fmt().with_writer(std::io::stderr).with_env_filter(filter).try_init();
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<AnalysisError>() {
        Some(AnalysisError::ConfigurationError { .. }) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

#[derive(Serialize)]
struct Report<'a> {
    summary: &'a AnalysisSummary,
    diagnostics: Vec<&'a Diagnostic>,
}

fn analyze(root: &Path, options: &OptionArgs, json: bool) -> anyhow::Result<()> {
    let opts = options.resolve(root)?;
    let mut analyzer = Analyzer::new(opts)?;
    analyzer.analyze(root)?;
    let summary = analyzer.finish();

    if json {
        let report = Report {
            summary: &summary,
            diagnostics: analyzer.diagnostics().iter().collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report).context("encode report")?);
    } else {
        for d in analyzer.diagnostics().iter() {
            println!("{d}");
        }
    }
    eprintln!("{summary}");
    Ok(())
}

fn refs(root: &Path, file: &Path, options: &OptionArgs) -> anyhow::Result<()> {
    let opts = options.resolve(root)?;
    let mut analyzer = Analyzer::new(opts)?;
    analyzer.analyze(root)?;
    analyzer.finish();

    let file = std::fs::canonicalize(file).with_context(|| format!("resolve {}", file.display()))?;
    if !analyzer.loaded_files().any(|f| f == file.as_path()) {
        anyhow::bail!("{} was not analyzed", file.display());
    }
    let Some(index) = analyzer.references_for(&file) else {
        debug!(file = %file.display(), "no references");
        return Ok(());
    };

    let mut rows: Vec<_> = index.iter().collect();
    rows.sort_by_key(|(node, _)| node.span().start);
    for (node, ids) in rows {
        let span = node.span();
        let targets: Vec<&str> = ids
            .iter()
            .filter_map(|id| analyzer.binding(*id))
            .map(|b| b.qname())
            .collect();
        println!(
            "{}:{}:{}: {} -> {}",
            file.display(),
            span.line,
            span.col,
            node.name_id().unwrap_or("?"),
            targets.join(", ")
        );
    }
    Ok(())
}

fn clear_cache(config: Option<&Path>) -> anyhow::Result<()> {
    let opts = match config {
        Some(path) => AnalyzerOptions::load(path)?,
        None => AnalyzerOptions::discover(Path::new("."))?,
    };
    let cache = AstCache::new(opts.build_parser()?).with_disk_cache(opts.cache_dir.clone());
    cache.clear_disk_cache()?;
    eprintln!("cleared {}", opts.cache_dir.display());
    Ok(())
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Analyze { root, options, json } => analyze(&root, &options, json),
        Commands::ClearCache { config } => clear_cache(config.as_deref()),
        Commands::Refs { root, file, options } => refs(&root, &file, &options),
    }
}

fn main() -> ExitCode {
    let CliArgs { command, verbose } = CliArgs::parse();
    init_tracing(verbose);

    let worker = thread::Builder::new()
        .name("sonar-analysis".to_string())
        .stack_size(ANALYSIS_STACK_BYTES)
        .spawn(move || run(command));
    let result = match worker {
        Ok(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(anyhow::anyhow!("analysis thread panicked"))),
        Err(e) => Err(anyhow::Error::new(e).context("spawn analysis thread")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code(&e)
        }
    }
}
