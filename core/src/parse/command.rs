use super::{SourceParser, content_hash, convert};
use crate::ast::Ast;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an external dumper (`program args... <path>`) and converts the JSON
/// it prints on stdout. Each file gets a fresh process, so a hung or killed
/// dumper never affects the next parse.
#[derive(Debug, Clone)]
pub struct CommandParser {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandParser {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    fn run(&self, path: &Path) -> Option<Vec<u8>> {
        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                warn!(program = %self.program.display(), error = %e, "failed to start parser");
                return None;
            }
        };

        // drain stdout concurrently so a large dump cannot block the child
        let mut stdout = child.stdout.take()?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!(file = %path.display(), timeout = ?self.timeout, "parser timed out, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = reader.join();
                    return None;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "lost track of parser process");
                    let _ = child.kill();
                    return None;
                }
            }
        };

        let output = reader.join().ok()?.ok()?;
        if !status.success() {
            debug!(file = %path.display(), %status, "parser exited with failure");
            return None;
        }
        Some(output)
    }
}

impl SourceParser for CommandParser {
    fn parse(&self, path: &Path) -> Option<Ast> {
        let source = std::fs::read(path).ok()?;
        let dump = self.run(path)?;
        let value: serde_json::Value = serde_json::from_slice(&dump).ok()?;
        match convert::ast_from_json(path, content_hash(&source), &value) {
            Ok(ast) => Some(ast),
            Err(e) => {
                debug!(file = %path.display(), error = %e, "ast dump conversion failed");
                None
            }
        }
    }
}
