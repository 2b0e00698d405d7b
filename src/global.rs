//! Query adapter around the GNU Global `global` executable.
//!
//! Each request runs `global` once, synchronously, in the directory of the
//! document it concerns, and maps the captured stdout into results. The exit
//! status is not inspected: whatever usable output the tool printed is
//! parsed. Only a failure to start the process is reported to the caller.

use std::path::{Path, PathBuf};
use std::process::Command;

use parking_lot::RwLock;

use crate::document::TextDocument;
use crate::error::{GlobalError, GlobalResult};
use crate::types::{LocationResult, Position, SymbolResult};
use crate::xref::{self, CrossReference};

/// Characters `global` should percent-encode in printed paths
const ENCODE_PATH_CHARS: &str = " ";

/// A single `global` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `-xa <symbol>`: definitions, cxref format, absolute paths
    Definition(String),
    /// `-xra <symbol>`: references, cxref format, absolute paths
    References(String),
    /// `-c <prefix>`: symbol names starting with the prefix
    Completion(String),
    /// `-xaf <file>`: every definition in one file
    DocumentSymbols(PathBuf),
    /// `--version`
    Version,
}

impl Query {
    pub fn args(&self) -> Vec<String> {
        let encode = ["--encode-path".to_string(), ENCODE_PATH_CHARS.to_string()];
        match self {
            Query::Definition(symbol) => {
                let mut args = encode.to_vec();
                args.extend(["-xa".to_string(), symbol.clone()]);
                args
            }
            Query::References(symbol) => {
                let mut args = encode.to_vec();
                args.extend(["-xra".to_string(), symbol.clone()]);
                args
            }
            Query::Completion(prefix) => vec!["-c".to_string(), prefix.clone()],
            Query::DocumentSymbols(file) => {
                let mut args = encode.to_vec();
                args.extend(["-xaf".to_string(), file.to_string_lossy().into_owned()]);
                args
            }
            Query::Version => vec!["--version".to_string()],
        }
    }
}

/// Runs an external program to completion and hands back its stdout.
pub trait CommandRunner {
    fn run(&self, executable: &str, args: &[String], cwd: Option<&Path>)
    -> std::io::Result<Vec<u8>>;
}

/// Spawns real processes with the inherited environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        executable: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> std::io::Result<Vec<u8>> {
        let mut command = Command::new(executable);
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let output = command.output()?;
        if !output.status.success() {
            tracing::debug!(
                executable,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "global exited unsuccessfully"
            );
        }
        Ok(output.stdout)
    }
}

/// The query adapter.
///
/// The executable name sits behind a lock so a window-scope setter can
/// swap it while the adapter is shared.
pub struct Global<R = ProcessRunner> {
    executable: RwLock<String>,
    runner: R,
}

impl Global<ProcessRunner> {
    pub fn new(executable: impl Into<String>) -> Self {
        Self::with_runner(executable, ProcessRunner)
    }
}

impl Default for Global<ProcessRunner> {
    fn default() -> Self {
        Self::new("global")
    }
}

impl<R: CommandRunner> Global<R> {
    pub fn with_runner(executable: impl Into<String>, runner: R) -> Self {
        Self {
            executable: RwLock::new(executable.into()),
            runner,
        }
    }

    pub fn executable(&self) -> String {
        self.executable.read().clone()
    }

    pub fn set_executable(&self, executable: impl Into<String>) {
        let executable = executable.into();
        let mut current = self.executable.write();
        if *current != executable {
            tracing::info!(from = %current, to = %executable, "Switching global executable");
            *current = executable;
        }
    }

    /// First line of `global --version`
    pub fn version(&self) -> GlobalResult<String> {
        let lines = self.execute(&Query::Version, None)?;
        Ok(lines.into_iter().next().unwrap_or_default())
    }

    pub fn provide_definition(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> GlobalResult<Vec<LocationResult>> {
        let Some(symbol) = document.word_at(position) else {
            return Ok(Vec::new());
        };
        let lines = self.execute(&Query::Definition(symbol), document.directory())?;
        Ok(to_locations(&lines))
    }

    pub fn provide_references(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> GlobalResult<Vec<LocationResult>> {
        let Some(symbol) = document.word_at(position) else {
            return Ok(Vec::new());
        };
        let lines = self.execute(&Query::References(symbol), document.directory())?;
        Ok(to_locations(&lines))
    }

    /// Completion labels, one per output line
    pub fn provide_completion_items(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> GlobalResult<Vec<String>> {
        let Some(prefix) = document.word_at(position) else {
            return Ok(Vec::new());
        };
        let lines = self.execute(&Query::Completion(prefix), document.directory())?;
        Ok(lines.into_iter().filter(|line| !line.is_empty()).collect())
    }

    pub fn provide_document_symbols(
        &self,
        document: &TextDocument,
    ) -> GlobalResult<Vec<SymbolResult>> {
        let query = Query::DocumentSymbols(document.path().to_path_buf());
        let lines = self.execute(&query, document.directory())?;
        Ok(xref::parse_lines(
            lines.iter().map(String::as_str),
            |record| record.to_symbol(),
        ))
    }

    /// Run `global` and split its stdout into lines
    fn execute(&self, query: &Query, cwd: Option<&Path>) -> GlobalResult<Vec<String>> {
        let executable = self.executable();
        let args = query.args();
        tracing::debug!(executable = %executable, args = ?args, cwd = ?cwd, "Running global");

        let stdout = self
            .runner
            .run(&executable, &args, cwd)
            .map_err(|source| GlobalError::Spawn {
                executable: executable.clone(),
                source,
            })?;

        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

fn to_locations(lines: &[String]) -> Vec<LocationResult> {
    xref::parse_lines(lines.iter().map(String::as_str), |record: CrossReference| {
        record.location()
    })
}
