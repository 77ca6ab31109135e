//! Orchestrator for compiling documents.

use crate::cli::Args;
use crate::config::Config;
use crate::output::OutputFormatter;
use miette::{IntoDiagnostic, Result, WrapErr};
use rayon::prelude::*;
use sfc_compiler::{compile, CompileError, CompileOptions, CompileOutput};
use sfc_diagnostics::{template_diagnostics, Severity};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Result of a compile run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Number of documents found.
    pub file_count: usize,
    /// Documents that produced a module.
    pub compiled: usize,
    /// Number of errors, fatal or from templates.
    pub error_count: usize,
    /// Number of warnings.
    pub warning_count: usize,
    /// Time taken.
    pub duration_ms: u64,
}

/// What happened to one document.
#[derive(Debug)]
pub enum Outcome {
    Compiled {
        output: CompileOutput,
        /// Module file written, if any.
        written: Option<PathBuf>,
    },
    Failed(CompileError),
    /// The document could not be read or its output not written.
    Io(String),
}

/// One compiled document.
#[derive(Debug)]
pub struct FileReport {
    /// Path relative to the workspace.
    pub display_path: String,
    pub source: String,
    pub outcome: Outcome,
}

/// Orchestrator for running sfc-setup.
pub struct Orchestrator {
    config: Config,
    args: Args,
    options: CompileOptions,
    formatter: OutputFormatter,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(workspace: PathBuf, args: Args) -> Result<Self> {
        let config = Config::load(&workspace, &args)?;
        let options = config.compile_options();
        let formatter = OutputFormatter::new(args.output);

        Ok(Self {
            config,
            args,
            options,
            formatter,
        })
    }

    /// Compile every document once.
    pub fn run_once(&self) -> Result<RunResult> {
        let files = self.find_files();
        tracing::debug!(count = files.len(), "found documents");
        Ok(self.compile_all(&files))
    }

    /// Compile `files` in parallel and print their reports in order.
    fn compile_all(&self, files: &[PathBuf]) -> RunResult {
        let start = Instant::now();

        let reports: Vec<FileReport> = files.par_iter().map(|file| self.compile_file(file)).collect();

        let mut result = RunResult {
            file_count: files.len(),
            ..Default::default()
        };
        for report in &reports {
            self.formatter.print_report(report);
            match &report.outcome {
                Outcome::Compiled { output, .. } => {
                    if let Some(module) = &output.module {
                        result.compiled += 1;
                        if self.args.stdout {
                            self.formatter.print_module(&report.display_path, module);
                        }
                    }
                    for diagnostic in template_diagnostics(output) {
                        match diagnostic.severity {
                            Severity::Error => result.error_count += 1,
                            Severity::Warning => result.warning_count += 1,
                        }
                    }
                }
                Outcome::Failed(_) | Outcome::Io(_) => result.error_count += 1,
            }
        }
        result.duration_ms = start.elapsed().as_millis() as u64;

        self.formatter.print_summary(&result);
        result
    }

    /// Run in watch mode.
    pub fn run_watch(&self) -> Result<()> {
        use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
        use std::sync::mpsc::channel;
        use std::time::Duration;

        eprintln!("Starting watch mode...\n");
        self.run_once()?;

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            NotifyConfig::default().with_poll_interval(Duration::from_millis(500)),
        )
        .into_diagnostic()?;

        for root in self.roots() {
            watcher
                .watch(&root, RecursiveMode::Recursive)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to watch {}", root.display()))?;
        }

        loop {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => {
                    let mut changed: Vec<PathBuf> = event
                        .paths
                        .into_iter()
                        .filter(|path| path.is_file() && self.config.should_process(path))
                        .collect();
                    // Editors often emit several events per save.
                    while let Ok(more) = rx.recv_timeout(Duration::from_millis(50)) {
                        changed.extend(
                            more.paths
                                .into_iter()
                                .filter(|path| path.is_file() && self.config.should_process(path)),
                        );
                    }
                    changed.sort();
                    changed.dedup();

                    if !changed.is_empty() {
                        eprintln!("File change detected. Recompiling {} file(s)...\n", changed.len());
                        self.compile_all(&changed);
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        Ok(())
    }

    /// Paths given on the command line, or the workspace.
    fn roots(&self) -> Vec<PathBuf> {
        if self.args.paths.is_empty() {
            vec![self.config.workspace.clone()]
        } else {
            self.args
                .paths
                .iter()
                .map(|path| self.config.workspace.join(path))
                .collect()
        }
    }

    /// Find all documents under the roots.
    pub fn find_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for root in self.roots() {
            if root.is_file() {
                files.push(root);
                continue;
            }
            for entry in walkdir::WalkDir::new(&root)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if entry.file_type().is_file() && self.config.should_process(path) {
                    files.push(path.to_path_buf());
                }
            }
        }

        files.sort();
        files.dedup();
        files
    }

    /// Compile one document and write its module.
    fn compile_file(&self, path: &Path) -> FileReport {
        let display_path = self.config.display_path(path);
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                return FileReport {
                    display_path,
                    source: String::new(),
                    outcome: Outcome::Io(format!("Failed to read {}: {}", path.display(), e)),
                }
            }
        };

        let outcome = match compile(&source, &display_path, &self.options) {
            Ok(output) => match self.write_output(path, &output) {
                Ok(written) => Outcome::Compiled { output, written },
                Err(e) => Outcome::Io(format!("{:?}", e)),
            },
            Err(error) => Outcome::Failed(error),
        };

        FileReport {
            display_path,
            source,
            outcome,
        }
    }

    /// Write the module and its source map. Nothing is written for
    /// documents without a module or when printing to stdout.
    fn write_output(&self, path: &Path, output: &CompileOutput) -> Result<Option<PathBuf>> {
        let Some(module) = &output.module else {
            return Ok(None);
        };
        if self.args.stdout {
            return Ok(None);
        }

        let target = self.config.output_path(path, module.lang);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut code = module.code.clone();
        if let Some(map) = &module.map {
            let map_path = PathBuf::from(format!("{}.map", target.display()));
            let json = map.to_json().into_diagnostic()?;
            std::fs::write(&map_path, json)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to write {}", map_path.display()))?;
            if let Some(name) = map_path.file_name() {
                code.push_str(&format!("//# sourceMappingURL={}\n", name.to_string_lossy()));
            }
        }
        std::fs::write(&target, code)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write {}", target.display()))?;

        tracing::debug!(target = %target.display(), "wrote module");
        Ok(Some(target))
    }
}
