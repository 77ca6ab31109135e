//! Output formatting for diagnostics.

use crate::cli::OutputFormat;
use crate::orchestrator::{FileReport, Outcome, RunResult};
use sfc_compiler::GeneratedModule;
use sfc_diagnostics::{
    template_diagnostics, CompileErrorReport, Diagnostic, Severity, TemplateErrorReport,
};

/// Formatter for diagnostic output.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print everything one document reported.
    pub fn print_report(&self, report: &FileReport) {
        match self.format {
            OutputFormat::Human => self.print_report_human(report),
            OutputFormat::Json => {
                for line in self.report_json(report) {
                    println!("{}", line);
                }
            }
        }
    }

    /// Print the summary.
    pub fn print_summary(&self, result: &RunResult) {
        match self.format {
            OutputFormat::Human => self.print_summary_human(result),
            OutputFormat::Json => println!("{}", summary_json(result)),
        }
    }

    /// Print a compiled module to stdout.
    pub fn print_module(&self, display_path: &str, module: &GeneratedModule) {
        match self.format {
            OutputFormat::Human => {
                println!("// {}", display_path);
                print!("{}", module.code);
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "type": "module",
                    "file": display_path,
                    "lang": module.lang.extension(),
                    "code": module.code,
                    "map": module.map.as_ref().and_then(|map| map.to_json().ok()),
                });
                println!("{}", json);
            }
        }
    }

    // Human format

    fn print_report_human(&self, report: &FileReport) {
        match &report.outcome {
            Outcome::Compiled { output, written } => {
                for diagnostic in template_diagnostics(output) {
                    if diagnostic.severity == Severity::Warning {
                        eprintln!("{}", human_line(report, &diagnostic));
                    }
                }
                if let Some(errors) = TemplateErrorReport::new(&report.display_path, &report.source, output) {
                    eprintln!("{:?}", miette::Report::new(errors));
                }
                if let Some(written) = written {
                    tracing::info!(file = %report.display_path, target = %written.display(), "compiled");
                }
            }
            Outcome::Failed(error) => {
                let error = CompileErrorReport::new(&report.display_path, &report.source, error);
                eprintln!("{:?}", miette::Report::new(error));
            }
            Outcome::Io(message) => {
                eprintln!("\x1b[31merror\x1b[0m: {}", message);
            }
        }
    }

    fn print_summary_human(&self, result: &RunResult) {
        eprintln!();
        if result.error_count == 0 && result.warning_count == 0 {
            eprintln!(
                "\x1b[32m✓\x1b[0m Compiled {} of {} files ({}ms)",
                result.compiled, result.file_count, result.duration_ms
            );
        } else {
            if result.error_count > 0 {
                eprintln!(
                    "\x1b[31m✗\x1b[0m Found {} error{} in {} files",
                    result.error_count,
                    if result.error_count == 1 { "" } else { "s" },
                    result.file_count
                );
            }
            if result.warning_count > 0 {
                eprintln!(
                    "\x1b[33m⚠\x1b[0m Found {} warning{}",
                    result.warning_count,
                    if result.warning_count == 1 { "" } else { "s" }
                );
            }
            eprintln!("Compiled {} files in {}ms", result.compiled, result.duration_ms);
        }
    }

    // JSON format

    fn report_json(&self, report: &FileReport) -> Vec<serde_json::Value> {
        let diagnostics = match &report.outcome {
            Outcome::Compiled { output, .. } => template_diagnostics(output),
            Outcome::Failed(error) => vec![Diagnostic::from_compile_error(error)],
            Outcome::Io(message) => {
                return vec![serde_json::json!({
                    "type": "io",
                    "file": report.display_path,
                    "severity": Severity::Error.as_str(),
                    "message": message,
                })]
            }
        };

        diagnostics
            .iter()
            .map(|diagnostic| {
                let location = diagnostic.line_col(&report.source);
                serde_json::json!({
                    "type": "sfc",
                    "file": report.display_path,
                    "severity": diagnostic.severity.as_str(),
                    "message": diagnostic.message,
                    "code": diagnostic.code.as_str(),
                    "span": diagnostic.span.map(|span| serde_json::json!({
                        "start": span.start,
                        "end": span.end
                    })),
                    "line": location.map(|lc| lc.line + 1),
                    "column": location.map(|lc| lc.col + 1),
                })
            })
            .collect()
    }
}

/// `path:line:col: warning: message`, one-based.
fn human_line(report: &FileReport, diagnostic: &Diagnostic) -> String {
    let (line, col) = diagnostic
        .line_col(&report.source)
        .map(|lc| (lc.line + 1, lc.col + 1))
        .unwrap_or((1, 1));
    let severity = match diagnostic.severity {
        Severity::Error => "\x1b[31merror\x1b[0m",
        Severity::Warning => "\x1b[33mwarning\x1b[0m",
    };
    format!(
        "{}:{}:{}: {}: {}",
        report.display_path, line, col, severity, diagnostic.message
    )
}

fn summary_json(result: &RunResult) -> serde_json::Value {
    serde_json::json!({
        "type": "summary",
        "files": result.file_count,
        "compiled": result.compiled,
        "errors": result.error_count,
        "warnings": result.warning_count,
        "duration_ms": result.duration_ms
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sfc_compiler::{compile, CompileOptions};

    fn report(source: &str) -> FileReport {
        let outcome = match compile(source, "App.vue", &CompileOptions::default()) {
            Ok(output) => Outcome::Compiled { output, written: None },
            Err(error) => Outcome::Failed(error),
        };
        FileReport {
            display_path: "App.vue".to_string(),
            source: source.to_string(),
            outcome,
        }
    }

    #[test]
    fn test_json_compile_error() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let lines = formatter.report_json(&report("<script setup>\nawait 1\n</script>\n"));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "sfc");
        assert_eq!(lines[0]["code"], "top-level-await");
        assert_eq!(lines[0]["line"], 2);
        assert_eq!(lines[0]["column"], 1);
    }

    #[test]
    fn test_json_clean_document() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let lines = formatter.report_json(&report("<template><div></div></template>\n"));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_human_line() {
        let report = report("<template><ul><Item v-for=\"x in xs\" /></ul></template>\n");
        let Outcome::Compiled { output, .. } = &report.outcome else {
            panic!("expected a compiled document");
        };
        let diagnostic = &template_diagnostics(output)[0];
        let line = human_line(&report, diagnostic);
        assert!(line.starts_with("App.vue:1:"), "{}", line);
        assert!(line.contains("warning"), "{}", line);
    }

    #[test]
    fn test_summary_json() {
        let json = summary_json(&RunResult {
            file_count: 3,
            compiled: 2,
            error_count: 1,
            warning_count: 0,
            duration_ms: 5,
        });
        assert_eq!(json["compiled"], 2);
        assert_eq!(json["errors"], 1);
    }
}
