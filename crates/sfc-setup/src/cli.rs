//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Compile Vue 2 single file components using `<script setup>` into plain
/// component modules
#[derive(Parser, Debug, Clone)]
#[command(name = "sfc-setup")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Files or directories to compile (defaults to the workspace)
    pub paths: Vec<PathBuf>,

    /// Workspace directory, used for config discovery and output layout
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Path to sfc-setup.json
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write compiled modules into this directory, mirroring source paths
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Print compiled modules to stdout instead of writing files
    #[arg(long, conflicts_with = "out_dir")]
    pub stdout: bool,

    /// Recompile documents when they change
    #[arg(short = 'W', long)]
    pub watch: bool,

    /// Output format for diagnostics
    #[arg(long, default_value = "human")]
    pub output: OutputFormat,

    /// Exit with a failure status when warnings are reported
    #[arg(long)]
    pub fail_on_warning: bool,

    /// Record each document path on its component as `__file`
    #[arg(long)]
    pub expose_filename: bool,

    /// Do not write source maps
    #[arg(long)]
    pub no_source_map: bool,

    /// Ignore patterns (glob)
    #[arg(long)]
    pub ignore: Vec<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with code frames
    #[default]
    Human,
    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["sfc-setup"]);
        assert!(args.paths.is_empty());
        assert_eq!(args.output, OutputFormat::Human);
        assert!(!args.stdout && !args.watch && !args.no_source_map);
    }

    #[test]
    fn test_flags() {
        let args = Args::parse_from([
            "sfc-setup",
            "src",
            "App.vue",
            "--out-dir",
            "dist",
            "--output",
            "json",
            "--expose-filename",
            "--ignore",
            "**/legacy/**",
        ]);
        assert_eq!(args.paths, vec![PathBuf::from("src"), PathBuf::from("App.vue")]);
        assert_eq!(args.out_dir, Some(PathBuf::from("dist")));
        assert_eq!(args.output, OutputFormat::Json);
        assert!(args.expose_filename);
        assert_eq!(args.ignore, vec!["**/legacy/**"]);
    }

    #[test]
    fn test_stdout_conflicts_with_out_dir() {
        assert!(Args::try_parse_from(["sfc-setup", "--stdout", "--out-dir", "dist"]).is_err());
    }
}
