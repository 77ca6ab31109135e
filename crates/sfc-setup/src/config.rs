//! Configuration loading and management.

use crate::cli::Args;
use globset::{Glob, GlobSet, GlobSetBuilder};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Deserialize;
use sfc_compiler::{CompileOptions, ExposeFilename};
use sfc_parser::ScriptLang;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up from the workspace upwards.
pub const CONFIG_FILE: &str = "sfc-setup.json";

/// Contents of `sfc-setup.json`. Command-line flags win over these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigFile {
    /// Relative to the config file.
    pub out_dir: Option<PathBuf>,
    pub extensions: Option<Vec<String>>,
    pub ignore: Vec<String>,
    pub source_map: Option<bool>,
    pub expose_filename: Option<bool>,
}

impl ConfigFile {
    /// Find the nearest config file at or above `workspace`.
    pub fn find(workspace: &Path) -> Option<PathBuf> {
        workspace
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|path| path.is_file())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .into_diagnostic()
            .wrap_err_with(|| format!("Invalid configuration in {}", path.display()))
    }
}

/// Configuration for sfc-setup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace root directory.
    pub workspace: PathBuf,
    /// Where compiled modules go; `None` writes next to each document.
    pub out_dir: Option<PathBuf>,
    /// File extensions to process, with the leading dot.
    pub extensions: Vec<String>,
    /// Ignore patterns.
    pub ignore: GlobSet,
    pub source_map: bool,
    pub expose_filename: bool,
}

impl Config {
    /// Load configuration from CLI arguments and workspace.
    pub fn load(workspace: &Path, args: &Args) -> Result<Self> {
        let config_path = args.config.clone().or_else(|| ConfigFile::find(workspace));
        let (file, base) = match &config_path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| workspace.to_path_buf());
                (ConfigFile::load(path)?, base)
            }
            None => (ConfigFile::default(), workspace.to_path_buf()),
        };

        let mut patterns = vec![
            "**/node_modules/**".to_string(),
            "**/dist/**".to_string(),
            "**/.git/**".to_string(),
        ];
        patterns.extend(file.ignore.iter().cloned());
        patterns.extend(args.ignore.iter().cloned());

        let mut ignore = GlobSetBuilder::new();
        for pattern in &patterns {
            ignore.add(
                Glob::new(pattern)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Invalid ignore pattern `{}`", pattern))?,
            );
        }

        Ok(Self {
            workspace: workspace.to_path_buf(),
            out_dir: args
                .out_dir
                .clone()
                .or_else(|| file.out_dir.map(|dir| base.join(dir))),
            extensions: file.extensions.unwrap_or_else(|| vec![".vue".to_string()]),
            ignore: ignore.build().into_diagnostic()?,
            source_map: !args.no_source_map && file.source_map.unwrap_or(true),
            expose_filename: args.expose_filename || file.expose_filename.unwrap_or(false),
        })
    }

    /// Check if a file should be processed.
    pub fn should_process(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        if !self.extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            return false;
        }
        let relative = path.strip_prefix(&self.workspace).unwrap_or(path);
        !self.ignore.is_match(relative) && !self.ignore.is_match(path)
    }

    pub fn compile_options(&self) -> CompileOptions {
        let options = CompileOptions {
            source_map: self.source_map,
            ..Default::default()
        };
        if self.expose_filename {
            options.with_pass(ExposeFilename)
        } else {
            options
        }
    }

    /// Document path relative to the workspace, as shown in output and
    /// recorded in source maps.
    pub fn display_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.workspace).unwrap_or(path);
        relative.to_string_lossy().replace('\\', "/")
    }

    /// Where the compiled module for `path` is written: `App.vue` becomes
    /// `App.vue.js`, or `App.vue.ts` and so on after the script dialect.
    pub fn output_path(&self, path: &Path, lang: ScriptLang) -> PathBuf {
        let target = match &self.out_dir {
            Some(out_dir) => match path.strip_prefix(&self.workspace) {
                Ok(relative) => out_dir.join(relative),
                Err(_) => out_dir.join(path.file_name().unwrap_or_default()),
            },
            None => path.to_path_buf(),
        };
        let mut name = target.into_os_string();
        name.push(".");
        name.push(lang.extension());
        PathBuf::from(name)
    }
}
