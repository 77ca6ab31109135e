//! sfc-setup - compiles Vue 2 `<script setup>` components.

use clap::Parser;
use miette::Result;
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;
mod config;
mod orchestrator;
mod output;

use cli::Args;
use orchestrator::Orchestrator;

fn main() -> ExitCode {
    let args = Args::parse();

    // Set up miette for nice error output
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(args) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let workspace = args
        .workspace
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let watch = args.watch;
    let fail_on_warning = args.fail_on_warning;
    let orchestrator = Orchestrator::new(workspace, args)?;

    if watch {
        orchestrator.run_watch()?;
        return Ok(ExitCode::SUCCESS);
    }

    let result = orchestrator.run_once()?;
    if result.error_count > 0 || (fail_on_warning && result.warning_count > 0) {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
