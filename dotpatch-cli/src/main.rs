mod app;
mod commands;
mod output;
mod script;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Show dotpatch info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("dotpatch", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Run {
            script,
            output,
            section_name,
            max_stack,
            files,
        } => commands::run::run(
            script,
            commands::run::RunOptions {
                output,
                section_name: section_name.as_deref(),
                max_stack: *max_stack,
            },
            files,
            &cli.global,
        ),
        Command::Info { path } => commands::info::run(path, &cli.global),
        Command::Check { script } => commands::check::run(script, &cli.global),
    }
}
