use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dotpatch - binary patching of .NET assemblies
#[derive(Debug, Parser)]
#[command(name = "dotpatch", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply a patch script to one or more assemblies, writing patched copies to the output directory.
    Run {
        /// Patch script, one command per line.
        #[arg(short, long, value_name = "SCRIPT")]
        script: PathBuf,

        /// Directory receiving the patched copies.
        #[arg(short, long, value_name = "DIR", default_value = "patched")]
        output: PathBuf,

        /// Name of the section injected by `beginextend` (at most 8 bytes).
        #[arg(long, value_name = "NAME")]
        section_name: Option<String>,

        /// Max stack written when a compact body is promoted to an extended one.
        #[arg(long, value_name = "DEPTH")]
        max_stack: Option<u16>,

        /// Assemblies to patch.
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Display the PE sections, metadata streams and table row counts of an assembly.
    Info {
        /// Path to the .NET assembly file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Check a patch script for syntax errors without touching any file.
    Check {
        /// Patch script, one command per line.
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
    },
}
