use std::path::{Path, PathBuf};

use dotpatch::{
    patch::{Batch, PatchConfig, RefOpcode},
    Error,
};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_script,
    output::{print_output, Align, TabWriter},
    script::{Script, Site, Step},
};

/// Output settings of a `run`.
pub struct RunOptions<'a> {
    pub output: &'a Path,
    pub section_name: Option<&'a str>,
    pub max_stack: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub output_dir: String,
    pub files: Vec<FileReport>,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub applied: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

pub fn run(
    script_path: &Path,
    options: RunOptions,
    files: &[PathBuf],
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let script = load_script(script_path)?;
    log::debug!("{} script steps", script.len());

    let mut config = PatchConfig::new(options.output);
    if let Some(name) = options.section_name {
        config.section_name = name.to_string();
    }
    if let Some(depth) = options.max_stack {
        config.promoted_max_stack = depth;
    }

    let mut batch = Batch::new(config);
    batch.begin(files.len());
    let reports: Vec<FileReport> = files
        .iter()
        .map(|file| {
            let report = run_file(&mut batch, file, &script);
            batch.end_file(file);
            report
        })
        .collect();
    let diagnostics = batch.end();

    let report = RunReport {
        output_dir: options.output.display().to_string(),
        files: reports,
        diagnostics: diagnostics.iter().map(ToString::to_string).collect(),
    };

    print_output(&report, opts, |report| {
        let mut tw = TabWriter::new(vec![
            ("File", Align::Left),
            ("Output", Align::Left),
            ("Applied", Align::Right),
            ("Failed", Align::Right),
            ("Status", Align::Left),
        ]);
        for file in &report.files {
            tw.row(vec![
                file.file.clone(),
                file.output.clone().unwrap_or_else(|| "-".to_string()),
                file.applied.to_string(),
                file.failed.to_string(),
                file.aborted
                    .as_ref()
                    .map_or_else(|| "ok".to_string(), |reason| format!("aborted: {reason}")),
            ]);
        }
        tw.print();

        if !report.diagnostics.is_empty() {
            println!();
            println!("Diagnostics:");
            for diagnostic in &report.diagnostics {
                println!("  {diagnostic}");
            }
        }
    })
}

/// Runs every script step against `file`. Lookup misses and capacity overflows skip the step,
/// any other failure abandons the rest of the script for this file.
fn run_file(batch: &mut Batch, file: &Path, script: &Script) -> FileReport {
    let mut report = FileReport {
        file: file.display().to_string(),
        output: None,
        applied: 0,
        failed: 0,
        aborted: None,
    };

    if let Err(error) = batch.begin_file(file) {
        log::error!("{}: {}", file.display(), error);
        report.aborted = Some(error.to_string());
        return report;
    }
    report.output = batch
        .session(file)
        .map(|session| session.output().display().to_string());

    for (line, step) in script.steps() {
        match apply(batch, file, step) {
            Ok(()) => report.applied += 1,
            Err(error @ (Error::LookupFailed(_) | Error::BufferOverflow { .. })) => {
                log::warn!("{}:{}: {}", file.display(), line, error);
                report.failed += 1;
            }
            Err(error) => {
                log::error!("{}:{}: {}", file.display(), line, error);
                report.failed += 1;
                report.aborted = Some(format!("line {line}: {error}"));
                break;
            }
        }
    }
    report
}

fn apply(batch: &mut Batch, file: &Path, step: &Step) -> dotpatch::Result<()> {
    match step {
        Step::BeginReplace => batch.begin_replace(file),
        Step::Replace { source, target } => {
            let count = batch.replace(file, source, target)?;
            log::info!("{source} -> {target}: {count} methods redirected");
            Ok(())
        }
        Step::EndReplace => batch.end_replace(file),
        Step::BeginExtend { size } => {
            let section = batch.begin_extend(file, *size)?;
            log::debug!(
                "{} at 0x{:08X}, 0x{:X} bytes",
                section.name(),
                section.virtual_address,
                section.size_of_raw_data
            );
            Ok(())
        }
        Step::Extend {
            type_name,
            method,
            insert,
        } => batch
            .extend(file, type_name, method, *insert)
            .map(|rva| log::info!("{type_name}::{method} moved to 0x{rva:08X}")),
        Step::EndExtend => batch.end_extend(file).map(|saved| {
            if !saved {
                log::info!("{}: nothing extended", file.display());
            }
        }),
        Step::BeginModify => batch.begin_modify(file),
        Step::WriteLoadArg { site, index } => {
            let Site {
                type_name,
                method,
                position,
            } = site;
            written(batch.write_load_arg(file, type_name, method, *position, *index))
        }
        Step::WriteLoadLocal { site, index } => {
            let Site {
                type_name,
                method,
                position,
            } = site;
            written(batch.write_load_local(file, type_name, method, *position, *index))
        }
        Step::WriteReference {
            site,
            opcode,
            target_type,
            member,
        } => {
            let Site {
                type_name,
                method,
                position,
            } = site;
            let result = match opcode {
                RefOpcode::Ldfld => {
                    batch.write_load_field(file, type_name, method, *position, target_type, member)
                }
                RefOpcode::Ldsfld => batch.write_load_static_field(
                    file,
                    type_name,
                    method,
                    *position,
                    target_type,
                    member,
                ),
                RefOpcode::Call => {
                    batch.write_call(file, type_name, method, *position, target_type, member)
                }
                RefOpcode::Callvirt => {
                    batch.write_call_virt(file, type_name, method, *position, target_type, member)
                }
            };
            written(result)
        }
        Step::WriteNops { site, count } => {
            let Site {
                type_name,
                method,
                position,
            } = site;
            written(batch.write_nops(file, type_name, method, *position, *count))
        }
        Step::WriteBytes { site, bytes } => {
            let Site {
                type_name,
                method,
                position,
            } = site;
            written(batch.write_bytes(file, type_name, method, *position, bytes))
        }
        Step::EndModify => batch.end_modify(file),
        Step::Log(message) => {
            log::info!("{message}");
            batch.log(message.clone());
            Ok(())
        }
    }
}

fn written(result: dotpatch::Result<usize>) -> dotpatch::Result<()> {
    result.map(|bodies| log::debug!("patched {bodies} bodies"))
}
