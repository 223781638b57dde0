use std::path::Path;

use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_script,
    output::print_output,
    script::{Script, Step},
};

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub script: String,
    pub steps: usize,
    pub replace_blocks: usize,
    pub extend_blocks: usize,
    pub modify_blocks: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let script = load_script(path)?;
    let report = summarize(path, &script);

    print_output(&report, opts, |report| {
        println!("{}: {} steps", report.script, report.steps);
        println!(
            "  {} replace, {} extend, {} modify blocks",
            report.replace_blocks, report.extend_blocks, report.modify_blocks
        );
        for warning in &report.warnings {
            println!("  warning: {warning}");
        }
    })
}

/// Counts the mode blocks of `script` and flags commands outside of their block.
fn summarize(path: &Path, script: &Script) -> CheckReport {
    let mut report = CheckReport {
        script: path.display().to_string(),
        steps: script.len(),
        replace_blocks: 0,
        extend_blocks: 0,
        modify_blocks: 0,
        warnings: Vec::new(),
    };
    if script.is_empty() {
        report.warnings.push("script has no commands".to_string());
    }

    let mut open: Option<(&str, usize)> = None;
    for (line, step) in script.steps() {
        let (block, expected) = match step {
            Step::BeginReplace => (Some("replace"), None),
            Step::BeginExtend { .. } => (Some("extend"), None),
            Step::BeginModify => (Some("modify"), None),
            Step::Replace { .. } | Step::EndReplace => (None, Some("replace")),
            Step::Extend { .. } | Step::EndExtend => (None, Some("extend")),
            Step::Log(_) => (None, None),
            _ => (None, Some("modify")),
        };

        if let Some(block) = block {
            if let Some((current, started)) = open {
                report.warnings.push(format!(
                    "line {line}: {block} block opened while the {current} block of line \
                     {started} is still open"
                ));
            }
            match block {
                "replace" => report.replace_blocks += 1,
                "extend" => report.extend_blocks += 1,
                _ => report.modify_blocks += 1,
            }
            open = Some((block, *line));
            continue;
        }

        if let Some(expected) = expected {
            if open.map(|(current, _)| current) != Some(expected) {
                report
                    .warnings
                    .push(format!("line {line}: command outside of a {expected} block"));
            }
        }
        if matches!(step, Step::EndReplace | Step::EndExtend | Step::EndModify) {
            open = None;
        }
    }

    if let Some((current, started)) = open {
        report
            .warnings
            .push(format!("line {started}: {current} block is never closed"));
    }
    report
}
