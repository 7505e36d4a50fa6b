//! Output formatting module
//!
//! This module handles formatting synthesized models and refinement reports
//! for the different output formats.

use crate::cfsm::Cfsm;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::encode;
use crate::gfsm::Gfsm;
use crate::model::BinaryInvariant;
use crate::refine::RefineReport;
use crate::Result;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Render the CFSM in the requested format
pub fn render(
    cfsm: &Cfsm,
    format: OutputFormat,
    invariants: &[BinaryInvariant],
    report: Option<&RefineReport>,
    config: &Config,
) -> Result<String> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Scm => buf.extend(encode::to_scm(cfsm, None).into_bytes()),
        OutputFormat::Promela => {
            buf.extend(encode::to_promela(cfsm, invariants, config.checker.channel_bound).into_bytes())
        }
        OutputFormat::Dot => buf.extend(encode::cfsm_to_dot(cfsm).into_bytes()),
        OutputFormat::Json => output_json(&mut buf, cfsm, report)?,
        OutputFormat::Table => output_table(&mut buf, cfsm, report)?,
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Render the partition graph; only DOT and table make sense for it
pub fn render_gfsm(gfsm: &Gfsm, format: OutputFormat) -> String {
    match format {
        OutputFormat::Dot => encode::gfsm_to_dot(gfsm),
        _ => format!("{}\n", gfsm),
    }
}

/// Write `contents` to stdout, or to a timestamped file when an output
/// directory is configured
pub fn emit(contents: &str, format: OutputFormat, config: &Config) -> Result<Option<PathBuf>> {
    match config.output_directory() {
        Some(dir) => write_export(&dir, contents, format).map(Some),
        None => {
            print!("{}", contents);
            Ok(None)
        }
    }
}

fn write_export(dir: &Path, contents: &str, format: OutputFormat) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    // Export to {date}.cfsm.{ext}
    let filename = format!(
        "{}.cfsm.{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S"),
        format.extension()
    );
    let path = dir.join(filename);
    std::fs::write(&path, contents)?;
    tracing::info!("Model exported to {:?}", path);
    Ok(path)
}

/// Output the CFSM (and refinement report) as JSON
pub fn output_json(
    w: &mut impl std::io::Write,
    cfsm: &Cfsm,
    report: Option<&RefineReport>,
) -> Result<()> {
    let stats = cfsm.stats();
    let output = json!({
        "summary": {
            "processes": stats.processes,
            "channels": stats.channels,
            "states": stats.states,
            "transitions": stats.transitions,
        },
        "channels": cfsm.channels(),
        "automata": cfsm.fsms().iter().map(|fsm| {
            json!({
                "pid": fsm.pid(),
                "initial": fsm.initial_states(),
                "accept": fsm.accept_states(),
                "states": fsm.states().map(|s| {
                    json!({
                        "id": s.id(),
                        "transitions": s.transitions().iter().flat_map(|(event, targets)| {
                            targets.iter().map(move |t| json!({
                                "event": event.to_string(),
                                "target": t,
                            }))
                        }).collect::<Vec<_>>(),
                    })
                }).collect::<Vec<_>>(),
            })
        }).collect::<Vec<_>>(),
        "refinement": report,
    });

    serde_json::to_writer_pretty(&mut *w, &output)?;
    writeln!(w)?; // Add trailing newline
    Ok(())
}

/// Output the CFSM (and refinement report) as text table
pub fn output_table(
    w: &mut impl std::io::Write,
    cfsm: &Cfsm,
    report: Option<&RefineReport>,
) -> Result<()> {
    writeln!(w, "CFSM Inference - Results")?;
    writeln!(w, "{}", "=".repeat(80))?;
    writeln!(w)?;

    let stats = cfsm.stats();
    writeln!(w, "Summary:")?;
    writeln!(w, "  Processes:   {}", stats.processes)?;
    writeln!(w, "  Channels:    {}", stats.channels)?;
    writeln!(w, "  States:      {}", stats.states)?;
    writeln!(w, "  Transitions: {}", stats.transitions)?;
    writeln!(w)?;

    if let Some(report) = report {
        writeln!(w, "Refinement:")?;
        writeln!(w, "  Rounds:        {}", report.rounds)?;
        writeln!(w, "  Refinements:   {}", report.refinements)?;
        writeln!(w, "  Checker calls: {}", report.checker_calls)?;
        writeln!(w, "  Converged:     {}", report.converged)?;
        for inv in &report.unresolved {
            writeln!(w, "  Unresolved:    {}", inv)?;
        }
        writeln!(w)?;
    }

    writeln!(w, "{:<8} {:<8} {:<8} {:<8} {:<40}", "Process", "State", "Init", "Accept", "Transitions")?;
    writeln!(w, "{}", "-".repeat(80))?;
    for fsm in cfsm.fsms() {
        for state in fsm.states() {
            let transitions: Vec<String> = state
                .transitions()
                .iter()
                .flat_map(|(event, targets)| targets.iter().map(move |t| format!("{}->{}", event, t)))
                .collect();
            writeln!(
                w,
                "{:<8} {:<8} {:<8} {:<8} {:<40}",
                format!("p{}", fsm.pid()),
                state.id(),
                state.is_initial(),
                state.is_accept(),
                transitions.join(", ")
            )?;
        }
    }

    Ok(())
}
