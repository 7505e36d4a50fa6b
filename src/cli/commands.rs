//! CLI command implementations
//!
//! This module contains the implementation for each CLI command.

use crate::config::{PartitioningStrategy, RefinementConfig};
use crate::gfsm::Gfsm;
use crate::trace::{ObsTrace, TraceFile};
use crate::{Config, Result, cli::Cli};
use std::path::Path;

/// Load, validate and expand a trace file into observation DAGs
fn load_traces(path: &Path) -> Result<Vec<ObsTrace>> {
    tracing::info!("Loading traces from {:?}", path);
    let file = TraceFile::from_file(path)?;
    let traces = file.build()?;
    for trace in &traces {
        trace.validate()?;
    }
    tracing::info!(
        "Loaded {} traces with {} observations",
        traces.len(),
        traces.iter().map(ObsTrace::num_observations).sum::<usize>()
    );
    Ok(traces)
}

fn refinement_config(
    config: &Config,
    partitioning: Option<PartitioningStrategy>,
    strict: bool,
    seed: Option<u64>,
) -> RefinementConfig {
    let mut refinement = config.refinement.clone();
    if let Some(p) = partitioning {
        refinement.partitioning = p;
    }
    refinement.strict |= strict;
    if seed.is_some() {
        refinement.seed = seed;
    }
    refinement
}

/// Infer command implementation
pub mod infer {
    use super::*;
    use crate::checker::create_checker;
    use crate::cli::{Commands, output};
    use crate::refine::Refiner;
    use crate::trace::load_invariants;
    use std::sync::Arc;

    /// Execute the infer command
    pub async fn execute(args: Cli, mut config: Config) -> Result<()> {
        let Commands::Infer {
            traces,
            invariants,
            checker,
            format,
            partitioning,
            strict,
            seed,
            parallel,
            max_iterations,
            output: output_format,
        } = args.command
        else {
            unreachable!("infer::execute called with wrong command");
        };

        if let Some(format) = format {
            config.checker.format = format;
        }
        let mut refinement = refinement_config(&config, partitioning, strict, seed);
        if let Some(n) = parallel {
            refinement.parallelism = n.max(1);
        }
        if max_iterations.is_some() {
            refinement.max_iterations = max_iterations;
        }

        let traces = load_traces(&traces)?;
        let invariants = load_invariants(&invariants)?;
        tracing::info!("Loaded {} invariants", invariants.len());

        let checker = Arc::new(create_checker(&config, checker)?);
        let mut gfsm = Gfsm::new(&traces, &refinement)?;

        let report = Refiner::from_config(checker, &refinement)
            .run(&mut gfsm, &invariants)
            .await?;
        tracing::info!(
            "Refinement finished: {} refinements in {} rounds, converged={}",
            report.refinements,
            report.rounds,
            report.converged
        );
        for inv in &report.unresolved {
            tracing::warn!("Unresolved invariant: {}", inv);
        }

        let cfsm = gfsm.cfsm();
        let rendered = output::render(&cfsm, output_format, &invariants, Some(&report), &config)?;
        output::emit(&rendered, output_format, &config)?;
        Ok(())
    }
}

/// Export command implementation
pub mod export {
    use super::*;
    use crate::cli::{Commands, output};

    /// Execute the export command
    pub fn execute(args: Cli, config: Config) -> Result<()> {
        let Commands::Export {
            traces,
            partitioning,
            output: output_format,
            gfsm: export_gfsm,
        } = args.command
        else {
            unreachable!("export::execute called with wrong command");
        };

        let refinement = refinement_config(&config, partitioning, false, None);
        let traces = load_traces(&traces)?;
        let gfsm = Gfsm::new(&traces, &refinement)?;

        let rendered = if export_gfsm {
            output::render_gfsm(&gfsm, output_format)
        } else {
            output::render(&gfsm.cfsm(), output_format, &[], None, &config)?
        };
        output::emit(&rendered, output_format, &config)?;
        Ok(())
    }
}

/// Validate command implementation
pub mod validate {
    use super::*;
    use crate::trace::load_invariants;
    use std::path::PathBuf;

    /// Execute the validate command
    pub fn execute(traces: PathBuf, invariants: Option<PathBuf>) -> Result<()> {
        let loaded = load_traces(&traces)?;

        println!("✓ Trace file is valid: {:?}", traces);
        for (i, trace) in loaded.iter().enumerate() {
            println!(
                "  Trace {}: {} processes, {} channels, {} observations, {} transitions",
                i,
                trace.num_processes(),
                trace.channels().len(),
                trace.num_observations(),
                trace.num_transitions()
            );
        }

        if let Some(path) = invariants {
            let invs = load_invariants(&path)?;
            println!("✓ Invariant file is valid: {:?}", path);
            for inv in &invs {
                println!("  {}", inv);
            }
        }
        Ok(())
    }
}
