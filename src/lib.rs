//! CFSM model inference
//!
//! Infers a communicating finite-state machine (one automaton per process,
//! connected by FIFO channels) from observed concurrent executions, and
//! refines it with model-checker counterexamples until it satisfies the
//! temporal invariants mined from those executions.
//!
//! This library provides functionality for:
//! - Loading traces and expanding them into DAGs of global configurations
//! - Partitioning configurations into a global automaton (GFSM) and splitting partitions
//! - Projecting the GFSM onto per-process automata with bisimulation minimization
//! - Encoding CFSMs for McScM (SCM) and Spin (Promela)
//! - Driving an external model checker in a counterexample-guided loop

pub mod cfsm;
pub mod checker;
pub mod cli;
pub mod config;
pub mod encode;
pub mod error;
pub mod gfsm;
pub mod model;
pub mod refine;
pub mod trace;

pub use config::Config;
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the given log level, to stderr or to `file`
pub fn init_logging(level: &str, file: Option<&std::path::Path>) -> Result<()> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(log_file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "cfsm-infer");
    }
}
