//! Model checker abstraction
//!
//! This module provides a trait-based abstraction over the external model
//! checker. The refinement loop only ever sees the ternary outcome of a check;
//! process handling, encodings and timeouts are the implementation's concern.
//! - `CommandChecker`: runs a wrapper executable around McScM or Spin
//! - `ScriptedChecker`: replays canned outcomes, for tests

use crate::cfsm::Cfsm;
use crate::model::{BinaryInvariant, EventType};
use crate::{Config, Result};
use async_trait::async_trait;

pub mod command;
pub mod scripted;

pub use command::{CheckerReply, CommandChecker};
pub use scripted::ScriptedChecker;

/// Result of checking one invariant against one CFSM
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McOutcome {
    /// The invariant holds in the model
    Verified,
    /// An execution of the model that violates the invariant
    Counterexample(Vec<EventType>),
    /// The checker gave up, e.g. on a timeout. No refinement follows.
    Inconclusive,
}

#[async_trait]
pub trait ModelChecker: Send + Sync {
    /// Checks `invariant` against `cfsm`. A malformed model surfaces as
    /// [`Error::CheckerSyntax`](crate::Error::CheckerSyntax).
    async fn check(&self, cfsm: &Cfsm, invariant: &BinaryInvariant) -> Result<McOutcome>;
}

/// Create the configured command checker, with `command` overriding the config
pub fn create_checker(config: &Config, command: Option<std::path::PathBuf>) -> Result<CommandChecker> {
    let command = match command {
        Some(c) => c,
        None => config.checker_command()?,
    };
    Ok(CommandChecker::new(command)
        .with_args(config.checker.args.clone())
        .with_format(config.checker.format)
        .with_timeout(config.checker.timeout())
        .with_channel_bound(config.checker.channel_bound))
}
