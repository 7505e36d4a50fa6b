//! Observed global configurations

use crate::model::ChannelState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One process's local state inside an observation.
///
/// Local states are scoped to the trace they were observed in: two traces may
/// reuse a name without the states being related.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalState {
    pub name: String,
    #[serde(default)]
    pub initial: bool,
    #[serde(default)]
    pub accept: bool,
}

impl LocalState {
    pub fn new(name: impl Into<String>, initial: bool, accept: bool) -> Self {
        Self {
            name: name.into(),
            initial,
            accept,
        }
    }
}

/// A concrete global configuration: every process's local state plus the
/// contents of every channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Observation {
    locals: Vec<LocalState>,
    channels: ChannelState,
}

impl Observation {
    pub fn new(locals: Vec<LocalState>, channels: ChannelState) -> Self {
        Self { locals, channels }
    }

    pub fn locals(&self) -> &[LocalState] {
        &self.locals
    }

    pub fn channels(&self) -> &ChannelState {
        &self.channels
    }

    pub fn num_processes(&self) -> usize {
        self.locals.len()
    }

    /// Every process is initial and every queue is empty.
    pub fn is_initial(&self) -> bool {
        self.locals.iter().all(|l| l.initial) && self.channels.is_empty()
    }

    /// Every process is accepting and every queue is empty.
    pub fn is_accept(&self) -> bool {
        self.locals.iter().all(|l| l.accept) && self.channels.is_empty()
    }

    pub fn is_initial_for(&self, pid: usize) -> bool {
        self.locals.get(pid).is_some_and(|l| l.initial)
    }

    pub fn is_accept_for(&self, pid: usize) -> bool {
        self.locals.get(pid).is_some_and(|l| l.accept)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.locals.iter().map(|l| l.name.as_str()).collect();
        write!(f, "<{}> {}", names.join(","), self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_and_accept() {
        let obs = Observation::new(
            vec![LocalState::new("a", true, false), LocalState::new("b", true, true)],
            ChannelState::empty(1),
        );
        assert!(obs.is_initial());
        assert!(!obs.is_accept());
        assert!(obs.is_accept_for(1));
        assert!(!obs.is_accept_for(0));
        assert!(!obs.is_initial_for(2));
    }

    #[test]
    fn test_pending_messages_block_acceptance() {
        let mut channels = ChannelState::empty(1);
        channels.push(0, "m");
        let obs = Observation::new(vec![LocalState::new("a", true, true)], channels);
        assert!(!obs.is_initial());
        assert!(!obs.is_accept());
        assert_eq!(obs.to_string(), "<a> [m]");
    }
}
