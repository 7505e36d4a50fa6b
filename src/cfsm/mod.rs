//! Communicating finite-state machines
//!
//! A CFSM is one automaton per process plus the FIFO channels between them.
//! It is always derived from the GFSM and thrown away after it has been
//! encoded for the model checker.

use crate::model::{BinaryInvariant, ChannelId, EventType};
use std::collections::BTreeSet;
use std::fmt;

pub mod fsm;
pub mod state;
pub mod synthesis;

pub use fsm::Fsm;
pub use state::{FsmState, StateId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cfsm {
    num_processes: usize,
    channels: Vec<ChannelId>,
    fsms: Vec<Fsm>,
}

impl Cfsm {
    pub fn new(num_processes: usize, channels: Vec<ChannelId>, fsms: Vec<Fsm>) -> Self {
        assert_eq!(fsms.len(), num_processes, "one automaton per process is required");
        Self {
            num_processes,
            channels,
            fsms,
        }
    }

    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    /// Channels in index order, including synthetic invariant channels.
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn fsms(&self) -> &[Fsm] {
        &self.fsms
    }

    pub fn fsm(&self, pid: usize) -> Option<&Fsm> {
        self.fsms.get(pid)
    }

    /// Index of the extra channel local events are written to in SCM output.
    pub fn local_events_channel(&self) -> usize {
        self.channels.len()
    }

    /// The channel added by [`Cfsm::augment_with_invariant`], if any.
    pub fn invariant_channel(&self) -> Option<ChannelId> {
        self.channels.iter().copied().find(|c| c.synthetic)
    }

    pub fn alphabet(&self) -> BTreeSet<EventType> {
        self.fsms.iter().flat_map(Fsm::alphabet).collect()
    }

    pub fn stats(&self) -> CfsmStats {
        CfsmStats {
            processes: self.num_processes,
            channels: self.channels.len(),
            states: self.fsms.iter().map(Fsm::num_states).sum(),
            transitions: self.fsms.iter().map(Fsm::num_transitions).sum(),
        }
    }

    /// Copy of this CFSM that records the invariant's events on a synthetic
    /// channel: every transition `s --e--> t` on an invariant event becomes
    /// `s --e--> m --!e--> t` through a fresh intermediate state `m`.
    pub fn augment_with_invariant(&self, invariant: &BinaryInvariant) -> Cfsm {
        let owner = invariant.first().pid();
        let channel = ChannelId::synthetic(owner, owner, self.channels.len());
        let mut channels = self.channels.clone();
        channels.push(channel);

        let mut fsms = self.fsms.clone();
        for fsm in &mut fsms {
            let rewrites: Vec<(StateId, EventType, StateId)> = fsm
                .states()
                .flat_map(|s| {
                    s.transitions()
                        .iter()
                        .filter(move |(e, _)| invariant.involves(e))
                        .flat_map(move |(e, targets)| targets.iter().map(move |t| (s.id(), e.clone(), *t)))
                })
                .collect();

            for (from, event, to) in rewrites {
                let mid = fsm.add_state(false, false);
                fsm.rm_transition(from, &event, to);
                fsm.add_transition(from, event.clone(), mid);
                let synth = EventType::synth_send(event.token(), channel, fsm.pid());
                fsm.add_synth_transition(mid, synth, to);
            }
        }

        Cfsm {
            num_processes: self.num_processes,
            channels,
            fsms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfsmStats {
    pub processes: usize,
    pub channels: usize,
    pub states: usize,
    pub transitions: usize,
}

impl fmt::Display for Cfsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels: Vec<String> = self.channels.iter().map(ToString::to_string).collect();
        writeln!(f, "CFSM[processes={}, channels=[{}]]", self.num_processes, channels.join(", "))?;
        for fsm in &self.fsms {
            write!(f, "{}", fsm)?;
        }
        Ok(())
    }
}
