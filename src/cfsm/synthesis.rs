//! GFSM to CFSM projection
//!
//! Each process gets its own automaton with one node per partition. Events
//! of other processes are silent from that process's point of view, so the
//! projection removes them like epsilon transitions: every node inherits the
//! own-process transitions and the acceptance of everything it reaches
//! silently. The result is pruned to what the initial nodes reach and then
//! minimized.

use super::state::StateId;
use super::{Cfsm, Fsm};
use crate::gfsm::{Gfsm, PartitionId};
use std::collections::{BTreeMap, BTreeSet};

impl Gfsm {
    /// Synthesizes the CFSM for the current partitioning.
    pub fn cfsm(&self) -> Cfsm {
        tracing::debug!("GFSM -> CFSM: {}", self);
        let fsms = (0..self.num_processes()).map(|pid| self.project(pid)).collect();
        Cfsm::new(self.num_processes(), self.channels().to_vec(), fsms)
    }

    /// Projects the GFSM onto process `pid`.
    ///
    /// Panics if the projection has no initial or no accepting state.
    pub fn project(&self, pid: usize) -> Fsm {
        let mut fsm = Fsm::new(pid);
        let node_of: BTreeMap<PartitionId, StateId> = self
            .partitions()
            .map(|p| (p.id(), fsm.add_state(p.is_initial_for_process(pid), false)))
            .collect();

        for origin in self.partition_ids() {
            let node = node_of[&origin];
            for g in self.non_pid_closure(pid, origin) {
                if self.part(g).is_accept() {
                    fsm.state_mut(node).set_accept();
                }
                for (event, targets) in self.transitions(g).iter() {
                    if event.pid() != pid {
                        continue;
                    }
                    for t in targets {
                        fsm.add_transition(node, event.clone(), node_of[t]);
                    }
                }
            }
        }

        let pruned = fsm.prune_unreachable();
        let merged = fsm.minimize();

        let initial = fsm.initial_states();
        let accept = fsm.accept_states();
        assert!(
            !initial.is_empty() && !accept.is_empty(),
            "projection onto process {} has {} initial and {} accepting states\n{}\n{}",
            pid,
            initial.len(),
            accept.len(),
            fsm,
            self
        );

        tracing::info!(
            "Built FSM for process {}: {} states, {} transitions ({} pruned, {} merged)",
            pid,
            fsm.num_states(),
            fsm.num_transitions(),
            pruned,
            merged
        );
        fsm
    }

    /// `origin` plus every partition reachable from it using only events of
    /// processes other than `pid`.
    fn non_pid_closure(&self, pid: usize, origin: PartitionId) -> BTreeSet<PartitionId> {
        let mut closure = BTreeSet::new();
        let mut stack = vec![origin];
        while let Some(p) = stack.pop() {
            if !closure.insert(p) {
                continue;
            }
            let next: Vec<PartitionId> = self
                .transitions(p)
                .iter()
                .filter(|(event, _)| event.pid() != pid)
                .flat_map(|(_, targets)| targets.iter().copied())
                .filter(|t| !closure.contains(t))
                .collect();
            stack.extend(next);
        }
        closure
    }
}
