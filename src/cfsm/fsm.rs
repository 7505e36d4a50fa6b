//! Per-process automata

use super::state::{FsmState, StateId};
use crate::model::EventType;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// One process's automaton. States are keyed by id, so every traversal and
/// every serialization visits them in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fsm {
    pid: usize,
    states: BTreeMap<StateId, FsmState>,
    next_id: StateId,
}

impl Fsm {
    pub fn new(pid: usize) -> Self {
        Self {
            pid,
            states: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn pid(&self) -> usize {
        self.pid
    }

    pub fn add_state(&mut self, initial: bool, accept: bool) -> StateId {
        let id = self.next_id;
        self.next_id += 1;
        self.states.insert(id, FsmState::new(id, self.pid, initial, accept));
        id
    }

    pub fn state(&self, id: StateId) -> Option<&FsmState> {
        self.states.get(&id)
    }

    pub fn states(&self) -> impl Iterator<Item = &FsmState> + '_ {
        self.states.values()
    }

    pub(crate) fn state_mut(&mut self, id: StateId) -> &mut FsmState {
        match self.states.get_mut(&id) {
            Some(s) => s,
            None => panic!("process {} has no state {}", self.pid, id),
        }
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.states.values().map(FsmState::num_transitions).sum()
    }

    pub fn add_transition(&mut self, from: StateId, event: EventType, to: StateId) {
        assert!(self.states.contains_key(&to), "process {} has no state {}", self.pid, to);
        self.state_mut(from).add_transition(event, to);
    }

    pub fn add_synth_transition(&mut self, from: StateId, event: EventType, to: StateId) {
        assert!(self.states.contains_key(&to), "process {} has no state {}", self.pid, to);
        self.state_mut(from).add_synth_transition(event, to);
    }

    pub fn rm_transition(&mut self, from: StateId, event: &EventType, to: StateId) {
        self.state_mut(from).rm_transition(event, to);
    }

    pub fn initial_states(&self) -> Vec<StateId> {
        self.states.values().filter(|s| s.is_initial()).map(FsmState::id).collect()
    }

    pub fn accept_states(&self) -> Vec<StateId> {
        self.states.values().filter(|s| s.is_accept()).map(FsmState::id).collect()
    }

    /// Every event type some transition is labelled with.
    pub fn alphabet(&self) -> BTreeSet<EventType> {
        self.states
            .values()
            .flat_map(|s| s.transitioning_events().cloned())
            .collect()
    }

    /// Removes every state that no initial state reaches. Initial states are
    /// always kept. Returns the number of states removed.
    pub fn prune_unreachable(&mut self) -> usize {
        let mut reached: BTreeSet<StateId> = BTreeSet::new();
        let mut stack = self.initial_states();
        while let Some(id) = stack.pop() {
            if !reached.insert(id) {
                continue;
            }
            if let Some(state) = self.states.get(&id) {
                stack.extend(state.transitions().values().flatten().filter(|t| !reached.contains(t)));
            }
        }

        let before = self.states.len();
        self.states.retain(|id, _| reached.contains(id));
        let removed = before - self.states.len();
        if removed > 0 {
            // Unreached states may only point at reached ones, never the
            // other way round, so no dangling targets remain.
            tracing::debug!("Pruned {} unreachable states from process {}", removed, self.pid);
        }
        removed
    }

    /// Merges states with identical (initial, accept, transitions) signature
    /// until none remain. The lower id survives each merge and every
    /// transition into the removed state is redirected to it. Returns the
    /// number of merges.
    pub fn minimize(&mut self) -> usize {
        let mut merges = 0;
        while let Some((keep, remove)) = self.find_equivalent_pair() {
            self.states.remove(&remove);
            for state in self.states.values_mut() {
                state.redirect(remove, keep);
            }
            merges += 1;
        }
        if merges > 0 {
            tracing::debug!("Merged {} bisimilar states in process {}", merges, self.pid);
        }
        merges
    }

    fn find_equivalent_pair(&self) -> Option<(StateId, StateId)> {
        let mut seen = HashMap::new();
        for state in self.states.values() {
            if let Some(&first) = seen.get(&state.signature()) {
                return Some((first, state.id()));
            }
            seen.insert(state.signature(), state.id());
        }
        None
    }
}

impl fmt::Display for Fsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FSM[pid={}, states={}]", self.pid, self.states.len())?;
        for state in self.states.values() {
            writeln!(f, "  {}", state)?;
            for (event, targets) in state.transitions() {
                for t in targets {
                    writeln!(f, "    --{}--> {}", event, t)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelId;

    /// 1 --m--> 2 --a--> 4 (accept)
    ///   --m--> 3 --a--> 4
    fn diamond() -> (Fsm, EventType, EventType) {
        let ch = ChannelId::new(0, 1, 0);
        let m = EventType::send("m", ch);
        let a = EventType::local("a", 0);
        let mut fsm = Fsm::new(0);
        let s1 = fsm.add_state(true, false);
        let s2 = fsm.add_state(false, false);
        let s3 = fsm.add_state(false, false);
        let s4 = fsm.add_state(false, true);
        fsm.add_transition(s1, m.clone(), s2);
        fsm.add_transition(s1, m.clone(), s3);
        fsm.add_transition(s2, a.clone(), s4);
        fsm.add_transition(s3, a.clone(), s4);
        (fsm, m, a)
    }

    #[test]
    fn test_ids_start_at_one() {
        let mut fsm = Fsm::new(0);
        assert_eq!(fsm.add_state(true, false), 1);
        assert_eq!(fsm.add_state(false, true), 2);
    }

    #[test]
    fn test_minimize_merges_duplicate_branches() {
        let (mut fsm, m, _) = diamond();
        assert_eq!(fsm.minimize(), 1);
        assert_eq!(fsm.num_states(), 3);
        assert_eq!(fsm.state(1).unwrap().next_states(&m), Some(&BTreeSet::from([2])));
        assert!(fsm.state(3).is_none());
    }

    #[test]
    fn test_minimize_is_idempotent() {
        let (mut once, _, _) = diamond();
        once.minimize();
        let mut twice = once.clone();
        assert_eq!(twice.minimize(), 0);
        assert_eq!(once, twice);
        assert_eq!(once.to_string(), twice.to_string());
    }

    #[test]
    fn test_minimized_signatures_are_unique() {
        let (mut fsm, _, _) = diamond();
        fsm.minimize();
        let states: Vec<&FsmState> = fsm.states().collect();
        for (i, a) in states.iter().enumerate() {
            for b in &states[i + 1..] {
                assert_ne!(a.signature(), b.signature());
            }
        }
    }

    #[test]
    fn test_prune_keeps_initial_states() {
        let (mut fsm, _, a) = diamond();
        let orphan = fsm.add_state(false, true);
        let lonely_initial = fsm.add_state(true, false);
        fsm.add_transition(orphan, a, 4);

        assert_eq!(fsm.prune_unreachable(), 1);
        assert!(fsm.state(orphan).is_none());
        assert!(fsm.state(lonely_initial).is_some());
        assert_eq!(fsm.initial_states(), vec![1, lonely_initial]);
        assert_eq!(fsm.accept_states(), vec![4]);
    }
}
