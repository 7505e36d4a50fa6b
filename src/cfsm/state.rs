use crate::model::EventType;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type StateId = u32;

/// One node of a per-process automaton.
///
/// Targets are stored as ids into the owning [`Fsm`](super::Fsm), so the
/// transition graph may be cyclic without any node owning another.
#[derive(Debug, Clone)]
pub struct FsmState {
    id: StateId,
    pid: usize,
    initial: bool,
    accept: bool,
    transitions: BTreeMap<EventType, BTreeSet<StateId>>,
}

impl FsmState {
    pub(crate) fn new(id: StateId, pid: usize, initial: bool, accept: bool) -> Self {
        Self {
            id,
            pid,
            initial,
            accept,
            transitions: BTreeMap::new(),
        }
    }

    /// Positive, unique within the owning automaton. Used in SCM and Promela output.
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn pid(&self) -> usize {
        self.pid
    }

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    pub fn is_accept(&self) -> bool {
        self.accept
    }

    pub(crate) fn set_accept(&mut self) {
        self.accept = true;
    }

    pub fn transitions(&self) -> &BTreeMap<EventType, BTreeSet<StateId>> {
        &self.transitions
    }

    pub fn transitioning_events(&self) -> impl Iterator<Item = &EventType> + '_ {
        self.transitions.keys()
    }

    pub fn next_states(&self, event: &EventType) -> Option<&BTreeSet<StateId>> {
        self.transitions.get(event)
    }

    /// Number of (event, target) pairs.
    pub fn num_transitions(&self) -> usize {
        self.transitions.values().map(BTreeSet::len).sum()
    }

    pub fn is_sink(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Adds a transition on one of this process's own events.
    pub fn add_transition(&mut self, event: EventType, target: StateId) {
        assert_eq!(
            event.pid(),
            self.pid,
            "event {} does not belong to process {}",
            event,
            self.pid
        );
        self.transitions.entry(event).or_default().insert(target);
    }

    /// Adds a transition on a synthetic invariant-channel send, which may be
    /// attributed to any process.
    pub fn add_synth_transition(&mut self, event: EventType, target: StateId) {
        assert!(event.is_synth_send(), "{} is not a synthetic send", event);
        self.transitions.entry(event).or_default().insert(target);
    }

    pub fn rm_transition(&mut self, event: &EventType, target: StateId) {
        let Some(targets) = self.transitions.get_mut(event) else {
            panic!("state {} has no transition on {}", self.id, event);
        };
        assert!(
            targets.remove(&target),
            "state {} has no transition on {} to {}",
            self.id,
            event,
            target
        );
        if targets.is_empty() {
            self.transitions.remove(event);
        }
    }

    /// Points every transition into `from` at `to` instead.
    pub(crate) fn redirect(&mut self, from: StateId, to: StateId) {
        for targets in self.transitions.values_mut() {
            if targets.remove(&from) {
                targets.insert(to);
            }
        }
    }

    pub(crate) fn signature(&self) -> (bool, bool, &BTreeMap<EventType, BTreeSet<StateId>>) {
        (self.initial, self.accept, &self.transitions)
    }
}

// Identity is by id and flags only. Comparing transitions would recurse
// through the cyclic graph.
impl PartialEq for FsmState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.pid == other.pid
            && self.initial == other.initial
            && self.accept == other.accept
    }
}

impl Eq for FsmState {}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FSM_state: init[{}], accept[{}] id[{}]",
            self.initial, self.accept, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelId;

    #[test]
    fn test_transitions_are_sets() {
        let ch = ChannelId::new(0, 1, 0);
        let mut s = FsmState::new(1, 0, true, false);
        s.add_transition(EventType::send("m", ch), 2);
        s.add_transition(EventType::send("m", ch), 2);
        s.add_transition(EventType::send("m", ch), 3);
        assert_eq!(s.num_transitions(), 2);

        s.rm_transition(&EventType::send("m", ch), 2);
        s.rm_transition(&EventType::send("m", ch), 3);
        assert!(s.is_sink());
    }

    #[test]
    #[should_panic(expected = "does not belong to process")]
    fn test_rejects_foreign_event() {
        let ch = ChannelId::new(0, 1, 0);
        let mut s = FsmState::new(1, 0, true, false);
        s.add_transition(EventType::recv("m", ch), 2);
    }

    #[test]
    fn test_synthetic_transition_bypasses_pid() {
        let inv = ChannelId::synthetic(1, 1, 1);
        let mut s = FsmState::new(1, 0, true, false);
        s.add_synth_transition(EventType::synth_send("tok", inv, 1), 2);
        assert_eq!(s.num_transitions(), 1);
    }

    #[test]
    fn test_equality_ignores_transitions() {
        let ch = ChannelId::new(0, 1, 0);
        let a = FsmState::new(1, 0, true, false);
        let mut b = FsmState::new(1, 0, true, false);
        b.add_transition(EventType::send("m", ch), 1);
        assert_eq!(a, b);
        assert_ne!(a, FsmState::new(2, 0, true, false));
    }
}
