//! Partitions: abstract GFSM states over sets of observations

use super::ObsNode;
use crate::model::EventType;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Index of an observation in the GFSM's observation arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObsId(pub usize);

impl fmt::Display for ObsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o{}", self.0)
    }
}

/// Index of a partition in the GFSM's partition arena. Ids are never reused,
/// so ascending id order is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub usize);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

pub type TransitionMap = BTreeMap<EventType, BTreeSet<PartitionId>>;

/// Transition function derived from member observations, stamped with the
/// partition generation it was computed at.
#[derive(Debug)]
pub(crate) struct TransitionCache {
    pub(crate) generation: Option<u64>,
    pub(crate) transitions: TransitionMap,
}

/// A non-empty set of observations treated as one abstract state.
///
/// Init/accept flags are recomputed eagerly whenever membership changes. The
/// transition function is cached and recomputed lazily by the owning GFSM
/// whenever `generation` has moved past the cache's stamp.
#[derive(Debug)]
pub struct Partition {
    id: PartitionId,
    members: BTreeSet<ObsId>,
    initial: bool,
    accept: bool,
    initial_for: Vec<bool>,
    accept_for: Vec<bool>,
    generation: u64,
    pub(crate) cache: RefCell<TransitionCache>,
}

impl Partition {
    pub(crate) fn new(
        id: PartitionId,
        members: BTreeSet<ObsId>,
        observations: &[ObsNode],
        num_processes: usize,
    ) -> Self {
        let mut part = Self {
            id,
            members,
            initial: false,
            accept: false,
            initial_for: vec![false; num_processes],
            accept_for: vec![false; num_processes],
            generation: 0,
            cache: RefCell::new(TransitionCache {
                generation: None,
                transitions: TransitionMap::new(),
            }),
        };
        part.recompute_flags(observations);
        part
    }

    fn recompute_flags(&mut self, observations: &[ObsNode]) {
        self.initial = false;
        self.accept = false;
        self.initial_for.iter_mut().for_each(|f| *f = false);
        self.accept_for.iter_mut().for_each(|f| *f = false);

        for id in &self.members {
            let obs = &observations[id.0].obs;
            self.initial |= obs.is_initial();
            self.accept |= obs.is_accept();
            for pid in 0..self.initial_for.len() {
                self.initial_for[pid] |= obs.is_initial_for(pid);
                self.accept_for[pid] |= obs.is_accept_for(pid);
            }
        }
    }

    /// Removes `extract` from this partition and marks the cached transition
    /// function stale.
    pub(crate) fn remove_members(&mut self, extract: &BTreeSet<ObsId>, observations: &[ObsNode]) {
        self.members.retain(|o| !extract.contains(o));
        self.recompute_flags(observations);
        self.invalidate();
    }

    pub(crate) fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub(crate) fn is_cache_fresh(&self) -> bool {
        self.cache.borrow().generation == Some(self.generation)
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn members(&self) -> &BTreeSet<ObsId> {
        &self.members
    }

    pub fn contains(&self, obs: ObsId) -> bool {
        self.members.contains(&obs)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// Some member observation is globally initial.
    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Some member observation is globally accepting.
    pub fn is_accept(&self) -> bool {
        self.accept
    }

    pub fn is_initial_for_process(&self, pid: usize) -> bool {
        self.initial_for.get(pid).copied().unwrap_or(false)
    }

    pub fn is_accept_for_process(&self, pid: usize) -> bool {
        self.accept_for.get(pid).copied().unwrap_or(false)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members: Vec<String> = self.members.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{}[init={}, accept={}, gen={}] {{{}}}",
            self.id,
            self.initial,
            self.accept,
            self.generation,
            members.join(", ")
        )
    }
}
