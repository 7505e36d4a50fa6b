//! The partition automaton (GFSM)
//!
//! A GFSM groups the observed global configurations of all traces into
//! partitions. Each partition is one abstract state; its transitions are the
//! union of its members' concrete transitions. The CFSM handed to the model
//! checker is a per-process projection of this automaton, and refinement
//! splits partitions until the projection satisfies every invariant.
//!
//! The GFSM exclusively owns every observation and partition. Observations
//! and partitions are addressed by [`ObsId`] and [`PartitionId`] indices; the
//! observation-to-partition mapping is a plain index table. Nothing here is
//! reentrant: all mutation happens through `&mut self`, one step at a time.

use crate::config::{PartitioningStrategy, RefinementConfig};
use crate::model::{ChannelId, EventType};
use crate::trace::{LocalState, ObsTrace, Observation};
use crate::{Error, Result};
use petgraph::graph::NodeIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Ref;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

pub mod cexample;
pub mod partition;
pub mod search;

pub use cexample::{CompleteCExample, PartialCExample, Resolution, Split};
pub use partition::{ObsId, Partition, PartitionId, TransitionMap};

/// An observation together with its position in the trace DAG.
#[derive(Debug)]
pub(crate) struct ObsNode {
    pub(crate) trace: usize,
    pub(crate) obs: Observation,
    pub(crate) next: Vec<(EventType, ObsId)>,
    pub(crate) prev: Vec<ObsId>,
}

#[derive(Debug)]
pub struct Gfsm {
    num_processes: usize,
    channels: Vec<ChannelId>,
    observations: Vec<ObsNode>,
    /// Observation -> owning partition. `None` only after `remove_partition`.
    parent: Vec<Option<PartitionId>>,
    /// Partition arena. Removed partitions leave a `None` slot so ids stay stable.
    partitions: Vec<Option<Partition>>,
    strict: bool,
    /// Placement of observations a split leaves unclassified.
    rng: StdRng,
}

impl Gfsm {
    /// Builds the initial partitioning of the observations in `traces`.
    pub fn new(traces: &[ObsTrace], config: &RefinementConfig) -> Result<Self> {
        let first = traces
            .first()
            .ok_or_else(|| Error::trace("at least one trace is required"))?;
        let num_processes = first.num_processes();
        let channels = first.channels().to_vec();

        let mut observations: Vec<ObsNode> = Vec::new();
        let mut roots = Vec::with_capacity(traces.len());
        for (t, trace) in traces.iter().enumerate() {
            if trace.num_processes() != num_processes || trace.channels() != channels.as_slice() {
                return Err(Error::trace(format!(
                    "trace {} does not share the process/channel topology of trace 0",
                    t
                )));
            }

            let offset = observations.len();
            let mut ids: HashMap<NodeIndex, ObsId> = HashMap::new();
            for (i, (node, obs)) in trace.observations().enumerate() {
                ids.insert(node, ObsId(offset + i));
                observations.push(ObsNode {
                    trace: t,
                    obs: obs.clone(),
                    next: Vec::new(),
                    prev: Vec::new(),
                });
            }
            for (node, _) in trace.observations() {
                let from = ids[&node];
                for (event, target) in trace.transitions(node) {
                    let to = ids[&target];
                    observations[from.0].next.push((event, to));
                    observations[to.0].prev.push(from);
                }
            }
            roots.push(ids[&trace.init()]);
        }

        let order = Self::traversal_order(&observations, &roots);
        let buckets = match config.partitioning {
            PartitioningStrategy::TopOfQueue => Self::bucket_by_queue_tops(&observations, &order),
            PartitioningStrategy::Singleton => order.iter().map(|&o| BTreeSet::from([o])).collect(),
        };

        let mut parent = vec![None; observations.len()];
        let mut partitions = Vec::with_capacity(buckets.len());
        for (i, members) in buckets.into_iter().enumerate() {
            let id = PartitionId(i);
            for o in &members {
                parent[o.0] = Some(id);
            }
            partitions.push(Some(Partition::new(id, members, &observations, num_processes)));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let gfsm = Self {
            num_processes,
            channels,
            observations,
            parent,
            partitions,
            strict: config.strict,
            rng,
        };

        tracing::info!(
            "Built GFSM with {} partitions over {} observations from {} traces",
            gfsm.num_partitions(),
            gfsm.num_observations(),
            traces.len()
        );

        if gfsm.strict {
            gfsm.check_partitioning_consistency((0..gfsm.observations.len()).map(ObsId));
        }
        Ok(gfsm)
    }

    /// Depth-first order from every trace root, followed by anything the
    /// roots do not reach so that every observation gets a partition.
    fn traversal_order(observations: &[ObsNode], roots: &[ObsId]) -> Vec<ObsId> {
        let mut visited = vec![false; observations.len()];
        let mut order = Vec::with_capacity(observations.len());
        for &root in roots {
            let mut stack = vec![root];
            while let Some(o) = stack.pop() {
                if std::mem::replace(&mut visited[o.0], true) {
                    continue;
                }
                order.push(o);
                for (_, next) in observations[o.0].next.iter().rev() {
                    if !visited[next.0] {
                        stack.push(*next);
                    }
                }
            }
        }
        order.extend((0..observations.len()).filter(|&i| !visited[i]).map(ObsId));
        order
    }

    /// Groups observations by their next-unconsumed message on every channel.
    fn bucket_by_queue_tops(observations: &[ObsNode], order: &[ObsId]) -> Vec<BTreeSet<ObsId>> {
        let mut index: HashMap<Vec<Option<String>>, usize> = HashMap::new();
        let mut buckets: Vec<BTreeSet<ObsId>> = Vec::new();
        for &o in order {
            let key = observations[o.0].obs.channels().top_of_queues();
            let slot = *index.entry(key).or_insert_with(|| {
                buckets.push(BTreeSet::new());
                buckets.len() - 1
            });
            buckets[slot].insert(o);
        }
        buckets
    }

    // Accessors

    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn num_observations(&self) -> usize {
        self.observations.len()
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.iter().flatten().count()
    }

    pub fn observation(&self, id: ObsId) -> Option<&Observation> {
        self.observations.get(id.0).map(|n| &n.obs)
    }

    /// Concrete transitions out of an observation.
    pub fn observation_transitions(&self, id: ObsId) -> &[(EventType, ObsId)] {
        self.observations
            .get(id.0)
            .map(|n| n.next.as_slice())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, id: ObsId) -> Option<PartitionId> {
        self.parent.get(id.0).copied().flatten()
    }

    pub fn partition(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions.get(id.0).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: PartitionId) -> bool {
        self.partition(id).is_some()
    }

    /// Live partitions in ascending id order.
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> + '_ {
        self.partitions.iter().flatten()
    }

    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.partitions().map(Partition::id).collect()
    }

    pub fn initial_partitions(&self) -> Vec<PartitionId> {
        self.partitions().filter(|p| p.is_initial()).map(Partition::id).collect()
    }

    pub fn accept_partitions(&self) -> Vec<PartitionId> {
        self.partitions().filter(|p| p.is_accept()).map(Partition::id).collect()
    }

    pub fn initial_partitions_for(&self, pid: usize) -> Vec<PartitionId> {
        self.partitions()
            .filter(|p| p.is_initial_for_process(pid))
            .map(Partition::id)
            .collect()
    }

    pub fn accept_partitions_for(&self, pid: usize) -> Vec<PartitionId> {
        self.partitions()
            .filter(|p| p.is_accept_for_process(pid))
            .map(Partition::id)
            .collect()
    }

    /// Every partition holds exactly one observation; no split is possible.
    pub fn is_singleton(&self) -> bool {
        self.partitions().all(Partition::is_singleton)
    }

    pub(crate) fn part(&self, id: PartitionId) -> &Partition {
        match self.partition(id) {
            Some(p) => p,
            None => panic!("{} is not a partition of this GFSM", id),
        }
    }

    // Transition function

    /// The partition's transition function, recomputed first if membership
    /// of it or of a successor changed since it was last read.
    pub fn transitions(&self, id: PartitionId) -> Ref<'_, TransitionMap> {
        let part = self.part(id);
        if !part.is_cache_fresh() {
            let transitions = self.compute_transitions(part);
            let mut cache = part.cache.borrow_mut();
            cache.generation = Some(part.generation());
            cache.transitions = transitions;
        }
        Ref::map(part.cache.borrow(), |c| &c.transitions)
    }

    fn compute_transitions(&self, part: &Partition) -> TransitionMap {
        let mut map = TransitionMap::new();
        for o in part.members() {
            for (event, next) in &self.observations[o.0].next {
                if let Some(target) = self.parent[next.0] {
                    map.entry(event.clone()).or_default().insert(target);
                }
            }
        }
        map
    }

    pub fn transitioning_events(&self, id: PartitionId) -> Vec<EventType> {
        self.transitions(id).keys().cloned().collect()
    }

    pub fn next_partitions(&self, id: PartitionId, event: &EventType) -> BTreeSet<PartitionId> {
        self.transitions(id).get(event).cloned().unwrap_or_default()
    }

    /// Partitions with a member observation that has a transition into `id`.
    fn predecessors(&self, id: PartitionId) -> BTreeSet<PartitionId> {
        self.part(id)
            .members()
            .iter()
            .flat_map(|o| self.observations[o.0].prev.iter())
            .filter_map(|p| self.parent[p.0])
            .collect()
    }

    // Mutation

    /// Splits `part` in two: `part` keeps `keep`, and a new partition is
    /// created holding `extract`. Members of `part` in neither set are
    /// don't-cares and are placed on either side uniformly at random.
    ///
    /// Returns the id of the new partition. Panics if the sets overlap, are
    /// empty, or contain observations from outside `part`.
    pub fn refine(
        &mut self,
        part: PartitionId,
        keep: &BTreeSet<ObsId>,
        extract: &BTreeSet<ObsId>,
    ) -> PartitionId {
        let members = self.part(part).members().clone();
        assert!(!keep.is_empty(), "refining {} with an empty keep set", part);
        assert!(!extract.is_empty(), "refining {} with an empty extract set", part);
        assert!(
            keep.is_disjoint(extract),
            "keep and extract sets of {} overlap",
            part
        );
        assert!(
            keep.is_subset(&members) && extract.is_subset(&members),
            "refinement sets are not contained in {}\n{}",
            part,
            self
        );

        let mut extract = extract.clone();
        for o in members.difference(keep) {
            if !extract.contains(o) && self.rng.random_bool(0.5) {
                extract.insert(*o);
            }
        }
        self.split(part, extract)
    }

    fn split(&mut self, id: PartitionId, extract: BTreeSet<ObsId>) -> PartitionId {
        let before: Option<Vec<ObsId>> = self
            .strict
            .then(|| self.part(id).members().iter().copied().collect());
        let stale = self.predecessors(id);
        let new_id = PartitionId(self.partitions.len());

        let Some(Some(part)) = self.partitions.get_mut(id.0) else {
            unreachable!("{} was checked to exist", id);
        };
        part.remove_members(&extract, &self.observations);
        assert!(!part.is_empty(), "refinement emptied {}", id);

        for o in &extract {
            self.parent[o.0] = Some(new_id);
        }
        tracing::debug!("Refined {} by extracting {} observations into {}", id, extract.len(), new_id);
        let new_part = Partition::new(new_id, extract, &self.observations, self.num_processes);
        self.partitions.push(Some(new_part));

        // Any partition with an edge into the old one may now point at
        // either half.
        for p in stale {
            if let Some(Some(pred)) = self.partitions.get_mut(p.0) {
                pred.invalidate();
            }
        }

        if let Some(obs) = before {
            self.check_partitioning_consistency(obs);
        }
        new_id
    }

    /// Drops a partition and its observations from the automaton.
    pub fn remove_partition(&mut self, id: PartitionId) -> Option<Partition> {
        if !self.contains(id) {
            return None;
        }
        let stale = self.predecessors(id);
        let removed = self.partitions.get_mut(id.0).and_then(Option::take)?;
        for o in removed.members() {
            self.parent[o.0] = None;
        }
        for p in stale {
            if let Some(Some(pred)) = self.partitions.get_mut(p.0) {
                pred.invalidate();
            }
        }
        Some(removed)
    }

    /// Asserts that observations of the same trace with identical local
    /// states lie in the same partition. Quadratic in the worst case, so it
    /// only runs in strict mode.
    fn check_partitioning_consistency(&self, obs: impl IntoIterator<Item = ObsId>) {
        let mut seen: HashMap<(usize, &[LocalState]), (ObsId, Option<PartitionId>)> = HashMap::new();
        for o in obs {
            let node = &self.observations[o.0];
            let key = (node.trace, node.obs.locals());
            let parent = self.parent[o.0];
            if let Some(&(other, other_parent)) = seen.get(&key) {
                assert!(
                    other_parent == parent,
                    "merge-compatibility violated: {} and {} share local states but lie in {:?} and {:?}\n{}",
                    other,
                    o,
                    other_parent,
                    parent,
                    self
                );
            } else {
                seen.insert(key, (o, parent));
            }
        }
    }
}

impl fmt::Display for Gfsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GFSM[num-states={}] :", self.num_partitions())?;
        for p in self.partitions() {
            write!(f, "\n\t{}", p)?;
        }
        Ok(())
    }
}
