//! Counterexample paths and the splits they induce

use super::{Gfsm, ObsId, PartitionId};
use crate::model::EventType;
use std::collections::BTreeSet;
use std::fmt;

/// A checker counterexample matched end to end by a partition path that
/// finishes in an accepting partition. `path[i] --events[i]--> path[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteCExample {
    events: Vec<EventType>,
    path: Vec<PartitionId>,
}

/// The longest prefix of a checker counterexample that the GFSM can follow.
/// At least one event is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialCExample {
    events: Vec<EventType>,
    path: Vec<PartitionId>,
}

/// A refinement request for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub partition: PartitionId,
    pub keep: BTreeSet<ObsId>,
    pub extract: BTreeSet<ObsId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Refine(Split),
    /// The observations themselves realize the counterexample, or no split
    /// would exclude it.
    Unresolvable,
}

impl CompleteCExample {
    pub(crate) fn new(events: Vec<EventType>, path: Vec<PartitionId>) -> Self {
        debug_assert_eq!(path.len(), events.len() + 1);
        Self { events, path }
    }

    pub fn events(&self) -> &[EventType] {
        &self.events
    }

    pub fn path(&self) -> &[PartitionId] {
        &self.path
    }

    /// Finds the partition where the abstract path stops being backed by a
    /// concrete one.
    pub fn resolve(&self, gfsm: &Gfsm) -> Resolution {
        match gfsm.concrete_walk(&self.path, &self.events) {
            Walk::Stuck { step, reach } => gfsm.split_at_divergence(&self.path, &self.events, step, reach),
            Walk::Realized(reaches) => {
                let last = self.path[self.path.len() - 1];
                let Some(reach) = reaches.last() else {
                    return Resolution::Unresolvable;
                };
                if reach.iter().any(|o| gfsm.observations[o.0].obs.is_accept()) {
                    return Resolution::Unresolvable;
                }
                let extract: BTreeSet<ObsId> = gfsm
                    .part(last)
                    .members()
                    .iter()
                    .copied()
                    .filter(|o| gfsm.observations[o.0].obs.is_accept())
                    .collect();
                Resolution::Refine(Split {
                    partition: last,
                    keep: reach.clone(),
                    extract,
                })
            }
        }
    }
}

impl PartialCExample {
    pub(crate) fn new(events: Vec<EventType>, path: Vec<PartitionId>) -> Self {
        debug_assert!(path.len() >= 2 && path.len() <= events.len() + 1);
        Self { events, path }
    }

    pub fn events(&self) -> &[EventType] {
        &self.events
    }

    pub fn path(&self) -> &[PartitionId] {
        &self.path
    }

    /// Number of counterexample events the path follows.
    pub fn matched(&self) -> usize {
        self.path.len() - 1
    }

    pub fn resolve(&self, gfsm: &Gfsm) -> Resolution {
        let prefix = &self.events[..self.matched()];
        match gfsm.concrete_walk(&self.path, prefix) {
            Walk::Stuck { step, reach } => gfsm.split_at_divergence(&self.path, prefix, step, reach),
            Walk::Realized(reaches) => {
                // Separate the observations the prefix reaches from the rest
                // of the deepest partition that mixes the two.
                for (i, reach) in reaches.iter().enumerate().rev() {
                    let part = gfsm.part(self.path[i]);
                    if reach.len() < part.len() {
                        return Resolution::Refine(Split {
                            partition: part.id(),
                            keep: reach.clone(),
                            extract: part.members().difference(reach).copied().collect(),
                        });
                    }
                }
                Resolution::Unresolvable
            }
        }
    }
}

pub(crate) enum Walk {
    /// No observation reached at `path[step]` continues on `events[step]`.
    Stuck { step: usize, reach: BTreeSet<ObsId> },
    /// Observations reached at each position of the path.
    Realized(Vec<BTreeSet<ObsId>>),
}

impl Gfsm {
    /// Whether `cex` still describes a path through this GFSM. A refinement
    /// or removal since the path was computed may have broken it.
    pub fn feasible(&self, cex: &CompleteCExample) -> bool {
        if !cex.path.iter().all(|p| self.contains(*p)) {
            return false;
        }
        cex.events
            .iter()
            .zip(cex.path.windows(2))
            .all(|(event, pair)| self.next_partitions(pair[0], event).contains(&pair[1]))
    }

    /// Split for a counterexample whose first event cannot be taken from any
    /// initial partition: separate the observations that are initial for the
    /// event's process from those that are not, in the first partition that
    /// mixes them.
    pub fn resolve_no_match(&self, first: &EventType) -> Resolution {
        let pid = first.pid();
        for part in self.partitions().filter(|p| p.is_initial_for_process(pid)) {
            let (extract, keep): (BTreeSet<ObsId>, BTreeSet<ObsId>) = part
                .members()
                .iter()
                .partition(|o| self.observations[o.0].obs.is_initial_for(pid));
            if !keep.is_empty() && !extract.is_empty() {
                return Resolution::Refine(Split {
                    partition: part.id(),
                    keep,
                    extract,
                });
            }
        }
        Resolution::Unresolvable
    }

    pub(crate) fn concrete_walk(&self, path: &[PartitionId], events: &[EventType]) -> Walk {
        let mut reach: BTreeSet<ObsId> = self
            .part(path[0])
            .members()
            .iter()
            .copied()
            .filter(|o| self.observations[o.0].obs.is_initial())
            .collect();
        let mut reaches = Vec::with_capacity(path.len());

        for (step, event) in events.iter().enumerate() {
            let target = self.part(path[step + 1]);
            let next: BTreeSet<ObsId> = reach
                .iter()
                .flat_map(|o| self.observations[o.0].next.iter())
                .filter(|(e, t)| e == event && target.contains(*t))
                .map(|(_, t)| *t)
                .collect();
            if next.is_empty() {
                return Walk::Stuck { step, reach };
            }
            reaches.push(std::mem::replace(&mut reach, next));
        }
        reaches.push(reach);
        Walk::Realized(reaches)
    }

    fn split_at_divergence(
        &self,
        path: &[PartitionId],
        events: &[EventType],
        step: usize,
        reach: BTreeSet<ObsId>,
    ) -> Resolution {
        let part = self.part(path[step]);
        let target = self.part(path[step + 1]);
        let extract: BTreeSet<ObsId> = part
            .members()
            .iter()
            .copied()
            .filter(|o| {
                self.observations[o.0]
                    .next
                    .iter()
                    .any(|(e, t)| e == &events[step] && target.contains(*t))
            })
            .collect();
        if reach.is_empty() || extract.is_empty() {
            return Resolution::Unresolvable;
        }
        Resolution::Refine(Split {
            partition: part.id(),
            keep: reach,
            extract,
        })
    }
}

fn write_path(f: &mut fmt::Formatter<'_>, path: &[PartitionId], events: &[EventType]) -> fmt::Result {
    write!(f, "{}", path[0])?;
    for (event, p) in events.iter().zip(&path[1..]) {
        write!(f, " --{}--> {}", event, p)?;
    }
    Ok(())
}

impl fmt::Display for CompleteCExample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_path(f, &self.path, &self.events)
    }
}

impl fmt::Display for PartialCExample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_path(f, &self.path, &self.events)?;
        write!(f, " ({}/{} events)", self.matched(), self.events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartitioningStrategy;
    use crate::gfsm::tests::config;
    use crate::trace::tests::linear_send_recv_trace;

    #[test]
    fn test_observed_counterexample_is_unresolvable() {
        let (trace, send, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::Singleton)).unwrap();
        let paths = gfsm.cexample_paths(&[send, recv]);
        assert_eq!(paths[0].resolve(&gfsm), Resolution::Unresolvable);
    }

    #[test]
    fn test_looping_counterexample_splits_merged_partition() {
        let (trace, send, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::TopOfQueue)).unwrap();
        let p0 = PartitionId(0);
        let members: Vec<ObsId> = gfsm.part(p0).members().iter().copied().collect();
        let (si, sf) = (members[0], members[1]);
        assert!(gfsm.observation(si).unwrap().is_initial());

        let paths = gfsm.cexample_paths(&[send.clone(), recv.clone(), send, recv]);
        let Resolution::Refine(split) = paths[0].resolve(&gfsm) else {
            panic!("expected a split");
        };
        // The second send would have to leave Sf, which has no successor.
        assert_eq!(split.partition, p0);
        assert_eq!(split.keep, BTreeSet::from([sf]));
        assert_eq!(split.extract, BTreeSet::from([si]));
    }

    #[test]
    fn test_no_match_splits_initial_space() {
        let (trace, _, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::TopOfQueue)).unwrap();
        assert!(gfsm.longest_partial_cexample_path(&[recv.clone()]).is_none());

        let Resolution::Refine(split) = gfsm.resolve_no_match(&recv) else {
            panic!("expected a split");
        };
        assert_eq!(split.partition, PartitionId(0));
        assert_eq!(split.extract.len(), 1);
        assert_eq!(split.keep.len(), 1);
        let extracted = *split.extract.iter().next().unwrap();
        assert!(gfsm.observation(extracted).unwrap().is_initial_for(1));
    }

    #[test]
    fn test_no_match_on_singletons_is_unresolvable() {
        let (trace, _, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::Singleton)).unwrap();
        assert_eq!(gfsm.resolve_no_match(&recv), Resolution::Unresolvable);
    }

    #[test]
    fn test_partial_path_splits_deepest_mixed_partition() {
        let (trace, send, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::TopOfQueue)).unwrap();
        let p0 = PartitionId(0);
        let members: Vec<ObsId> = gfsm.part(p0).members().iter().copied().collect();
        let (si, sf) = (members[0], members[1]);

        let events = [send, recv.clone(), recv];
        assert!(gfsm.cexample_paths(&events).is_empty());
        let partial = gfsm.longest_partial_cexample_path(&events).unwrap();
        assert_eq!(partial.path(), &[p0, PartitionId(1), p0]);
        assert_eq!(partial.matched(), 2);

        // The prefix only reaches Sf on its way back into P0.
        let Resolution::Refine(split) = partial.resolve(&gfsm) else {
            panic!("expected a split");
        };
        assert_eq!(split.partition, p0);
        assert_eq!(split.keep, BTreeSet::from([sf]));
        assert_eq!(split.extract, BTreeSet::from([si]));
    }

    #[test]
    fn test_complete_path_display() {
        let (trace, send, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::Singleton)).unwrap();
        let paths = gfsm.cexample_paths(&[send, recv]);
        assert_eq!(paths[0].to_string(), "P0 --0!e--> P1 --0?e--> P2");
    }

    #[test]
    fn test_partial_path_on_singletons_is_unresolvable() {
        let (trace, send, _) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::Singleton)).unwrap();
        let partial = gfsm.longest_partial_cexample_path(&[send.clone(), send]).unwrap();
        assert_eq!(partial.resolve(&gfsm), Resolution::Unresolvable);
        assert_eq!(partial.to_string(), "P0 --0!e--> P1 (1/2 events)");
    }
}
