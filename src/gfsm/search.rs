//! Matching checker counterexamples against partition paths
//!
//! Both searches are depth-first from every initial partition in ascending
//! id order, using an explicit stack. Successors are explored in ascending id
//! order too, so "first found" is a well-defined tie-break.

use super::cexample::{CompleteCExample, PartialCExample};
use super::{Gfsm, PartitionId};
use crate::model::EventType;

impl Gfsm {
    /// Every path from an initial partition that matches `events` step by
    /// step and ends in an accepting partition.
    pub fn cexample_paths(&self, events: &[EventType]) -> Vec<CompleteCExample> {
        let mut found = Vec::new();
        for init in self.initial_partitions() {
            let mut stack = vec![vec![init]];
            while let Some(path) = stack.pop() {
                let depth = path.len() - 1;
                let Some(&last) = path.last() else { continue };
                if depth == events.len() {
                    if self.part(last).is_accept() {
                        found.push(CompleteCExample::new(events.to_vec(), path));
                    }
                    continue;
                }
                self.push_successors(&mut stack, &path, last, &events[depth]);
            }
        }
        tracing::debug!("{} complete paths match a {}-event counterexample", found.len(), events.len());
        found
    }

    /// The path matching the longest prefix of `events`, or `None` when not
    /// even the first event can be taken from any initial partition.
    ///
    /// Among equally long prefixes the first one found wins.
    pub fn longest_partial_cexample_path(&self, events: &[EventType]) -> Option<PartialCExample> {
        let mut best: Vec<PartitionId> = Vec::new();
        for init in self.initial_partitions() {
            let mut stack = vec![vec![init]];
            while let Some(path) = stack.pop() {
                if path.len() > best.len() {
                    best = path.clone();
                }
                let depth = path.len() - 1;
                if depth == events.len() {
                    continue;
                }
                let Some(&last) = path.last() else { continue };
                self.push_successors(&mut stack, &path, last, &events[depth]);
            }
        }

        if best.len() <= 1 {
            return None;
        }
        Some(PartialCExample::new(events.to_vec(), best))
    }

    fn push_successors(
        &self,
        stack: &mut Vec<Vec<PartitionId>>,
        path: &[PartitionId],
        last: PartitionId,
        event: &EventType,
    ) {
        // Reverse so the smallest successor is popped first.
        for next in self.next_partitions(last, event).into_iter().rev() {
            let mut extended = path.to_vec();
            extended.push(next);
            stack.push(extended);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartitioningStrategy;
    use crate::gfsm::tests::config;
    use crate::trace::tests::linear_send_recv_trace;

    #[test]
    fn test_linear_path_and_staleness() {
        let (trace, send, recv) = linear_send_recv_trace();
        let mut gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::Singleton)).unwrap();

        let paths = gfsm.cexample_paths(&[send.clone(), recv.clone()]);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path(), &[PartitionId(0), PartitionId(1), PartitionId(2)]);
        assert!(gfsm.feasible(&paths[0]));

        gfsm.remove_partition(PartitionId(2));
        assert!(!gfsm.feasible(&paths[0]));
    }

    #[test]
    fn test_no_complete_path_for_wrong_order() {
        let (trace, send, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::Singleton)).unwrap();
        assert!(gfsm.cexample_paths(&[recv.clone(), send.clone()]).is_empty());
        // Ends in Sm, which is not accepting.
        assert!(gfsm.cexample_paths(&[send]).is_empty());
        assert!(gfsm.longest_partial_cexample_path(&[recv]).is_none());
    }

    #[test]
    fn test_longest_partial_path() {
        let (trace, send, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::Singleton)).unwrap();

        let partial = gfsm
            .longest_partial_cexample_path(&[send.clone(), send.clone(), recv])
            .unwrap();
        assert_eq!(partial.matched(), 1);
        assert_eq!(partial.path(), &[PartitionId(0), PartitionId(1)]);
    }

    #[test]
    fn test_cyclic_gfsm_matches_repeated_events() {
        let (trace, send, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::TopOfQueue)).unwrap();

        // P0 = {Si, Sf} loops through P1, so any number of rounds match.
        let events = vec![send.clone(), recv.clone(), send, recv];
        let paths = gfsm.cexample_paths(&events);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path().len(), 5);
        assert!(gfsm.feasible(&paths[0]));
    }
}
