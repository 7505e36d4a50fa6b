//! Builds the interleaving DAG of a partially ordered trace
//!
//! A partially ordered trace records, per process, the sequence of events
//! that process executed. Every FIFO-consistent interleaving of those
//! sequences is a possible global execution; the resulting DAG has one node
//! per reachable global configuration, identified by how far each process
//! has progressed.

use super::{LocalState, ObsTrace, Observation};
use crate::model::{ChannelId, ChannelState, EventType};
use crate::{Error, Result};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, VecDeque};

impl ObsTrace {
    /// Builds the trace from per-process event sequences.
    ///
    /// Process `p`'s local state after `k` events is named `k`; it is initial
    /// iff `k == 0` and accepting iff `k` equals the length of `p`'s
    /// sequence. Fails if some event belongs to the wrong process, or if the
    /// configuration where every process has finished is unreachable or
    /// leaves messages in flight.
    pub fn from_process_events(
        num_processes: usize,
        channels: Vec<ChannelId>,
        events: &[Vec<EventType>],
    ) -> Result<Self> {
        if events.len() != num_processes {
            return Err(Error::trace(format!(
                "expected event sequences for {} processes, got {}",
                num_processes,
                events.len()
            )));
        }
        for (pid, seq) in events.iter().enumerate() {
            for e in seq {
                e.validate(num_processes, &channels)?;
                if e.pid() != pid {
                    return Err(Error::trace(format!(
                        "event {} listed under process {} belongs to process {}",
                        e,
                        pid,
                        e.pid()
                    )));
                }
            }
        }

        let lengths: Vec<usize> = events.iter().map(Vec::len).collect();
        let observe = |progress: &[usize], ch: ChannelState| {
            let locals = progress
                .iter()
                .zip(&lengths)
                .map(|(&k, &len)| LocalState::new(k.to_string(), k == 0, k == len))
                .collect();
            Observation::new(locals, ch)
        };

        let start = vec![0; num_processes];
        let start_channels = ChannelState::empty(channels.len());
        let mut trace = ObsTrace::new(channels, observe(&start, start_channels.clone()));

        let mut seen: HashMap<Vec<usize>, NodeIndex> = HashMap::new();
        seen.insert(start.clone(), trace.init());
        let mut queue = VecDeque::from([(start, start_channels, trace.init())]);

        while let Some((progress, channel_state, node)) = queue.pop_front() {
            for pid in 0..num_processes {
                let Some(event) = events[pid].get(progress[pid]) else {
                    continue;
                };
                if !channel_state.enables(event) {
                    continue;
                }
                let next_channels = channel_state.apply(event)?;
                let mut next = progress.clone();
                next[pid] += 1;

                let target = match seen.get(&next) {
                    Some(&idx) => idx,
                    None => {
                        let idx = trace.add_observation(observe(&next, next_channels.clone()));
                        seen.insert(next.clone(), idx);
                        queue.push_back((next, next_channels, idx));
                        idx
                    }
                };
                trace.add_transition(node, event.clone(), target)?;
            }
        }

        let finished = seen
            .get(&lengths)
            .and_then(|&idx| trace.observation(idx))
            .ok_or_else(|| Error::trace("trace cannot run to completion under FIFO semantics"))?;
        if !finished.is_accept() {
            return Err(Error::trace(format!(
                "trace finishes with messages in flight: {}",
                finished.channels()
            )));
        }

        tracing::debug!(
            "Built interleaving DAG with {} observations and {} transitions",
            trace.num_observations(),
            trace.num_transitions()
        );
        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrent_local_events_form_diamond() {
        let ch = ChannelId::new(0, 1, 0);
        let trace = ObsTrace::from_process_events(
            2,
            vec![ch],
            &[vec![EventType::local("e1", 0)], vec![EventType::local("f1", 1)]],
        )
        .unwrap();
        assert_eq!(trace.num_observations(), 4);
        assert_eq!(trace.num_transitions(), 4);
        assert!(trace.validate().is_ok());
    }

    #[test]
    fn test_receive_waits_for_send() {
        let ch = ChannelId::new(0, 1, 0);
        let trace = ObsTrace::from_process_events(
            2,
            vec![ch],
            &[vec![EventType::send("m", ch)], vec![EventType::recv("m", ch)]],
        )
        .unwrap();
        // (0,0) -> (1,0) -> (1,1): the receive is never enabled first.
        assert_eq!(trace.num_observations(), 3);
        assert_eq!(trace.transitions(trace.init()).len(), 1);
    }

    #[test]
    fn test_simple_concurrency() {
        let ch = ChannelId::new(0, 1, 0);
        let trace = ObsTrace::from_process_events(
            2,
            vec![ch],
            &[
                vec![EventType::local("e1", 0), EventType::send("m", ch)],
                vec![EventType::local("f1", 1), EventType::recv("m", ch)],
            ],
        )
        .unwrap();
        assert!(trace.validate().is_ok());
        let accepting = trace
            .node_indices()
            .filter(|&n| trace.observation(n).unwrap().is_accept())
            .count();
        assert_eq!(accepting, 1);
    }

    #[test]
    fn test_unmatched_send_is_rejected() {
        let ch = ChannelId::new(0, 1, 0);
        let result =
            ObsTrace::from_process_events(2, vec![ch], &[vec![EventType::send("m", ch)], vec![]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unsatisfiable_receive_is_rejected() {
        let ch = ChannelId::new(0, 1, 0);
        let result = ObsTrace::from_process_events(
            2,
            vec![ch],
            &[vec![EventType::send("a", ch)], vec![EventType::recv("b", ch)]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_event_under_wrong_process() {
        let ch = ChannelId::new(0, 1, 0);
        let result = ObsTrace::from_process_events(
            2,
            vec![ch],
            &[vec![EventType::recv("m", ch)], vec![EventType::send("m", ch)]],
        );
        assert!(result.is_err());
    }
}
