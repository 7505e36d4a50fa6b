//! FIFO channel contents

use crate::model::{EventKind, EventType};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::fmt;

/// Snapshot of every channel's queue, indexed by channel index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChannelState {
    queues: Vec<VecDeque<String>>,
}

impl ChannelState {
    /// All channels empty.
    pub fn empty(num_channels: usize) -> Self {
        Self {
            queues: vec![VecDeque::new(); num_channels],
        }
    }

    pub fn num_channels(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    pub fn queue(&self, index: usize) -> Option<&VecDeque<String>> {
        self.queues.get(index)
    }

    pub fn push(&mut self, index: usize, label: impl Into<String>) {
        self.queues[index].push_back(label.into());
    }

    /// The next unconsumed message on every channel.
    pub fn top_of_queues(&self) -> Vec<Option<String>> {
        self.queues.iter().map(|q| q.front().cloned()).collect()
    }

    /// Whether `event` may execute against these channel contents. Sends and
    /// local events are always enabled; a receive needs its label at the head
    /// of the queue.
    pub fn enables(&self, event: &EventType) -> bool {
        match (event.kind(), event.channel()) {
            (EventKind::Recv, Some(ch)) => self
                .queues
                .get(ch.index)
                .and_then(VecDeque::front)
                .is_some_and(|head| head == event.label()),
            _ => true,
        }
    }

    /// The channel contents after executing `event`.
    pub fn apply(&self, event: &EventType) -> Result<Self> {
        let mut next = self.clone();
        match (event.kind(), event.channel()) {
            (EventKind::Local, _) => {}
            (_, None) => {
                return Err(Error::trace(format!(
                    "communication event {} has no channel",
                    event
                )));
            }
            (_, Some(ch)) if ch.index >= next.queues.len() => {
                return Err(Error::trace(format!("unknown channel {}", ch)));
            }
            (EventKind::Send, Some(ch)) => next.push(ch.index, event.label()),
            (EventKind::Recv, Some(ch)) => {
                if !self.enables(event) {
                    return Err(Error::trace(format!(
                        "receive {} does not match the head of channel {}",
                        event, ch
                    )));
                }
                next.queues[ch.index].pop_front();
            }
        }
        Ok(next)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .queues
            .iter()
            .map(|q| format!("[{}]", q.iter().cloned().collect::<Vec<_>>().join(",")))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelId;

    #[test]
    fn test_send_then_recv() {
        let ch = ChannelId::new(0, 1, 0);
        let empty = ChannelState::empty(1);
        let sent = empty.apply(&EventType::send("m", ch)).unwrap();
        assert_eq!(sent.top_of_queues(), vec![Some("m".to_string())]);
        assert!(!sent.is_empty());

        let received = sent.apply(&EventType::recv("m", ch)).unwrap();
        assert!(received.is_empty());
        assert_eq!(received, empty);
    }

    #[test]
    fn test_recv_requires_matching_head() {
        let ch = ChannelId::new(0, 1, 0);
        let state = ChannelState::empty(1)
            .apply(&EventType::send("a", ch))
            .unwrap();
        assert!(!state.enables(&EventType::recv("b", ch)));
        assert!(state.apply(&EventType::recv("b", ch)).is_err());
        assert!(ChannelState::empty(1).apply(&EventType::recv("a", ch)).is_err());
    }

    #[test]
    fn test_fifo_order() {
        let ch = ChannelId::new(0, 1, 0);
        let state = ChannelState::empty(1)
            .apply(&EventType::send("a", ch))
            .and_then(|s| s.apply(&EventType::send("b", ch)))
            .unwrap();
        assert_eq!(state.top_of_queues(), vec![Some("a".to_string())]);
        assert_eq!(state.to_string(), "[a,b]");
    }
}
