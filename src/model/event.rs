//! Event types and channel identifiers

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one FIFO queue between two processes.
///
/// `index` is the position of the channel in the system's channel list and
/// doubles as its numeric id in the SCM output. Synthetic channels are
/// appended by invariant augmentation and never appear in observed traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    pub src: usize,
    pub dst: usize,
    pub index: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl ChannelId {
    pub fn new(src: usize, dst: usize, index: usize) -> Self {
        Self {
            src,
            dst,
            index,
            synthetic: false,
        }
    }

    /// A channel used only to track invariant events in the checker input.
    pub fn synthetic(src: usize, dst: usize, index: usize) -> Self {
        Self {
            src,
            dst,
            index,
            synthetic: true,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}#{}", self.src, self.dst, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Send,
    Recv,
    Local,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Send => "send",
            EventKind::Recv => "recv",
            EventKind::Local => "local",
        }
    }
}

/// An immutable event tag. Two event types are equal iff every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventType {
    pid: usize,
    kind: EventKind,
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<ChannelId>,
}

impl EventType {
    /// A send of `label` onto `channel`, executed by the channel's source.
    pub fn send(label: impl Into<String>, channel: ChannelId) -> Self {
        Self {
            pid: channel.src,
            kind: EventKind::Send,
            label: label.into(),
            channel: Some(channel),
        }
    }

    /// A receive of `label` from `channel`, executed by the channel's destination.
    pub fn recv(label: impl Into<String>, channel: ChannelId) -> Self {
        Self {
            pid: channel.dst,
            kind: EventKind::Recv,
            label: label.into(),
            channel: Some(channel),
        }
    }

    pub fn local(label: impl Into<String>, pid: usize) -> Self {
        Self {
            pid,
            kind: EventKind::Local,
            label: label.into(),
            channel: None,
        }
    }

    /// A send onto a synthetic invariant channel. The sending process need
    /// not be the channel's source.
    pub fn synth_send(label: impl Into<String>, channel: ChannelId, pid: usize) -> Self {
        debug_assert!(channel.synthetic);
        Self {
            pid,
            kind: EventKind::Send,
            label: label.into(),
            channel: Some(channel),
        }
    }

    pub fn pid(&self) -> usize {
        self.pid
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub fn is_send(&self) -> bool {
        self.kind == EventKind::Send
    }

    pub fn is_recv(&self) -> bool {
        self.kind == EventKind::Recv
    }

    pub fn is_local(&self) -> bool {
        self.kind == EventKind::Local
    }

    pub fn is_comm(&self) -> bool {
        self.channel.is_some()
    }

    pub fn is_synth_send(&self) -> bool {
        self.is_send() && self.channel.is_some_and(|c| c.synthetic)
    }

    /// Identifier-safe name, unique per event type. Used as a Promela mtype
    /// and as the message label of synthetic sends.
    pub fn token(&self) -> String {
        match self.channel {
            Some(ch) => format!("p{}_{}_c{}_{}", self.pid, self.kind.name(), ch.index, self.label),
            None => format!("p{}_{}_{}", self.pid, self.kind.name(), self.label),
        }
    }

    /// Checks that this event is consistent with a system of `num_processes`
    /// processes connected by `channels`.
    pub fn validate(&self, num_processes: usize, channels: &[ChannelId]) -> Result<()> {
        if self.pid >= num_processes {
            return Err(Error::trace(format!(
                "event {} belongs to process {} but the system has {} processes",
                self, self.pid, num_processes
            )));
        }
        match (self.kind, self.channel) {
            (EventKind::Local, None) => Ok(()),
            (EventKind::Local, Some(_)) => Err(Error::trace(format!(
                "local event {} must not name a channel",
                self
            ))),
            (_, None) => Err(Error::trace(format!(
                "communication event {} is missing its channel",
                self
            ))),
            (kind, Some(ch)) => {
                if channels.get(ch.index) != Some(&ch) {
                    return Err(Error::trace(format!(
                        "event {} uses unknown channel {}",
                        self, ch
                    )));
                }
                let owner = if kind == EventKind::Send { ch.src } else { ch.dst };
                if owner != self.pid {
                    return Err(Error::trace(format!(
                        "event {} is executed by process {} but channel {} requires process {}",
                        self, self.pid, ch, owner
                    )));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.channel) {
            (EventKind::Send, Some(ch)) => write!(f, "{}!{}", ch.index, self.label),
            (EventKind::Recv, Some(ch)) => write!(f, "{}?{}", ch.index, self.label),
            _ => write!(f, "{}@{}", self.label, self.pid),
        }
    }
}
