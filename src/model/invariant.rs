//! Binary temporal invariants
//!
//! Invariants are mined elsewhere; here they are opaque tuples of two event
//! types and a kind, optionally carrying a pre-built checker encoding (an SCM
//! bad-states section or a Promela never claim).

use crate::model::EventType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvariantKind {
    AlwaysFollowedBy,
    AlwaysPrecedes,
    NeverFollowedBy,
    Eventually,
}

impl InvariantKind {
    pub fn short_name(&self) -> &'static str {
        match self {
            InvariantKind::AlwaysFollowedBy => "AFby",
            InvariantKind::AlwaysPrecedes => "AP",
            InvariantKind::NeverFollowedBy => "NFby",
            InvariantKind::Eventually => "EVENTUALLY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryInvariant {
    kind: InvariantKind,
    first: EventType,
    second: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encoding: Option<String>,
}

impl BinaryInvariant {
    pub fn new(kind: InvariantKind, first: EventType, second: EventType) -> Self {
        Self {
            kind,
            first,
            second,
            encoding: None,
        }
    }

    pub fn always_followed_by(first: EventType, second: EventType) -> Self {
        Self::new(InvariantKind::AlwaysFollowedBy, first, second)
    }

    pub fn always_precedes(first: EventType, second: EventType) -> Self {
        Self::new(InvariantKind::AlwaysPrecedes, first, second)
    }

    pub fn never_followed_by(first: EventType, second: EventType) -> Self {
        Self::new(InvariantKind::NeverFollowedBy, first, second)
    }

    /// "`event` eventually happens". Both positions hold the same event.
    pub fn eventually(event: EventType) -> Self {
        Self::new(InvariantKind::Eventually, event.clone(), event)
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn kind(&self) -> InvariantKind {
        self.kind
    }

    pub fn first(&self) -> &EventType {
        &self.first
    }

    pub fn second(&self) -> &EventType {
        &self.second
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Whether `event` is one of the two events this invariant relates.
    pub fn involves(&self, event: &EventType) -> bool {
        &self.first == event || &self.second == event
    }
}

impl fmt::Display for BinaryInvariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            InvariantKind::Eventually => write!(f, "{} {}", self.kind.short_name(), self.second),
            _ => write!(f, "{} {} {}", self.first, self.kind.short_name(), self.second),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelId;

    #[test]
    fn test_display() {
        let ch = ChannelId::new(0, 1, 0);
        let inv = BinaryInvariant::always_precedes(EventType::send("m", ch), EventType::recv("m", ch));
        assert_eq!(inv.to_string(), "0!m AP 0?m");
        assert_eq!(
            BinaryInvariant::eventually(EventType::local("done", 1)).to_string(),
            "EVENTUALLY done@1"
        );
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "kind": "never-followed-by",
            "first": {"pid": 0, "kind": "local", "label": "x"},
            "second": {"pid": 0, "kind": "local", "label": "y"}
        }"#;
        let inv: BinaryInvariant = serde_json::from_str(json).unwrap();
        assert_eq!(inv.kind(), InvariantKind::NeverFollowedBy);
        assert_eq!(inv.first(), &EventType::local("x", 0));
        assert!(inv.involves(&EventType::local("y", 0)));
        assert!(inv.encoding().is_none());
    }
}
