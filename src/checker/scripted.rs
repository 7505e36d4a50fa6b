//! Scripted checker for testing and development
//!
//! Replays a fixed queue of outcomes in call order and counts invocations.
//! Once the script runs out, every invariant is reported verified.

use super::{McOutcome, ModelChecker};
use crate::Result;
use crate::cfsm::Cfsm;
use crate::model::BinaryInvariant;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ScriptedChecker {
    outcomes: Mutex<VecDeque<McOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedChecker {
    pub fn new(outcomes: impl IntoIterator<Item = McOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `check` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelChecker for ScriptedChecker {
    async fn check(&self, _cfsm: &Cfsm, invariant: &BinaryInvariant) -> Result<McOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = match self.outcomes.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        let outcome = next.unwrap_or(McOutcome::Verified);
        tracing::debug!("Scripted outcome for {}: {:?}", invariant, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfsm::Fsm;
    use crate::model::{ChannelId, EventType};

    #[tokio::test]
    async fn test_replays_then_verifies() {
        let ch = ChannelId::new(0, 1, 0);
        let send = EventType::send("m", ch);
        let cfsm = Cfsm::new(1, vec![], vec![Fsm::new(0)]);
        let inv = BinaryInvariant::eventually(send.clone());

        let checker = ScriptedChecker::new([McOutcome::Counterexample(vec![send.clone()]), McOutcome::Inconclusive]);
        assert_eq!(
            checker.check(&cfsm, &inv).await.unwrap(),
            McOutcome::Counterexample(vec![send])
        );
        assert_eq!(checker.check(&cfsm, &inv).await.unwrap(), McOutcome::Inconclusive);
        assert_eq!(checker.check(&cfsm, &inv).await.unwrap(), McOutcome::Verified);
        assert_eq!(checker.calls(), 3);
    }
}
