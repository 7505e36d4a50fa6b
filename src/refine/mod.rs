//! Counterexample-guided refinement
//!
//! Each round synthesizes the CFSM once, checks every pending invariant
//! against it, then applies the checker's counterexamples to the GFSM one at
//! a time in invariant order. Checks may run concurrently; refinements never
//! do. The loop ends when every invariant is verified or a round produces no
//! refinement.

use crate::checker::{McOutcome, ModelChecker};
use crate::config::RefinementConfig;
use crate::gfsm::{CompleteCExample, Gfsm, Resolution, Split};
use crate::model::{BinaryInvariant, EventType};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Where a counterexample ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineState {
    Checking,
    Converged,
    /// A complete path exists in the current GFSM
    RealCounterexample,
    /// Every complete path was invalidated by an earlier refinement this round
    StaleCounterexample,
    /// Only a prefix of the counterexample matches
    NoCompletePath,
    Refined,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefineReport {
    pub refinements: usize,
    pub rounds: usize,
    pub checker_calls: usize,
    pub converged: bool,
    /// Invariants still not verified when the loop stopped
    pub unresolved: Vec<BinaryInvariant>,
}

pub struct Refiner {
    checker: Arc<dyn ModelChecker>,
    parallelism: usize,
    max_iterations: Option<usize>,
}

impl Refiner {
    pub fn new(checker: Arc<dyn ModelChecker>) -> Self {
        Self {
            checker,
            parallelism: 1,
            max_iterations: None,
        }
    }

    pub fn from_config(checker: Arc<dyn ModelChecker>, config: &RefinementConfig) -> Self {
        Self::new(checker)
            .with_parallelism(config.parallelism)
            .with_max_iterations(config.max_iterations)
    }

    /// Number of invariants checked concurrently
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Cap on check-and-refine rounds
    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Refines `gfsm` until its CFSM satisfies `invariants` or no counterexample
    /// leads to a split.
    ///
    /// A round whose checks were all inconclusive also ends the loop; retrying
    /// them is up to the caller.
    pub async fn run(&self, gfsm: &mut Gfsm, invariants: &[BinaryInvariant]) -> Result<RefineReport> {
        let mut report = RefineReport {
            refinements: 0,
            rounds: 0,
            checker_calls: 0,
            converged: false,
            unresolved: Vec::new(),
        };
        let mut pending: Vec<usize> = (0..invariants.len()).collect();

        if gfsm.is_singleton() {
            tracing::info!("Every partition is a singleton, nothing left to refine");
            report.unresolved = invariants.to_vec();
            return Ok(report);
        }

        loop {
            if pending.is_empty() {
                report.converged = true;
                tracing::info!("{:?} after {} refinements", RefineState::Converged, report.refinements);
                break;
            }
            if self.max_iterations.is_some_and(|max| report.rounds >= max) {
                tracing::warn!("Stopping after {} rounds", report.rounds);
                break;
            }

            report.rounds += 1;
            tracing::info!(
                "Round {}: {:?} {} invariants against {} partitions",
                report.rounds,
                RefineState::Checking,
                pending.len(),
                gfsm.num_partitions()
            );

            let cfsm = Arc::new(gfsm.cfsm());
            let outcomes = self.check_round(Arc::clone(&cfsm), invariants, &pending).await?;
            report.checker_calls += outcomes.len();

            // Paths are matched against the GFSM the CFSM came from, before
            // any of this round's refinements.
            let mut counterexamples = Vec::new();
            for (idx, outcome) in outcomes {
                match outcome {
                    McOutcome::Verified => {
                        tracing::info!("Verified {}", invariants[idx]);
                        pending.retain(|&p| p != idx);
                    }
                    McOutcome::Inconclusive => {
                        tracing::warn!("Inconclusive check of {}", invariants[idx]);
                    }
                    McOutcome::Counterexample(events) => {
                        let events: Vec<EventType> =
                            events.into_iter().filter(|e| !e.is_synth_send()).collect();
                        let paths = gfsm.cexample_paths(&events);
                        counterexamples.push((idx, events, paths));
                    }
                }
            }

            let mut refined = 0;
            for (idx, events, paths) in counterexamples {
                let (state, split) = Self::resolve(gfsm, &events, &paths);
                tracing::debug!("Counterexample for {}: {:?}", invariants[idx], state);
                let Some(split) = split else {
                    continue;
                };

                let before = gfsm.num_partitions();
                let new_id = gfsm.refine(split.partition, &split.keep, &split.extract);
                assert_eq!(gfsm.num_partitions(), before + 1, "refinement did not add a partition");
                refined += 1;
                tracing::info!(
                    "{:?} {} into {} for {} ({} partitions)",
                    RefineState::Refined,
                    split.partition,
                    new_id,
                    invariants[idx],
                    gfsm.num_partitions()
                );
            }

            report.refinements += refined;
            if refined == 0 && !pending.is_empty() {
                tracing::warn!("Round {} produced no refinement", report.rounds);
                break;
            }
        }

        report.unresolved = pending.iter().map(|&i| invariants[i].clone()).collect();
        Ok(report)
    }

    /// Checks the pending invariants concurrently. Outcomes come back in
    /// invariant order regardless of completion order.
    async fn check_round(
        &self,
        cfsm: Arc<crate::cfsm::Cfsm>,
        invariants: &[BinaryInvariant],
        pending: &[usize],
    ) -> Result<Vec<(usize, McOutcome)>> {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();

        for &idx in pending {
            let checker = Arc::clone(&self.checker);
            let cfsm = Arc::clone(&cfsm);
            let semaphore = Arc::clone(&semaphore);
            let invariant = invariants[idx].clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Other(e.into()))?;
                let outcome = checker.check(&cfsm, &invariant).await?;
                Ok::<_, Error>((idx, outcome))
            });
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some(joined) = tasks.join_next().await {
            let (idx, outcome) = joined.map_err(|e| Error::Other(e.into()))??;
            outcomes.push((idx, outcome));
        }
        outcomes.sort_by_key(|(idx, _)| *idx);
        Ok(outcomes)
    }

    /// Picks the split for one counterexample, if there is one.
    fn resolve(gfsm: &Gfsm, events: &[EventType], paths: &[CompleteCExample]) -> (RefineState, Option<Split>) {
        if !paths.is_empty() {
            let mut live = paths.iter().filter(|p| gfsm.feasible(p)).peekable();
            if live.peek().is_none() {
                return (RefineState::StaleCounterexample, None);
            }
            for path in live {
                if let Resolution::Refine(split) = path.resolve(gfsm) {
                    return (RefineState::RealCounterexample, Some(split));
                }
            }
            tracing::warn!("Counterexample is realized by the observed traces themselves");
            return (RefineState::RealCounterexample, None);
        }

        let resolution = match gfsm.longest_partial_cexample_path(events) {
            Some(partial) => {
                tracing::debug!("Longest partial path: {}", partial);
                partial.resolve(gfsm)
            }
            None => match events.first() {
                Some(first) => gfsm.resolve_no_match(first),
                None => Resolution::Unresolvable,
            },
        };
        match resolution {
            Resolution::Refine(split) => (RefineState::NoCompletePath, Some(split)),
            Resolution::Unresolvable => (RefineState::NoCompletePath, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::ScriptedChecker;
    use crate::config::PartitioningStrategy;
    use crate::gfsm::PartitionId;
    use crate::gfsm::tests::config;
    use crate::trace::tests::linear_send_recv_trace;

    fn setup(partitioning: PartitioningStrategy) -> (Gfsm, EventType, EventType, Vec<BinaryInvariant>) {
        let (trace, send, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(partitioning)).unwrap();
        let invariants = vec![BinaryInvariant::always_followed_by(send.clone(), recv.clone())];
        (gfsm, send, recv, invariants)
    }

    #[tokio::test]
    async fn test_singleton_gfsm_short_circuits() {
        let (mut gfsm, _, _, invariants) = setup(PartitioningStrategy::Singleton);
        let checker = Arc::new(ScriptedChecker::default());
        let report = Refiner::new(checker.clone()).run(&mut gfsm, &invariants).await.unwrap();

        assert_eq!(report.refinements, 0);
        assert_eq!(report.rounds, 0);
        assert_eq!(checker.calls(), 0);
        assert_eq!(gfsm.num_partitions(), 3);
    }

    #[tokio::test]
    async fn test_real_counterexample_refines_then_converges() {
        let (mut gfsm, send, recv, invariants) = setup(PartitioningStrategy::TopOfQueue);
        let checker = Arc::new(ScriptedChecker::new([McOutcome::Counterexample(vec![
            send.clone(),
            recv.clone(),
            send,
            recv,
        ])]));

        let report = Refiner::new(checker.clone()).run(&mut gfsm, &invariants).await.unwrap();
        assert_eq!(report.refinements, 1);
        assert_eq!(report.rounds, 2);
        assert!(report.converged);
        assert!(report.unresolved.is_empty());
        assert_eq!(checker.calls(), 2);
        assert_eq!(gfsm.num_partitions(), 3);
        assert!(gfsm.is_singleton());
    }

    #[test]
    fn test_paths_broken_by_earlier_refinement_are_stale() {
        let (mut gfsm, send, recv, _) = setup(PartitioningStrategy::TopOfQueue);
        let events = vec![send.clone(), recv.clone(), send, recv];
        let paths = gfsm.cexample_paths(&events);
        assert_eq!(paths.len(), 1);

        let (state, split) = Refiner::resolve(&gfsm, &events, &paths);
        assert_eq!(state, RefineState::RealCounterexample);
        let split = split.unwrap();
        gfsm.refine(split.partition, &split.keep, &split.extract);

        assert_eq!(Refiner::resolve(&gfsm, &events, &paths), (RefineState::StaleCounterexample, None));
    }

    #[tokio::test]
    async fn test_stale_counterexample_is_rechecked() {
        let (mut gfsm, send, recv, mut invariants) = setup(PartitioningStrategy::TopOfQueue);
        invariants.push(BinaryInvariant::always_precedes(send.clone(), recv.clone()));
        let cex = vec![send.clone(), recv.clone(), send, recv];
        let checker = Arc::new(ScriptedChecker::new([
            McOutcome::Counterexample(cex.clone()),
            McOutcome::Counterexample(cex),
        ]));

        let report = Refiner::new(checker.clone()).run(&mut gfsm, &invariants).await.unwrap();
        // The second counterexample went stale after the first split and
        // its invariant was checked again in the next round.
        assert_eq!(report.refinements, 1);
        assert_eq!(report.rounds, 2);
        assert_eq!(report.checker_calls, 4);
        assert_eq!(checker.calls(), 4);
        assert!(report.converged);
        assert_eq!(gfsm.num_partitions(), 3);
    }

    #[tokio::test]
    async fn test_partial_counterexample_refines() {
        let (mut gfsm, send, recv, invariants) = setup(PartitioningStrategy::TopOfQueue);
        let events = vec![send, recv.clone(), recv];

        let (state, split) = Refiner::resolve(&gfsm, &events, &gfsm.cexample_paths(&events));
        assert_eq!(state, RefineState::NoCompletePath);
        assert_eq!(split.unwrap().partition, PartitionId(0));

        let checker = Arc::new(ScriptedChecker::new([McOutcome::Counterexample(events)]));
        let report = Refiner::new(checker).run(&mut gfsm, &invariants).await.unwrap();
        assert_eq!(report.refinements, 1);
        assert_eq!(report.rounds, 2);
        assert!(report.converged);
        assert_eq!(gfsm.num_partitions(), 3);
    }

    #[tokio::test]
    async fn test_unmatched_counterexample_splits_initial_space() {
        let (mut gfsm, _, recv, invariants) = setup(PartitioningStrategy::TopOfQueue);
        let checker = Arc::new(ScriptedChecker::new([McOutcome::Counterexample(vec![recv])]));

        let report = Refiner::new(checker).run(&mut gfsm, &invariants).await.unwrap();
        assert_eq!(report.refinements, 1);
        assert!(report.converged);
        assert!(!gfsm.part(PartitionId(0)).is_initial());
    }

    #[tokio::test]
    async fn test_observed_violation_is_unresolved() {
        let (mut gfsm, send, recv, invariants) = setup(PartitioningStrategy::TopOfQueue);
        let checker = Arc::new(ScriptedChecker::new([McOutcome::Counterexample(vec![send, recv])]));

        let report = Refiner::new(checker.clone()).run(&mut gfsm, &invariants).await.unwrap();
        assert_eq!(report.refinements, 0);
        assert_eq!(report.rounds, 1);
        assert!(!report.converged);
        assert_eq!(report.unresolved, invariants);
        assert_eq!(checker.calls(), 1);
    }

    #[tokio::test]
    async fn test_inconclusive_stops_without_refinement() {
        let (mut gfsm, _, _, invariants) = setup(PartitioningStrategy::TopOfQueue);
        let checker = Arc::new(ScriptedChecker::new([McOutcome::Inconclusive]));

        let report = Refiner::new(checker).run(&mut gfsm, &invariants).await.unwrap();
        assert!(!report.converged);
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(gfsm.num_partitions(), 2);
    }

    #[tokio::test]
    async fn test_parallel_checks_and_round_cap() {
        let (mut gfsm, send, recv, mut invariants) = setup(PartitioningStrategy::TopOfQueue);
        invariants.push(BinaryInvariant::always_precedes(send, recv));

        let checker = Arc::new(ScriptedChecker::default());
        let report = Refiner::new(checker.clone())
            .with_parallelism(2)
            .run(&mut gfsm, &invariants)
            .await
            .unwrap();
        assert!(report.converged);
        assert_eq!(checker.calls(), 2);

        let capped = Refiner::new(checker)
            .with_max_iterations(Some(0))
            .run(&mut gfsm, &invariants)
            .await
            .unwrap();
        assert_eq!(capped.rounds, 0);
        assert_eq!(capped.unresolved.len(), 2);
    }
}
