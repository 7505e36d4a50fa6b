//! Observed traces
//!
//! Each trace is an immutable DAG of concrete global configurations, linked
//! by the events that moved the system from one configuration to the next.
//! Traces are produced by a collaborator (log parsing is not done here) and
//! are the ground truth that every inferred model is refined against.

use crate::model::{ChannelId, EventType};
use crate::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};

pub mod interleave;
pub mod models;
pub mod observation;

pub use models::{TraceFile, load_invariants};
pub use observation::{LocalState, Observation};

/// One observed execution as a DAG of observations.
#[derive(Debug, Clone)]
pub struct ObsTrace {
    /// Nodes are observations, edges are the events between them.
    graph: DiGraph<Observation, EventType>,
    init: NodeIndex,
    num_processes: usize,
    channels: Vec<ChannelId>,
}

impl ObsTrace {
    /// Creates a trace rooted at `init`.
    pub fn new(channels: Vec<ChannelId>, init: Observation) -> Self {
        let num_processes = init.num_processes();
        let mut graph = DiGraph::new();
        let init = graph.add_node(init);
        Self {
            graph,
            init,
            num_processes,
            channels,
        }
    }

    pub fn add_observation(&mut self, obs: Observation) -> NodeIndex {
        self.graph.add_node(obs)
    }

    /// Records that `event` moves the system from `from` to `to`.
    pub fn add_transition(&mut self, from: NodeIndex, event: EventType, to: NodeIndex) -> Result<()> {
        event.validate(self.num_processes, &self.channels)?;
        if self.graph.node_weight(from).is_none() || self.graph.node_weight(to).is_none() {
            return Err(Error::trace(format!(
                "transition {} references an unknown observation",
                event
            )));
        }
        self.graph.add_edge(from, to, event);
        Ok(())
    }

    pub fn init(&self) -> NodeIndex {
        self.init
    }

    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn num_observations(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_transitions(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn observation(&self, node: NodeIndex) -> Option<&Observation> {
        self.graph.node_weight(node)
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn observations(&self) -> impl Iterator<Item = (NodeIndex, &Observation)> + '_ {
        self.graph.node_indices().map(|n| (n, &self.graph[n]))
    }

    /// Outgoing transitions of `node`, in the order they were added.
    pub fn transitions(&self, node: NodeIndex) -> Vec<(EventType, NodeIndex)> {
        let mut edges: Vec<_> = self.graph.edges(node).collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| (e.weight().clone(), e.target()))
            .collect()
    }

    /// Structural checks: acyclic, every observation has one local state per
    /// process, every observation is reachable from the initial one, the
    /// initial observation is initial and some observation is accepting.
    pub fn validate(&self) -> Result<()> {
        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(Error::trace("trace graph contains a cycle"));
        }
        for node in self.graph.node_indices() {
            let obs = &self.graph[node];
            if obs.num_processes() != self.num_processes {
                return Err(Error::trace(format!(
                    "observation {} has {} local states, expected {}",
                    obs,
                    obs.num_processes(),
                    self.num_processes
                )));
            }
            if obs.channels().num_channels() != self.channels.len() {
                return Err(Error::trace(format!(
                    "observation {} tracks {} channels, expected {}",
                    obs,
                    obs.channels().num_channels(),
                    self.channels.len()
                )));
            }
        }

        let mut reached = 0;
        let mut dfs = Dfs::new(&self.graph, self.init);
        while dfs.next(&self.graph).is_some() {
            reached += 1;
        }
        if reached != self.graph.node_count() {
            return Err(Error::trace(format!(
                "{} observations are unreachable from the initial observation",
                self.graph.node_count() - reached
            )));
        }

        if !self.graph[self.init].is_initial() {
            return Err(Error::trace("the root observation is not initial"));
        }
        if !self.graph.node_weights().any(Observation::is_accept) {
            return Err(Error::trace("trace has no accepting observation"));
        }
        Ok(())
    }
}
