//! On-disk formats for traces and invariants

use super::ObsTrace;
use crate::model::{BinaryInvariant, ChannelId, EventType};
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Labels end up verbatim in SCM and Promela output.
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("label regex is valid"));

/// A set of partially ordered traces over one process/channel topology.
///
/// ```json
/// {
///   "processes": 2,
///   "channels": [{"src": 0, "dst": 1, "index": 0}],
///   "traces": [[[<events of p0>], [<events of p1>]]]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFile {
    pub processes: usize,
    pub channels: Vec<ChannelId>,
    pub traces: Vec<Vec<Vec<EventType>>>,
}

impl TraceFile {
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| Error::TraceFormat {
            file: path,
            message: e.to_string(),
        })
    }

    /// Checks the topology and every event label.
    pub fn validate(&self) -> Result<()> {
        crate::ensure!(self.processes > 0, "a system needs at least one process");
        crate::ensure!(!self.traces.is_empty(), "no traces given");
        for (i, ch) in self.channels.iter().enumerate() {
            if ch.index != i || ch.synthetic {
                return Err(Error::trace(format!(
                    "channel {} must have index {} and must not be synthetic",
                    ch, i
                )));
            }
            if ch.src >= self.processes || ch.dst >= self.processes {
                return Err(Error::trace(format!("channel {} names an unknown process", ch)));
            }
        }
        for event in self.traces.iter().flatten().flatten() {
            if !LABEL_RE.is_match(event.label()) {
                return Err(Error::trace(format!(
                    "event label {:?} is not an identifier",
                    event.label()
                )));
            }
        }
        Ok(())
    }

    /// Validates the file and builds one interleaving DAG per trace.
    pub fn build(&self) -> Result<Vec<ObsTrace>> {
        self.validate()?;
        self.traces
            .iter()
            .enumerate()
            .map(|(i, per_process)| {
                let trace =
                    ObsTrace::from_process_events(self.processes, self.channels.clone(), per_process)
                        .map_err(|e| Error::trace(format!("trace {}: {}", i, e)))?;
                trace.validate()?;
                Ok(trace)
            })
            .collect()
    }
}

/// Loads a JSON list of invariants.
pub fn load_invariants(path: impl AsRef<Path>) -> Result<Vec<BinaryInvariant>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| Error::Invariant(format!("{:?}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"{
        "processes": 2,
        "channels": [{"src": 0, "dst": 1, "index": 0}],
        "traces": [[
            [
                {"pid": 0, "kind": "local", "label": "e1"},
                {"pid": 0, "kind": "send", "label": "m", "channel": {"src": 0, "dst": 1, "index": 0}}
            ],
            [
                {"pid": 1, "kind": "local", "label": "f1"},
                {"pid": 1, "kind": "recv", "label": "m", "channel": {"src": 0, "dst": 1, "index": 0}}
            ]
        ]]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let file: TraceFile = serde_json::from_str(SIMPLE).unwrap();
        let traces = file.build().unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].num_processes(), 2);
        assert!(traces[0].num_observations() > 4);
    }

    #[test]
    fn test_rejects_bad_label() {
        let mut file: TraceFile = serde_json::from_str(SIMPLE).unwrap();
        file.traces[0][0][0] = EventType::local("not a label", 0);
        assert!(file.validate().is_err());
    }

    #[test]
    fn test_rejects_misnumbered_channel() {
        let mut file: TraceFile = serde_json::from_str(SIMPLE).unwrap();
        file.channels[0] = ChannelId::new(0, 1, 4);
        assert!(file.validate().is_err());
    }

    #[test]
    fn test_load_invariants_from_file() {
        let path = std::env::temp_dir().join(format!("cfsm-infer-invs-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"kind": "always-precedes",
                 "first": {"pid": 0, "kind": "local", "label": "a"},
                 "second": {"pid": 0, "kind": "local", "label": "b"}}]"#,
        )
        .unwrap();
        let invs = load_invariants(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(invs.len(), 1);
        assert_eq!(invs[0].second(), &EventType::local("b", 0));
    }
}
