//! Graphviz export

use crate::cfsm::Cfsm;
use crate::gfsm::Gfsm;

fn escape(label: &str) -> String {
    label.replace('"', "\\\"")
}

/// Export the CFSM to DOT format, one cluster per process
pub fn cfsm_to_dot(cfsm: &Cfsm) -> String {
    let mut dot = "digraph CFSM {\n".to_string();
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [shape=circle];\n\n");

    for fsm in cfsm.fsms() {
        let pid = fsm.pid();
        dot.push_str(&format!("  subgraph cluster_p{} {{\n", pid));
        dot.push_str(&format!("    label=\"p{}\";\n", pid));

        for state in fsm.states() {
            let shape = if state.is_accept() { "doublecircle" } else { "circle" };
            let fill = if state.is_initial() { ", style=filled, fillcolor=\"lightblue\"" } else { "" };
            dot.push_str(&format!(
                "    \"p{}_{}\" [label=\"{}\", shape={}{}];\n",
                pid,
                state.id(),
                state.id(),
                shape,
                fill
            ));
        }

        for state in fsm.states() {
            for (event, targets) in state.transitions() {
                for target in targets {
                    dot.push_str(&format!(
                        "    \"p{}_{}\" -> \"p{}_{}\" [label=\"{}\"];\n",
                        pid,
                        state.id(),
                        pid,
                        target,
                        escape(&event.to_string())
                    ));
                }
            }
        }
        dot.push_str("  }\n");
    }

    dot.push_str("}\n");
    dot
}

/// Export the partition graph to DOT format
pub fn gfsm_to_dot(gfsm: &Gfsm) -> String {
    let mut dot = "digraph GFSM {\n".to_string();
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [shape=box, style=filled];\n\n");

    for part in gfsm.partitions() {
        let color = match (part.is_initial(), part.is_accept()) {
            (true, true) => "gold",
            (true, false) => "lightblue",
            (false, true) => "lightgreen",
            (false, false) => "white",
        };
        dot.push_str(&format!(
            "  \"{}\" [label=\"{} ({} obs)\", fillcolor=\"{}\"];\n",
            part.id(),
            part.id(),
            part.len(),
            color
        ));
    }

    dot.push('\n');

    for id in gfsm.partition_ids() {
        for (event, targets) in gfsm.transitions(id).iter() {
            for target in targets {
                dot.push_str(&format!(
                    "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                    id,
                    target,
                    escape(&event.to_string())
                ));
            }
        }
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartitioningStrategy;
    use crate::gfsm::tests::config;
    use crate::trace::tests::linear_send_recv_trace;

    #[test]
    fn test_gfsm_dot() {
        let (trace, _, _) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::TopOfQueue)).unwrap();
        let dot = gfsm_to_dot(&gfsm);
        assert!(dot.starts_with("digraph GFSM"));
        assert!(dot.contains("\"P0\" -> \"P1\" [label=\"0!e\"];"));
        assert!(dot.contains("\"P1\" -> \"P0\" [label=\"0?e\"];"));
        assert!(dot.contains("gold"));
    }

    #[test]
    fn test_cfsm_dot() {
        let (trace, _, _) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::Singleton)).unwrap();
        let dot = cfsm_to_dot(&gfsm.cfsm());
        assert!(dot.contains("subgraph cluster_p0"));
        assert!(dot.contains("subgraph cluster_p1"));
        assert!(dot.contains("\"p0_1\" -> \"p0_2\" [label=\"0!e\"];"));
        assert!(dot.contains("doublecircle"));
    }
}
