//! Promela encoding for Spin
//!
//! Every transition prints a `CSightTrace[<event>]` tag. Spin replays these
//! prints when it simulates an error trail, which is how counterexamples are
//! recovered from its output.

use crate::cfsm::{Cfsm, Fsm, FsmState};
use crate::model::{BinaryInvariant, EventKind, EventType, InvariantKind};
use crate::{Error, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static TRACE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CSightTrace\[([^\]]+)\]").expect("valid trace tag regex"));

pub const OTHER_EVENT: &str = "OTHEREVENT";

pub fn to_promela(cfsm: &Cfsm, invariants: &[BinaryInvariant], channel_bound: usize) -> String {
    let tracked = tracked_events(invariants);
    let mut out = String::from("/* Generated by cfsm-infer */\n\n");

    let labels: BTreeSet<&str> = cfsm
        .fsms()
        .iter()
        .flat_map(|f| f.states())
        .flat_map(|s| s.transitioning_events())
        .filter(|e| e.is_comm())
        .map(EventType::label)
        .collect();
    if !labels.is_empty() {
        out.push_str(&format!(
            "mtype = {{ {} }};\n",
            labels.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    out.push_str(&format!("#define {} 0\n", OTHER_EVENT));
    for (event, code) in &tracked {
        out.push_str(&format!("#define {} {}\n", event_const(event), code));
    }
    out.push_str("\ntypedef Event { byte type };\nEvent recentEvent;\n");
    out.push_str(&format!("bit terminal[{}];\n\n", cfsm.num_processes()));

    for ch in cfsm.channels() {
        out.push_str(&format!("chan c{} = [{}] of {{ mtype }};\n", ch.index, channel_bound));
    }
    out.push('\n');

    for fsm in cfsm.fsms() {
        out.push_str(&fsm_to_promela(fsm, &tracked));
        out.push('\n');
    }

    for (i, inv) in invariants.iter().enumerate() {
        match inv.encoding() {
            Some(encoding) => out.push_str(encoding.trim_end()),
            None => out.push_str(&format!("ltl inv{} {{ {} }}", i, ltl_formula(inv))),
        }
        out.push('\n');
    }
    out
}

/// One `active proctype` per process. Each state is a labelled block; states
/// with transitions loop in a `do` choice over them.
pub fn fsm_to_promela(fsm: &Fsm, tracked: &BTreeMap<EventType, usize>) -> String {
    let prefix = format!("p{}", fsm.pid());
    let mut out = format!("active proctype {}() {{\n", prefix);

    out.push_str("    if\n");
    for id in fsm.initial_states() {
        let accept = fsm.state(id).is_some_and(FsmState::is_accept);
        let guard = if accept {
            format!("terminal[{}] = 1", fsm.pid())
        } else {
            "skip".to_string()
        };
        out.push_str(&format!("      :: {} -> goto {}_{};\n", guard, prefix, id));
    }
    out.push_str("    fi;\n");

    for state in fsm.states() {
        out.push_str(&state_to_promela(fsm, state, &prefix, tracked));
    }

    out.push_str(&format!("end_{}:\n    skip\n}}\n", prefix));
    out
}

pub fn state_to_promela(
    fsm: &Fsm,
    state: &FsmState,
    prefix: &str,
    tracked: &BTreeMap<EventType, usize>,
) -> String {
    let mut out = format!("{}_{}:\n", prefix, state.id());
    if state.is_accept() {
        out.push_str(&format!("end_{}_{}:\n", prefix, state.id()));
    }

    if state.is_sink() {
        if state.is_accept() {
            out.push_str(&format!("    goto end_{};\n", prefix));
        } else {
            out.push_str("    false;\n");
        }
        return out;
    }

    out.push_str("    do\n");
    for (event, targets) in state.transitions() {
        let trace = match tracked.get(event) {
            Some(_) => format!("recentEvent.type = {}", event_const(event)),
            None => format!("recentEvent.type = {}", OTHER_EVENT),
        };
        for target in targets {
            let target_accept = fsm.state(*target).is_some_and(FsmState::is_accept);
            let terminal = if target_accept != state.is_accept() {
                format!("terminal[{}] = {};", state.pid(), u8::from(target_accept))
            } else {
                String::new()
            };
            out.push_str(&format!(
                "      :: atomic {{ {}; {}; printf(\"CSightTrace[{}]\\n\"); {}}} -> goto {}_{};\n",
                promela_action(event),
                trace,
                event,
                terminal,
                prefix,
                target
            ));
        }
    }
    out.push_str("    od;\n");
    out
}

fn promela_action(event: &EventType) -> String {
    match (event.kind(), event.channel()) {
        (EventKind::Send, Some(ch)) => format!("c{} ! {}", ch.index, event.label()),
        (EventKind::Recv, Some(ch)) => format!("c{} ? {}", ch.index, event.label()),
        _ => "skip".to_string(),
    }
}

/// Invariant events get distinct nonzero codes so a claim can watch them.
fn tracked_events(invariants: &[BinaryInvariant]) -> BTreeMap<EventType, usize> {
    let events: BTreeSet<&EventType> = invariants
        .iter()
        .flat_map(|inv| [inv.first(), inv.second()])
        .collect();
    events
        .into_iter()
        .enumerate()
        .map(|(i, e)| (e.clone(), i + 1))
        .collect()
}

fn event_const(event: &EventType) -> String {
    format!("E_{}", event.token())
}

fn ltl_formula(inv: &BinaryInvariant) -> String {
    let is = |e: &EventType| format!("(recentEvent.type == {})", event_const(e));
    let a = is(inv.first());
    let b = is(inv.second());
    match inv.kind() {
        InvariantKind::AlwaysFollowedBy => format!("[] ({} -> <> {})", a, b),
        InvariantKind::NeverFollowedBy => format!("[] ({} -> [] !{})", a, b),
        InvariantKind::AlwaysPrecedes => format!("(!{} U {}) || [] !{}", b, a, b),
        InvariantKind::Eventually => format!("<> {}", b),
    }
}

/// Recovers the event sequence from `CSightTrace[...]` tags in Spin's output.
/// Every tag must name an event of `alphabet`.
pub fn parse_trace_events(output: &str, alphabet: &BTreeSet<EventType>) -> Result<Vec<EventType>> {
    let by_name: BTreeMap<String, &EventType> = alphabet.iter().map(|e| (e.to_string(), e)).collect();
    TRACE_TAG_RE
        .captures_iter(output)
        .map(|cap| {
            let name = &cap[1];
            by_name
                .get(name)
                .map(|e| (*e).clone())
                .ok_or_else(|| Error::CheckerOutput(format!("unknown event '{}' in trail", name)))
        })
        .collect()
}
