//! SCM encoding, the input language of the McScM checker

use crate::cfsm::{Cfsm, Fsm, FsmState};
use crate::model::{BinaryInvariant, EventKind, EventType};

/// Encodes the whole CFSM, followed by the invariant's bad-states section
/// when it carries one.
pub fn to_scm(cfsm: &Cfsm, invariant: Option<&BinaryInvariant>) -> String {
    let local_ch = cfsm.local_events_channel();
    let has_local = cfsm.alphabet().iter().any(EventType::is_local);
    let nb_channels = cfsm.channels().len() + usize::from(has_local);

    let mut out = String::from("scm cfsm :\n\n");
    out.push_str(&format!("nb_channels = {} ;\n", nb_channels));
    out.push_str("/*\n");
    for ch in cfsm.channels() {
        let kind = if ch.synthetic { " (invariant)" } else { "" };
        out.push_str(&format!("channel {} : p{} -> p{}{}\n", ch.index, ch.src, ch.dst, kind));
    }
    if has_local {
        out.push_str(&format!("channel {} : local events\n", local_ch));
    }
    out.push_str("*/\n\n");
    out.push_str("parameters :\n\n");

    for fsm in cfsm.fsms() {
        out.push_str(&fsm_to_scm(fsm, local_ch));
        out.push('\n');
    }

    if let Some(encoding) = invariant.and_then(BinaryInvariant::encoding) {
        out.push_str(encoding.trim_end());
        out.push('\n');
    }
    out
}

/// One `automaton` block. States are emitted in ascending id order.
pub fn fsm_to_scm(fsm: &Fsm, local_ch: usize) -> String {
    let initial: Vec<String> = fsm.initial_states().iter().map(ToString::to_string).collect();
    let mut out = format!("automaton p{} :\n\ninitial : {}\n\n", fsm.pid(), initial.join(" "));
    for state in fsm.states() {
        out.push_str(&state_to_scm(state, local_ch));
        out.push('\n');
    }
    out
}

/// A `state N :` header followed by one `to` line per (event, target).
pub fn state_to_scm(state: &FsmState, local_ch: usize) -> String {
    let mut out = format!("state {} :\n", state.id());
    for (event, targets) in state.transitions() {
        let action = scm_action(event, local_ch);
        for target in targets {
            out.push_str(&format!("to {} : when true , {} ;\n", target, action));
        }
    }
    out
}

fn scm_action(event: &EventType, local_ch: usize) -> String {
    match (event.kind(), event.channel()) {
        (EventKind::Send, Some(ch)) => format!("{} ! {}", ch.index, event.label()),
        (EventKind::Recv, Some(ch)) => format!("{} ? {}", ch.index, event.label()),
        // Local events are modelled as sends on a dedicated queue.
        _ => format!("{} ! {}", local_ch, event.token()),
    }
}
