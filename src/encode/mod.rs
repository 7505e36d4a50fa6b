//! Textual encodings of synthesized models
//!
//! SCM and Promela are the inputs of the two supported model checkers; DOT
//! is for humans.

use crate::cfsm::Cfsm;
use crate::config::ModelFormat;
use crate::model::BinaryInvariant;

pub mod dot;
pub mod promela;
pub mod scm;

pub use dot::{cfsm_to_dot, gfsm_to_dot};
pub use promela::{parse_trace_events, to_promela};
pub use scm::to_scm;

/// Encodes `cfsm` for checking `invariant` in the given checker language.
///
/// For SCM the invariant's events are recorded on a synthetic channel that
/// the bad-states section inspects. Promela tracks them in `recentEvent`
/// instead, so a bounded extra channel cannot block the model.
pub fn encode_for_check(
    cfsm: &Cfsm,
    invariant: &BinaryInvariant,
    format: ModelFormat,
    channel_bound: usize,
) -> String {
    match format {
        ModelFormat::Scm => to_scm(&cfsm.augment_with_invariant(invariant), Some(invariant)),
        ModelFormat::Promela => to_promela(cfsm, std::slice::from_ref(invariant), channel_bound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartitioningStrategy;
    use crate::gfsm::Gfsm;
    use crate::gfsm::tests::config;
    use crate::trace::tests::linear_send_recv_trace;

    #[test]
    fn test_encode_for_check() {
        let (trace, send, recv) = linear_send_recv_trace();
        let gfsm = Gfsm::new(&[trace], &config(PartitioningStrategy::Singleton)).unwrap();
        let cfsm = gfsm.cfsm();
        let inv = BinaryInvariant::always_precedes(send, recv);

        let scm = encode_for_check(&cfsm, &inv, ModelFormat::Scm, 5);
        assert!(scm.contains("(invariant)"));
        assert!(scm.contains("2 ! p0_send_c0_e"));

        let pml = encode_for_check(&cfsm, &inv, ModelFormat::Promela, 5);
        assert!(pml.contains("ltl inv0"));
        assert!(!pml.contains("chan c2"));
    }
}
