//! Library Matcher (spec.md §4.5): a thin translation layer over
//! [`CellLibrary`] that turns a decomposition's `(TruthTable, support)` pair
//! — support positions naming window divisors — into fanin lists addressed
//! by window position, ready for the accept phase to wire into the real
//! network.

use crate::library::{CellLibrary, DelayMatch, GateHandle};
use crate::truth::TruthTable;

/// A single-gate, lowest-area realization.
#[derive(Clone, Debug)]
pub struct AreaMatch {
    pub gate: GateHandle,
    pub area: i64,
    /// Window divisor positions, one per pin of `gate`, in pin order.
    pub fanins: Vec<usize>,
}

/// Where one pin of a [`ResolvedDelayMatch`]'s second gate is driven from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaninSource {
    Divisor(usize),
    Gate1Output,
}

#[derive(Clone, Debug)]
pub struct ResolvedDelayMatch {
    pub gate1: GateHandle,
    pub fanins1: Vec<usize>,
    /// Second gate and its resolved fanin sources, for a two-gate
    /// realization.
    pub gate2: Option<(GateHandle, Vec<FaninSource>)>,
}

/// Lowest-area match for `truth`, with `support` resolved to divisor window
/// positions.
pub fn match_area(lib: &impl CellLibrary, truth: TruthTable, support: &[usize]) -> Option<AreaMatch> {
    let (area, gate, perm) = lib.find_area_match(truth)?;
    let fanins = perm.iter().map(|&p| support[p as usize]).collect();
    Some(AreaMatch { gate, area, fanins })
}

/// Delay-optimal candidate realizations for `truth`, `support` resolved the
/// same way.
pub fn match_delay_candidates(lib: &impl CellLibrary, truth: TruthTable, support: &[usize]) -> Vec<ResolvedDelayMatch> {
    lib.find_delay_matches(truth).iter().map(|m| resolve(m, support)).collect()
}

fn resolve(m: &DelayMatch, support: &[usize]) -> ResolvedDelayMatch {
    let fanins1 = m.perm1.iter().map(|&p| support[p as usize]).collect();
    let gate2 = m.gate2.map(|g2| {
        let fanins2 = m
            .perm2
            .iter()
            .map(|&p| if (p as usize) < support.len() { FaninSource::Divisor(support[p as usize]) } else { FaninSource::Gate1Output })
            .collect();
        (g2, fanins2)
    });
    ResolvedDelayMatch { gate1: m.gate1, fanins1, gate2 }
}
