//! Recoverable per-pivot outcomes and run statistics.
//!
//! Per spec.md §7: a pivot attempt never raises an exception across its own
//! boundary. Every recoverable path returns an [`Outcome`] by value; only
//! genuine invariant violations use `assert!`/`debug_assert!`.

use crate::network::NodeId;

/// Which shape the accepted replacement took, for the `Stats` breakdown
/// (spec.md §7 counts const/buf/inv collapses separately from an ordinary
/// library match).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubstKind {
    Const0,
    Const1,
    Buf,
    Inv,
    Match,
}

/// The result of attempting to resynthesize one pivot gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The pivot was replaced; the new driving node is `new_node` (which may
    /// equal an existing divisor, for a pure buffer/inverter collapse).
    Accepted { new_node: NodeId, gates_added: u32, kind: SubstKind },
    /// MFFC too small, window too large, no TFO roots, divisor count < 2, or
    /// the solver rejected a clause during CNF setup.
    Skip,
    /// A SAT query returned `undef` (conflict-limited timeout).
    Timeout,
    /// `dec_rec` exhausted its attempts without a viable cofactor or
    /// constant.
    NoDecomposition,
    /// The library matcher found no match, or no match was profitable.
    NoMatch,
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }
}

/// Run-wide counters, incremented as pivots are attempted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub n_nodes_processed: u64,
    pub n_nodes_changed: u64,
    pub n_nodes_const0: u64,
    pub n_nodes_const1: u64,
    pub n_nodes_buf: u64,
    pub n_nodes_inv: u64,
    pub n_time_outs: u64,
    pub n_no_decs: u64,
    pub n_skips: u64,
    pub n_no_match: u64,
}

impl Stats {
    /// Fold one pivot's [`Outcome`] into the running counters.
    pub fn record(&mut self, outcome: &Outcome) {
        self.n_nodes_processed += 1;
        match outcome {
            Outcome::Accepted { kind, .. } => {
                self.n_nodes_changed += 1;
                match kind {
                    SubstKind::Const0 => self.n_nodes_const0 += 1,
                    SubstKind::Const1 => self.n_nodes_const1 += 1,
                    SubstKind::Buf => self.n_nodes_buf += 1,
                    SubstKind::Inv => self.n_nodes_inv += 1,
                    SubstKind::Match => {}
                }
            }
            Outcome::Skip => self.n_skips += 1,
            Outcome::Timeout => self.n_time_outs += 1,
            Outcome::NoDecomposition => self.n_no_decs += 1,
            Outcome::NoMatch => self.n_no_match += 1,
        }
    }
}
