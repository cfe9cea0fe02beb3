//! The `SatSolver` collaborator contract (spec.md §6).
//!
//! The CDCL solver itself is out of scope (spec.md §1) — the engine only
//! ever talks to a caller-supplied implementation of this trait, in the
//! standard `assume/solve/add_clause/final_conflict` shape common to
//! incremental SAT APIs (the pack's `satgalaxy-rs` PicoSAT wrapper exposes
//! the same assumption-based surface).

/// A literal: `var << 1 | polarity`, complemented when the low bit is set.
/// Variable `0` is a legal variable under this encoding — unlike a
/// sign-on-`i32` scheme, where `Lit::neg(0)` and `Lit::pos(0)` would collapse
/// onto the same value (`-0 == 0`) and silently pin variable 0 to a single
/// polarity regardless of what was requested.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Lit(u32);

impl Lit {
    pub fn pos(var: u32) -> Self {
        Lit(var << 1)
    }

    pub fn neg(var: u32) -> Self {
        Lit((var << 1) | 1)
    }

    pub fn var(self, polarity: bool) -> Self {
        Lit((self.0 & !1) | polarity as u32)
    }

    pub fn variable(self) -> u32 {
        self.0 >> 1
    }

    pub fn is_complemented(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn negate(self) -> Self {
        Lit(self.0 ^ 1)
    }
}

/// Outcome of a bounded SAT query.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The conflict budget (`nBTLimit`) was exhausted before a verdict.
    Undef,
}

/// The CDCL solver surface the engine drives. A fresh instance is created
/// per window (spec.md §5: "the SAT solver is reset per window").
pub trait SatSolver {
    fn new_instance() -> Self
    where
        Self: Sized;

    /// Reset to zero clauses/variables, reusing any allocated storage.
    fn restart(&mut self);

    fn set_n_vars(&mut self, n: u32);
    fn n_vars(&self) -> u32;

    /// Returns `false` if the clause is trivially unsatisfiable given
    /// already-fixed unit clauses (spec.md §7: "AddClause returned false"
    /// is a Skip condition, not a panic).
    fn add_clause(&mut self, lits: &[Lit]) -> bool;

    /// Adds the XOR gadget `out = a XOR b` (possibly with an extra
    /// `polarity` flip folded in, i.e. `out = a XOR b XOR polarity`).
    fn add_xor(&mut self, a: Lit, b: Lit, out: Lit, polarity: bool);

    /// Runs the simplifier once; purely an optimization hint, never
    /// changes satisfiability.
    fn simplify(&mut self);

    /// Solve under `assumptions`, using at most `bt_limit` conflicts
    /// (`0` = unbounded).
    fn solve(&mut self, assumptions: &[Lit], bt_limit: u32) -> SatResult;

    /// Valid only immediately after `solve` returned `Sat`.
    fn var_value(&self, v: u32) -> bool;

    /// Valid only immediately after `solve` returned `Unsat`; the subset of
    /// the last assumptions that participated in the proof of
    /// unsatisfiability.
    fn final_conflict(&self) -> Vec<Lit>;
}
