//! CNF Builder (spec.md §4.3): instantiates the TFI cone once, a duplicated
//! TFO cone driven by a free pivot variable, and an XOR+OR "some root
//! disagrees" observability clause, into a fresh solver instance.
//!
//! The source numbers solver variables with tight, order-dependent
//! arithmetic (`nWin..2*nWin-iTarget-2` for the duplicated TFO block). This
//! implementation keeps the same three logical pieces — shared TFI/pivot,
//! duplicated TFO, one XOR variable per root — but allocates the free
//! copy-B pivot variable explicitly rather than folding it into the
//! duplicate-TFO numbering, which is simpler to read and does not change
//! the encoding's meaning (see DESIGN.md).

use crate::error::Outcome;
use crate::library::CellLibrary;
use crate::sat::{Lit, SatSolver};
use crate::window::Window;

/// Records how window positions map onto solver variables, so later code
/// (the decomposition engine) can address "the pivot", "divisor d", or
/// "root r" as a literal without recomputing offsets.
#[derive(Clone, Debug)]
pub struct CnfLayout {
    /// Copy-A variable for window position `p` is always `p` itself.
    pub win_len: usize,
    pub i_target: usize,
    /// The free variable representing copy-B's pivot value.
    pub copy_b_pivot: u32,
    /// Copy-B variable for TFO position `p` (`p > i_target`).
    copy_b_tfo_base: u32,
    /// One fresh XOR-output variable per root, in `window.roots` order.
    pub root_xor_vars: Vec<u32>,
    pub n_vars: u32,
}

impl CnfLayout {
    pub fn pivot_lit(&self) -> Lit {
        Lit::pos(self.i_target as u32)
    }

    pub fn divisor_lit(&self, pos: usize) -> Lit {
        Lit::pos(pos as u32)
    }

    fn var_a(&self, pos: usize) -> u32 {
        pos as u32
    }

    fn var_b(&self, pos: usize) -> u32 {
        if pos == self.i_target {
            self.copy_b_pivot
        } else if pos > self.i_target {
            self.copy_b_tfo_base + (pos - self.i_target - 1) as u32
        } else {
            pos as u32 // shared TFI, both copies see the same value
        }
    }
}

/// Builds the window's CNF into `solver`, returning the variable layout.
/// `Outcome::Skip` is returned if any clause addition fails (spec.md §7).
pub fn build_window_cnf<S: SatSolver>(window: &Window, lib: &impl CellLibrary, solver: &mut S) -> Result<CnfLayout, Outcome> {
    let win_len = window.gates.len();
    let tfo_count = win_len - window.tfi_size;
    let copy_b_pivot = win_len as u32;
    let copy_b_tfo_base = copy_b_pivot + 1;
    let n_vars = copy_b_tfo_base + tfo_count as u32 + window.roots.len() as u32;

    solver.restart();
    solver.set_n_vars(n_vars);

    let mut layout = CnfLayout { win_len, i_target: window.i_target, copy_b_pivot, copy_b_tfo_base, root_xor_vars: Vec::new(), n_vars };

    // --- 1. TFI clauses (positions 0..=i_target), one instantiation. ---
    for pos in 0..=window.i_target {
        let entry = &window.gates[pos];
        let Some(h) = entry.gate else { continue };
        let mut vars: Vec<u32> = entry.fanins.iter().map(|&f| layout.var_a(f)).collect();
        vars.push(layout.var_a(pos));
        for clause in lib.gate(h).cnf.instantiate(&vars) {
            if !solver.add_clause(&clause) {
                return Err(Outcome::Skip);
            }
        }
    }

    // --- 2. TFO-copy clauses: copy-A (reuses window positions directly)
    // and copy-B (duplicated, pivot replaced by the free variable). ---
    for pos in (window.i_target + 1)..win_len {
        let entry = &window.gates[pos];
        let Some(h) = entry.gate else { continue };

        let mut vars_a: Vec<u32> = entry.fanins.iter().map(|&f| layout.var_a(f)).collect();
        vars_a.push(layout.var_a(pos));
        for clause in lib.gate(h).cnf.instantiate(&vars_a) {
            if !solver.add_clause(&clause) {
                return Err(Outcome::Skip);
            }
        }

        let mut vars_b: Vec<u32> = entry.fanins.iter().map(|&f| layout.var_b(f)).collect();
        vars_b.push(layout.var_b(pos));
        for clause in lib.gate(h).cnf.instantiate(&vars_b) {
            if !solver.add_clause(&clause) {
                return Err(Outcome::Skip);
            }
        }
    }

    // --- 3. XOR+OR observability clause. ---
    let mut or_clause = Vec::with_capacity(window.roots.len());
    for &r in &window.roots {
        let xor_var = layout.root_xor_vars.len() as u32 + copy_b_tfo_base + tfo_count as u32;
        solver.add_xor(Lit::pos(layout.var_a(r)), Lit::pos(layout.var_b(r)), Lit::pos(xor_var), false);
        or_clause.push(Lit::pos(xor_var));
        layout.root_xor_vars.push(xor_var);
    }
    if !solver.add_clause(&or_clause) {
        return Err(Outcome::Skip);
    }

    solver.simplify();
    Ok(layout)
}
