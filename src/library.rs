//! The `CellLibrary` collaborator contract (spec.md §6).
//!
//! Preprocessing a real standard-cell library into truth tables and CNF
//! templates is out of scope (spec.md §1); the engine only ever reads a
//! caller-supplied implementation of [`CellLibrary`].

use crate::truth::TruthTable;

/// A stable handle into the library, opaque to the engine.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct GateHandle(u32);

impl GateHandle {
    pub const fn new(id: u32) -> Self {
        GateHandle(id)
    }
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Fixed-point area unit: real area is `raw as f64 / MIO_NUM as f64`.
pub const MIO_NUM: i64 = 1000;

/// A reusable CNF clause schema for one library gate, parameterized by the
/// solver variable ids assigned to its fanins (in order) and its output,
/// when the gate is instantiated into a window's solver instance.
#[derive(Clone, Debug)]
pub struct CnfTemplate {
    /// Each clause is a list of `(fanin_index, polarity)` pairs, where
    /// `fanin_index` is `0..pin_num` for a fanin or `pin_num` for the
    /// gate's own output; `polarity=true` means the literal is negated.
    pub clauses: Vec<Vec<(u8, bool)>>,
}

impl CnfTemplate {
    /// Instantiate this template's clauses against concrete solver
    /// variable ids: `vars[0..pin_num]` are the fanin variables in order,
    /// `vars[pin_num]` is the output variable.
    pub fn instantiate(&self, vars: &[u32]) -> Vec<Vec<crate::sat::Lit>> {
        self.clauses
            .iter()
            .map(|clause| {
                clause
                    .iter()
                    .map(|&(idx, neg)| {
                        let v = vars[idx as usize];
                        if neg {
                            crate::sat::Lit::neg(v)
                        } else {
                            crate::sat::Lit::pos(v)
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// A read-only library gate record.
#[derive(Clone, Debug)]
pub struct LibraryGate {
    pub name: String,
    /// Fixed-point area, scaled by [`MIO_NUM`].
    pub area: i64,
    /// Per-pin (rise, fall) delay in picoseconds.
    pub pin_delays: Vec<(i32, i32)>,
    pub truth: TruthTable,
    pub cnf: CnfTemplate,
}

impl LibraryGate {
    pub fn pin_num(&self) -> u8 {
        self.pin_delays.len() as u8
    }

    pub fn delay_max(&self) -> i32 {
        self.pin_delays.iter().map(|&(r, f)| r.max(f)).max().unwrap_or(0)
    }
}

/// A one- or two-gate realization returned by [`CellLibrary::find_delay_matches`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelayMatch {
    pub gate1: GateHandle,
    /// Permutation mapping gate1's pin `i` to support position `perm1[i]`.
    pub perm1: Vec<u8>,
    /// Second gate, if this is a two-gate realization (one of its pins is
    /// driven by `gate1`'s output).
    pub gate2: Option<GateHandle>,
    pub perm2: Vec<u8>,
}

/// Read-only standard-cell library queries the engine needs.
pub trait CellLibrary {
    fn inv(&self) -> GateHandle;
    fn const0(&self) -> GateHandle;
    fn const1(&self) -> GateHandle;
    fn buf(&self) -> GateHandle;
    fn inv_delay(&self) -> i32;
    fn inv_area(&self) -> i64;

    fn gate(&self, h: GateHandle) -> &LibraryGate;
    fn gate_is_inv(&self, h: GateHandle) -> bool {
        h == self.inv()
    }

    /// The gate obtained from `h` by complementing input `input_idx`
    /// (permuting inputs if needed for commutativity), or `None` if no
    /// such gate exists in the library.
    fn find_compl_input_gate(&self, h: GateHandle, input_idx: u8) -> Option<(GateHandle, u8)>;

    /// Lowest-area gate (or `None`) structurally matching `truth` on
    /// `support.len()` variables, up to input permutation.
    fn find_area_match(&self, truth: TruthTable) -> Option<(i64, GateHandle, Vec<u8>)>;

    /// A small candidate set of one- or two-gate decompositions realizing
    /// `truth`.
    fn find_delay_matches(&self, truth: TruthTable) -> Vec<DelayMatch>;
}
