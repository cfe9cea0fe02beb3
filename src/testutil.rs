//! Minimal in-memory `Network`, `CellLibrary`, and `SatSolver`
//! implementations used only by this crate's own test suite.
//!
//! These exist purely to exercise the engine's generic code paths without a
//! production collaborator, in the same spirit as the teacher's
//! `gate_testing` feature and `field_testing_utils` module — never part of
//! the library's public surface.

#![cfg(any(test, feature = "testutil"))]

use hashbrown::HashMap;

use crate::library::{CellLibrary, CnfTemplate, DelayMatch, GateHandle, LibraryGate};
use crate::network::{Network, NetworkMut, NodeId};
use crate::sat::{Lit, SatResult, SatSolver};
use crate::truth::TruthTable;

// --- SimpleLibrary: a handful of fixed 2-input gates plus const/buf/inv. ---

pub const G_CONST0: GateHandle = GateHandle::new(0);
pub const G_CONST1: GateHandle = GateHandle::new(1);
pub const G_BUF: GateHandle = GateHandle::new(2);
pub const G_INV: GateHandle = GateHandle::new(3);
pub const G_AND2: GateHandle = GateHandle::new(4);
pub const G_OR2: GateHandle = GateHandle::new(5);
pub const G_NAND2: GateHandle = GateHandle::new(6);
pub const G_NOR2: GateHandle = GateHandle::new(7);
pub const G_ANDNOT2: GateHandle = GateHandle::new(8);
pub const G_ORNOT2: GateHandle = GateHandle::new(9);

pub struct SimpleLibrary {
    gates: Vec<LibraryGate>,
}

fn cnf_for(n_pins: u8, truth: TruthTable) -> CnfTemplate {
    // Tseitin-style clause set: for every input row, forbid the
    // combination of input literals that disagrees with the table's
    // output bit, i.e. one clause per row of the form
    // `(in_0 ?= row_0) OR ... OR (in_{n-1} ?= row_{n-1}) OR (out ?= bit)`.
    let rows = 1u32 << n_pins;
    let mut clauses = Vec::new();
    for row in 0..rows {
        let bit = (truth.bits() >> row) & 1 == 1;
        let mut clause = Vec::new();
        for i in 0..n_pins {
            let row_bit = (row >> i) & 1 == 1;
            clause.push((i, row_bit)); // negate the literal that matches the row, forcing disagreement to sat
        }
        clause.push((n_pins, !bit));
        clauses.push(clause);
    }
    CnfTemplate { clauses }
}

impl SimpleLibrary {
    pub fn new() -> Self {
        let mut gates = Vec::new();
        gates.push(LibraryGate {
            name: "CONST0".into(),
            area: 0,
            pin_delays: vec![],
            truth: TruthTable::constant(0, false),
            cnf: CnfTemplate { clauses: vec![vec![(0, true)]] },
        });
        gates.push(LibraryGate {
            name: "CONST1".into(),
            area: 0,
            pin_delays: vec![],
            truth: TruthTable::constant(0, true),
            cnf: CnfTemplate { clauses: vec![vec![(0, false)]] },
        });
        gates.push(LibraryGate {
            name: "BUF".into(),
            area: 1000,
            pin_delays: vec![(50, 50)],
            truth: TruthTable::var(0, 1),
            cnf: cnf_for(1, TruthTable::var(0, 1)),
        });
        gates.push(LibraryGate {
            name: "INV".into(),
            area: 1000,
            pin_delays: vec![(40, 40)],
            truth: TruthTable::from_bits(1, !TruthTable::var(0, 1).bits() & 0b11),
            cnf: cnf_for(1, TruthTable::from_bits(1, !TruthTable::var(0, 1).bits() & 0b11)),
        });
        let and2 = TruthTable::from_bits(2, TruthTable::var(0, 2).bits() & TruthTable::var(1, 2).bits());
        gates.push(LibraryGate {
            name: "AND2".into(),
            area: 2000,
            pin_delays: vec![(60, 55), (58, 53)],
            truth: and2,
            cnf: cnf_for(2, and2),
        });
        let or2 = TruthTable::from_bits(2, TruthTable::var(0, 2).bits() | TruthTable::var(1, 2).bits());
        gates.push(LibraryGate {
            name: "OR2".into(),
            area: 2000,
            pin_delays: vec![(62, 57), (60, 55)],
            truth: or2,
            cnf: cnf_for(2, or2),
        });
        let nand2 = TruthTable::from_bits(2, !and2.bits() & 0b1111);
        gates.push(LibraryGate {
            name: "NAND2".into(),
            area: 1500,
            pin_delays: vec![(45, 50), (46, 51)],
            truth: nand2,
            cnf: cnf_for(2, nand2),
        });
        let nor2 = TruthTable::from_bits(2, !or2.bits() & 0b1111);
        gates.push(LibraryGate {
            name: "NOR2".into(),
            area: 1500,
            pin_delays: vec![(47, 52), (48, 53)],
            truth: nor2,
            cnf: cnf_for(2, nor2),
        });
        let andnot2 = and2.flip_var(1); // a & !b
        gates.push(LibraryGate {
            name: "ANDNOT2".into(),
            area: 2200,
            pin_delays: vec![(61, 56), (59, 54)],
            truth: andnot2,
            cnf: cnf_for(2, andnot2),
        });
        let ornot2 = or2.flip_var(1); // a | !b
        gates.push(LibraryGate {
            name: "ORNOT2".into(),
            area: 2200,
            pin_delays: vec![(63, 58), (61, 56)],
            truth: ornot2,
            cnf: cnf_for(2, ornot2),
        });
        SimpleLibrary { gates }
    }
}

impl Default for SimpleLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl CellLibrary for SimpleLibrary {
    fn inv(&self) -> GateHandle {
        G_INV
    }
    fn const0(&self) -> GateHandle {
        G_CONST0
    }
    fn const1(&self) -> GateHandle {
        G_CONST1
    }
    fn buf(&self) -> GateHandle {
        G_BUF
    }
    fn inv_delay(&self) -> i32 {
        self.gate(G_INV).delay_max()
    }
    fn inv_area(&self) -> i64 {
        self.gate(G_INV).area
    }
    fn gate(&self, h: GateHandle) -> &LibraryGate {
        &self.gates[h.get() as usize]
    }
    fn find_compl_input_gate(&self, h: GateHandle, input_idx: u8) -> Option<(GateHandle, u8)> {
        let base = self.gate(h);
        if input_idx >= base.pin_num() {
            return None;
        }
        let flipped = base.truth.flip_var(input_idx);
        for (i, g) in self.gates.iter().enumerate() {
            if g.truth.n() != flipped.n() {
                continue;
            }
            if g.truth.bits() == flipped.bits() {
                return Some((GateHandle::new(i as u32), input_idx));
            }
            // also try every input permutation, for commutative-looking
            // 2-pin gates whose complemented variant lands with swapped pins
            if g.truth.n() == 2 && g.truth.swap_vars(0, 1).bits() == flipped.bits() {
                return Some((GateHandle::new(i as u32), 1 - input_idx));
            }
        }
        None
    }
    fn find_area_match(&self, truth: TruthTable) -> Option<(i64, GateHandle, Vec<u8>)> {
        for (i, g) in self.gates.iter().enumerate() {
            if g.truth.n() == truth.n() && g.truth.bits() == truth.bits() {
                let perm: Vec<u8> = (0..truth.n()).collect();
                return Some((g.area, GateHandle::new(i as u32), perm));
            }
        }
        None
    }
    fn find_delay_matches(&self, truth: TruthTable) -> Vec<DelayMatch> {
        self.find_area_match(truth)
            .into_iter()
            .map(|(_, h, perm)| DelayMatch { gate1: h, perm1: perm, gate2: None, perm2: Vec::new() })
            .collect()
    }
}

// --- SimpleNetwork: a minimal in-memory DAG for tests. ---

#[derive(Clone)]
struct Node {
    gate: Option<GateHandle>,
    fanins: Vec<NodeId>,
    fanouts: Vec<NodeId>,
    level: u32,
    is_po: bool,
    ref_count: u32,
}

pub struct SimpleNetwork {
    nodes: Vec<Node>,
    trav_id: u32,
    trav_marks: HashMap<NodeId, u32>,
}

impl SimpleNetwork {
    pub fn new() -> Self {
        SimpleNetwork { nodes: Vec::new(), trav_id: 0, trav_marks: HashMap::new() }
    }

    fn push_node(&mut self, gate: Option<GateHandle>, fanins: Vec<NodeId>) -> NodeId {
        let level = fanins.iter().map(|f| self.level(*f) + 1).max().unwrap_or(0);
        let id = NodeId::new(self.nodes.len() as u32);
        for &fi in &fanins {
            self.nodes[fi.get() as usize].fanouts.push(id);
            self.nodes[fi.get() as usize].ref_count += 1;
        }
        self.nodes.push(Node { gate, fanins, fanouts: Vec::new(), level, is_po: false, ref_count: 0 });
        id
    }

    pub fn add_pi(&mut self) -> NodeId {
        self.push_node(None, Vec::new())
    }

    pub fn add_gate(&mut self, handle: GateHandle, fanins: &[NodeId]) -> NodeId {
        self.push_node(Some(handle), fanins.to_vec())
    }

    pub fn add_and(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.add_gate(G_AND2, &[a, b])
    }
    pub fn add_or(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.add_gate(G_OR2, &[a, b])
    }
    pub fn add_inv(&mut self, a: NodeId) -> NodeId {
        self.add_gate(G_INV, &[a])
    }
    pub fn add_nand(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.add_gate(G_NAND2, &[a, b])
    }

    pub fn mark_po(&mut self, id: NodeId) {
        self.nodes[id.get() as usize].is_po = true;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Exhaustive truth table of `output` over `pis` (n <= 6), used by
    /// whole-network equivalence tests.
    pub fn simulate_exhaustive(&self, lib: &SimpleLibrary, output: NodeId, pis: &[NodeId]) -> TruthTable {
        let n = pis.len() as u8;
        let rows = 1u64 << n;
        let mut bits = 0u64;
        let mut memo: HashMap<NodeId, bool> = HashMap::new();
        for row in 0..rows {
            memo.clear();
            for (i, &pi) in pis.iter().enumerate() {
                memo.insert(pi, (row >> i) & 1 == 1);
            }
            let v = self.eval(lib, output, &mut memo);
            if v {
                bits |= 1 << row;
            }
        }
        TruthTable::from_bits(n, bits)
    }

    fn eval(&self, lib: &SimpleLibrary, id: NodeId, memo: &mut HashMap<NodeId, bool>) -> bool {
        if let Some(&v) = memo.get(&id) {
            return v;
        }
        let node = &self.nodes[id.get() as usize];
        let v = match node.gate {
            None => false, // PI not bound: treated as 0, callers always bind PIs
            Some(h) => {
                let fanin_vals: Vec<bool> = node.fanins.iter().map(|f| self.eval(lib, *f, memo)).collect();
                let mut row = 0u64;
                for (i, b) in fanin_vals.iter().enumerate() {
                    if *b {
                        row |= 1 << i;
                    }
                }
                (lib.gate(h).truth.bits() >> row) & 1 == 1
            }
        };
        memo.insert(id, v);
        v
    }
}

impl Default for SimpleNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl Network for SimpleNetwork {
    fn fanins(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.get() as usize].fanins
    }
    fn fanouts(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.get() as usize].fanouts
    }
    fn level(&self, id: NodeId) -> u32 {
        self.nodes[id.get() as usize].level
    }
    fn data(&self, id: NodeId) -> Option<GateHandle> {
        self.nodes[id.get() as usize].gate
    }
    fn is_po_driver(&self, id: NodeId) -> bool {
        self.nodes[id.get() as usize].is_po
    }
    fn inc_trav_id(&mut self) -> u32 {
        self.trav_id += 1;
        self.trav_id
    }
    fn is_trav_current(&self, id: NodeId) -> bool {
        self.trav_marks.get(&id).copied() == Some(self.trav_id)
    }
    fn set_trav_current(&mut self, id: NodeId) {
        self.trav_marks.insert(id, self.trav_id);
    }
}

impl NetworkMut for SimpleNetwork {
    fn create_node(&mut self, gate: GateHandle, fanins: &[NodeId]) -> NodeId {
        self.push_node(Some(gate), fanins.to_vec())
    }

    fn replace(&mut self, old: NodeId, new_root: NodeId) -> anyhow::Result<()> {
        anyhow::ensure!(old != new_root, "cannot replace a node with itself");
        let fanouts = self.nodes[old.get() as usize].fanouts.clone();
        for fo in fanouts {
            let node = &mut self.nodes[fo.get() as usize];
            for fi in node.fanins.iter_mut() {
                if *fi == old {
                    *fi = new_root;
                }
            }
            self.nodes[new_root.get() as usize].fanouts.push(fo);
        }
        if self.nodes[old.get() as usize].is_po {
            self.nodes[new_root.get() as usize].is_po = true;
        }
        self.nodes[old.get() as usize].fanouts.clear();
        self.nodes[old.get() as usize].ref_count = 0;
        Ok(())
    }

    fn destroy(&mut self, id: NodeId) {
        self.nodes[id.get() as usize].fanouts.clear();
        for fi in self.nodes[id.get() as usize].fanins.clone() {
            if let Some(pos) = self.nodes[fi.get() as usize].fanouts.iter().position(|&x| x == id) {
                self.nodes[fi.get() as usize].fanouts.remove(pos);
            }
        }
        self.nodes[id.get() as usize].fanins.clear();
    }

    fn set_level(&mut self, id: NodeId, level: u32) {
        self.nodes[id.get() as usize].level = level;
    }

    fn bump_ref(&mut self, id: NodeId, delta: i32) -> u32 {
        let rc = &mut self.nodes[id.get() as usize].ref_count;
        *rc = (*rc as i32 + delta).max(0) as u32;
        *rc
    }

    fn ref_count(&self, id: NodeId) -> u32 {
        self.nodes[id.get() as usize].ref_count
    }

    fn absorb_input(&mut self, node: NodeId, new_gate: GateHandle, new_fanins: &[NodeId]) {
        let idx = node.get() as usize;
        let old_fanins = self.nodes[idx].fanins.clone();
        self.nodes[idx].gate = Some(new_gate);
        self.nodes[idx].fanins = new_fanins.to_vec();
        for (old, new) in old_fanins.iter().zip(new_fanins.iter()) {
            if old == new {
                continue;
            }
            if let Some(pos) = self.nodes[old.get() as usize].fanouts.iter().position(|&x| x == node) {
                self.nodes[old.get() as usize].fanouts.remove(pos);
            }
            let rc = &mut self.nodes[old.get() as usize].ref_count;
            *rc = rc.saturating_sub(1);
            self.nodes[new.get() as usize].fanouts.push(node);
            self.nodes[new.get() as usize].ref_count += 1;
        }
    }
}

// --- NaiveSolver: a small reference DPLL solver, enough for <= ~40-variable
// window CNFs used in tests. Not remotely competitive with a real CDCL
// solver; see src/sat.rs for why one is not shipped in this crate. ---

#[derive(Default)]
pub struct NaiveSolver {
    n_vars: u32,
    clauses: Vec<Vec<Lit>>,
    model: Vec<bool>,
    last_conflict: Vec<Lit>,
}

impl NaiveSolver {
    fn value_under(assign: &[Option<bool>], l: Lit) -> Option<bool> {
        assign[l.variable() as usize].map(|v| v != l.is_complemented())
    }

    fn dpll(&self, assign: &mut Vec<Option<bool>>, budget: &mut i64) -> bool {
        if *budget == 0 {
            return false; // caller interprets as Undef
        }
        *budget -= 1;
        loop {
            let mut progressed = false;
            for clause in &self.clauses {
                let mut unassigned: Option<Lit> = None;
                let mut satisfied = false;
                let mut unassigned_count = 0;
                for &l in clause {
                    match Self::value_under(assign, l) {
                        Some(true) => {
                            satisfied = true;
                            break;
                        }
                        Some(false) => {}
                        None => {
                            unassigned_count += 1;
                            unassigned = Some(l);
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                if unassigned_count == 0 {
                    return false; // conflict
                }
                if unassigned_count == 1 {
                    let l = unassigned.unwrap();
                    assign[l.variable() as usize] = Some(!l.is_complemented());
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        let next_var = (0..self.n_vars).find(|&v| assign[v as usize].is_none());
        let Some(v) = next_var else { return true };
        for &val in &[true, false] {
            let mut next = assign.clone();
            next[v as usize] = Some(val);
            if self.dpll(&mut next, budget) {
                *assign = next;
                return true;
            }
        }
        false
    }
}

impl SatSolver for NaiveSolver {
    fn new_instance() -> Self {
        NaiveSolver::default()
    }

    fn restart(&mut self) {
        self.n_vars = 0;
        self.clauses.clear();
        self.model.clear();
        self.last_conflict.clear();
    }

    fn set_n_vars(&mut self, n: u32) {
        self.n_vars = n;
    }

    fn n_vars(&self) -> u32 {
        self.n_vars
    }

    fn add_clause(&mut self, lits: &[Lit]) -> bool {
        if lits.is_empty() {
            return false;
        }
        self.clauses.push(lits.to_vec());
        true
    }

    fn add_xor(&mut self, a: Lit, b: Lit, out: Lit, polarity: bool) {
        // out = a XOR b XOR polarity, encoded as 4 clauses.
        let p = if polarity { out.negate() } else { out };
        let np = if polarity { out } else { out.negate() };
        self.add_clause(&[a.negate(), b.negate(), np]);
        self.add_clause(&[a, b, np]);
        self.add_clause(&[a.negate(), b, p]);
        self.add_clause(&[a, b.negate(), p]);
    }

    fn simplify(&mut self) {}

    fn solve(&mut self, assumptions: &[Lit], bt_limit: u32) -> SatResult {
        let mut assign = vec![None; self.n_vars as usize];
        for &a in assumptions {
            assign[a.variable() as usize] = Some(!a.is_complemented());
        }
        let mut budget: i64 = if bt_limit == 0 { i64::MAX } else { (bt_limit as i64) * 64 };
        if self.dpll(&mut assign, &mut budget) {
            self.model = assign.iter().map(|v| v.unwrap_or(false)).collect();
            SatResult::Sat
        } else if budget <= 0 && bt_limit != 0 {
            SatResult::Undef
        } else {
            self.last_conflict = assumptions.to_vec();
            SatResult::Unsat
        }
    }

    fn var_value(&self, v: u32) -> bool {
        self.model.get(v as usize).copied().unwrap_or(false)
    }

    fn final_conflict(&self) -> Vec<Lit> {
        self.last_conflict.clone()
    }
}
