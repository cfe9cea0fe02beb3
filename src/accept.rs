//! Accept/Reject & Rewrite (spec.md §4.6): MFFC-area bookkeeping via
//! ref/deref, building the replacement node(s) for an accepted
//! decomposition, and the incremental level update that follows a rewire.

use crate::error::{Outcome, SubstKind};
use crate::library::{CellLibrary, GateHandle};
use crate::matcher::{AreaMatch, FaninSource, ResolvedDelayMatch};
use crate::network::{NetworkMut, NodeId};
use crate::window::Window;

/// Deref `id`: subtracts its own area and recurses into any fanin whose
/// reference count just dropped to zero. Must be paired with [`node_ref`]
/// to restore the network's true reference counts afterward.
fn node_deref(net: &mut impl NetworkMut, lib: &impl CellLibrary, id: NodeId) -> i64 {
    let Some(h) = net.data(id) else { return 0 };
    let mut area = lib.gate(h).area;
    for fi in net.fanins(id).to_vec() {
        let r = net.bump_ref(fi, -1);
        if r == 0 {
            area += node_deref(net, lib, fi);
        }
    }
    area
}

fn node_ref(net: &mut impl NetworkMut, lib: &impl CellLibrary, id: NodeId) -> i64 {
    let Some(h) = net.data(id) else { return 0 };
    let mut area = lib.gate(h).area;
    for fi in net.fanins(id).to_vec() {
        let r = net.bump_ref(fi, 1);
        if r == 1 {
            area += node_ref(net, lib, fi);
        }
    }
    area
}

/// The area of `pivot`'s MFFC: everything that would become dead if
/// `pivot` were deleted outright. Computed by dereferencing then
/// re-referencing, leaving the network's actual ref-counts unchanged
/// (spec.md §4.6, "reference counting for MFFC area").
pub fn mffc_area(net: &mut impl NetworkMut, lib: &impl CellLibrary, pivot: NodeId) -> i64 {
    let area = node_deref(net, lib, pivot);
    let restored = node_ref(net, lib, pivot);
    debug_assert_eq!(area, restored, "ref/deref must be area-neutral on the same subtree");
    area
}

/// Builds the replacement for a constant decomposition and rewires the
/// pivot onto it.
pub fn substitute_const(net: &mut impl NetworkMut, lib: &impl CellLibrary, pivot: NodeId, value: bool) -> anyhow::Result<(NodeId, u32)> {
    let handle = if value { lib.const1() } else { lib.const0() };
    let new_node = net.create_node(handle, &[]);
    net.replace(pivot, new_node)?;
    Ok((new_node, 1))
}

/// Builds the replacement for a single-divisor buffer/inverter
/// decomposition. Returns the divisor itself (no gate added) for a buffer.
/// For an inverter, first tries to propagate the inversion directly into
/// every fanout via a complemented-input library variant (scenario S3:
/// the inverter disappears entirely, `gates_added == 0` and the MFFC
/// shrinks by one gate); falls back to materializing a standalone inverter
/// node when any fanout lacks such a variant.
pub fn substitute_unary(net: &mut impl NetworkMut, lib: &impl CellLibrary, window: &Window, pivot: NodeId, divisor_pos: usize, complemented: bool) -> anyhow::Result<(NodeId, u32)> {
    let divisor_id = window.gates[divisor_pos].orig_id;
    if !complemented {
        net.replace(pivot, divisor_id)?;
        return Ok((divisor_id, 0));
    }
    if try_absorb_inverter(net, lib, pivot, divisor_id) {
        net.destroy(pivot);
        return Ok((divisor_id, 0));
    }
    let inv_node = net.create_node(lib.inv(), &[divisor_id]);
    net.replace(pivot, inv_node)?;
    Ok((inv_node, 1))
}

/// Attempts to push `pivot`'s (an inverter of `divisor_id`) inversion into
/// every one of its fanouts by switching each to a complemented-input
/// library variant at the position `pivot` occupies. Requires every
/// fanout — and `pivot` itself not driving a primary output, since a PO has
/// no gate to absorb into — to support the swap; otherwise makes no change
/// and returns `false` so the caller falls back to a plain inverter node.
fn try_absorb_inverter(net: &mut impl NetworkMut, lib: &impl CellLibrary, pivot: NodeId, divisor_id: NodeId) -> bool {
    if net.is_po_driver(pivot) {
        return false;
    }
    let fanouts = net.fanouts(pivot).to_vec();
    if fanouts.is_empty() {
        return false;
    }
    let mut plan: Vec<(NodeId, GateHandle, Vec<NodeId>)> = Vec::with_capacity(fanouts.len());
    for fo in fanouts {
        let Some(h) = net.data(fo) else { return false };
        let old_fanins = net.fanins(fo).to_vec();
        let Some(input_idx) = old_fanins.iter().position(|&f| f == pivot) else { return false };
        let Some((new_gate, new_idx)) = lib.find_compl_input_gate(h, input_idx as u8) else { return false };
        let new_idx = new_idx as usize;
        let mut new_fanins = old_fanins;
        if new_idx != input_idx {
            new_fanins.swap(input_idx, new_idx);
        }
        new_fanins[new_idx] = divisor_id;
        plan.push((fo, new_gate, new_fanins));
    }
    for (fo, new_gate, new_fanins) in plan {
        net.absorb_input(fo, new_gate, &new_fanins);
    }
    true
}

/// Builds the replacement for a single library-gate area match and rewires
/// the pivot onto it.
pub fn substitute_area_match(net: &mut impl NetworkMut, window: &Window, pivot: NodeId, m: &AreaMatch) -> anyhow::Result<(NodeId, u32)> {
    let fanins: Vec<NodeId> = m.fanins.iter().map(|&p| window.gates[p].orig_id).collect();
    let new_node = net.create_node(m.gate, &fanins);
    net.replace(pivot, new_node)?;
    Ok((new_node, 1))
}

/// Builds the replacement for a one- or two-gate delay match.
pub fn substitute_delay_match(net: &mut impl NetworkMut, window: &Window, pivot: NodeId, m: &ResolvedDelayMatch) -> anyhow::Result<(NodeId, u32)> {
    let fanins1: Vec<NodeId> = m.fanins1.iter().map(|&p| window.gates[p].orig_id).collect();
    let gate1_node = net.create_node(m.gate1, &fanins1);
    let Some((gate2, fanins2)) = &m.gate2 else {
        net.replace(pivot, gate1_node)?;
        return Ok((gate1_node, 1));
    };
    let fanins2: Vec<NodeId> = fanins2
        .iter()
        .map(|src| match src {
            FaninSource::Divisor(p) => window.gates[*p].orig_id,
            FaninSource::Gate1Output => gate1_node,
        })
        .collect();
    let gate2_node = net.create_node(*gate2, &fanins2);
    net.replace(pivot, gate2_node)?;
    Ok((gate2_node, 2))
}

/// Recomputes levels downward from every fanout of `changed_root`,
/// breadth-first, stopping once a node's level no longer needs to increase
/// (a simple fixpoint: spec.md Open Question 3 resolves the dangling-fanout
/// case by just letting nodes with no remaining fanouts drop out of the
/// frontier naturally once their own level stabilizes).
pub fn update_levels(net: &mut impl NetworkMut, changed_root: NodeId) {
    let mut frontier: Vec<NodeId> = net.fanouts(changed_root).to_vec();
    while let Some(id) = frontier.pop() {
        let new_level = net.fanins(id).iter().map(|f| net.level(*f) + 1).max().unwrap_or(0);
        if new_level != net.level(id) {
            net.set_level(id, new_level);
            frontier.extend(net.fanouts(id).iter().copied());
        }
    }
}

/// Turns the new node id produced by a `substitute_*` call, the gate count
/// it added, and which shape the substitution took into an `Outcome`. A
/// thin helper so `engine.rs` doesn't repeat this bookkeeping.
pub fn accepted(new_node: NodeId, gates_added: u32, kind: SubstKind) -> Outcome {
    Outcome::Accepted { new_node, gates_added, kind }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{SimpleLibrary, SimpleNetwork};

    #[test]
    fn mffc_area_counts_dead_subtree_and_restores_refs() {
        let mut net = SimpleNetwork::new();
        let a = net.add_pi();
        let b = net.add_pi();
        let and1 = net.add_and(a, b);
        let inv1 = net.add_inv(and1);
        net.mark_po(inv1);
        let lib = SimpleLibrary::new();
        let before = net.ref_count(and1);
        let area = mffc_area(&mut net, &lib, inv1);
        assert_eq!(area, lib.gate(crate::testutil::G_INV).area + lib.gate(crate::testutil::G_AND2).area);
        assert_eq!(net.ref_count(and1), before, "ref/deref must restore ref counts");
    }

    #[test]
    fn substitute_unary_buffer_reuses_divisor_with_no_new_gate() {
        let mut net = SimpleNetwork::new();
        let a = net.add_pi();
        let b = net.add_pi();
        let and1 = net.add_and(a, b);
        let or1 = net.add_or(and1, b);
        net.mark_po(or1);
        let lib = SimpleLibrary::new();
        let win = crate::window::extract(&net, and1, &Default::default(), &mut crate::window::WindowState::new(), None).expect("window");
        let (new_node, gates_added) = substitute_unary(&mut net, &lib, &win, and1, 1, false).expect("substitute");
        assert_eq!(new_node, b);
        assert_eq!(gates_added, 0);
    }

    /// Scenario S3 (inverter absorption): an inverter feeding a NAND2 and an
    /// OR2, both of which have a complemented-input variant in the library.
    /// The inverter must disappear entirely — no inverter node left behind,
    /// both fanouts flipped in place to their complemented-input gate — with
    /// the network's function on both fanouts unchanged.
    #[test]
    fn substitute_unary_absorbs_inverter_into_every_fanout() {
        let mut net = SimpleNetwork::new();
        let a = net.add_pi();
        let b = net.add_pi();
        let c = net.add_pi();
        let inv1 = net.add_inv(a);
        let nand1 = net.add_nand(inv1, b);
        let or1 = net.add_or(inv1, c);
        net.mark_po(nand1);
        net.mark_po(or1);
        let lib = SimpleLibrary::new();

        let before_nand = net.simulate_exhaustive(&lib, nand1, &[a, b, c]);
        let before_or = net.simulate_exhaustive(&lib, or1, &[a, b, c]);

        let win = crate::window::extract(&net, inv1, &Default::default(), &mut crate::window::WindowState::new(), None).expect("window");
        let divisor_pos = win.gates[..win.n_divs].iter().position(|g| g.orig_id == a).expect("a is a divisor of inv1's window");
        let (new_node, gates_added) = substitute_unary(&mut net, &lib, &win, inv1, divisor_pos, true).expect("substitute");

        assert_eq!(new_node, a, "the inverter's replacement is the divisor itself, not a fresh node");
        assert_eq!(gates_added, 0, "absorbing into both fanouts must add no gate");
        assert!(net.fanins(nand1).contains(&a) && !net.fanins(nand1).contains(&inv1));
        assert!(net.fanins(or1).contains(&a) && !net.fanins(or1).contains(&inv1));

        let after_nand = net.simulate_exhaustive(&lib, nand1, &[a, b, c]);
        let after_or = net.simulate_exhaustive(&lib, or1, &[a, b, c]);
        assert_eq!(before_nand.bits(), after_nand.bits(), "absorption must not change nand1's function");
        assert_eq!(before_or.bits(), after_or.bits(), "absorption must not change or1's function");
    }
}
