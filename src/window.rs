//! Window Extractor (spec.md §4.1): for a pivot gate, collects TFI, a
//! bounded TFO cone, the pivot's MFFC, and assembles the ordered divisor
//! list and window gate list the rest of the engine works over.

use hashbrown::HashMap;
use itertools::Itertools;

use crate::error::Outcome;
use crate::library::GateHandle;
use crate::network::{Network, NodeId};
use crate::params::{limits, Params};
use crate::timing::TimingEngine;

pub mod role {
    pub const PI: u8 = 1;
    pub const INPUT: u8 = 2;
    pub const FANIN: u8 = 4;
    pub const MFFC: u8 = 8;
    pub const PIVOT: u8 = 16;
}

/// One entry in the window's gate list `W`. `gate = None` marks a sentinel
/// leaf (a primary input or a divisor promoted to FANIN) — such entries
/// carry no fanins of their own within `W`.
#[derive(Clone, Debug)]
pub struct WinGate {
    pub gate: Option<GateHandle>,
    /// Fanin positions within `W`, in the original fanin order.
    pub fanins: Vec<usize>,
    /// The network id this entry stands for, kept for the accept phase's
    /// id remap back into the real network.
    pub orig_id: NodeId,
}

/// The ephemeral per-pivot window: divisors, window gate list, roots, and
/// MFFC, all indexed by position in `gates` (the `W` list of spec.md §3).
#[derive(Clone, Debug)]
pub struct Window {
    /// `gates[0..n_divs]` are exactly the divisor leaves, in order.
    pub n_divs: usize,
    pub gates: Vec<WinGate>,
    /// Position of the pivot within `gates`.
    pub i_target: usize,
    /// Count of entries up to and including the pivot; entries beyond this
    /// are the TFO cone.
    pub tfi_size: usize,
    /// Positions in `gates` that are externally-observed TFO exits.
    pub roots: Vec<usize>,
    /// Positions in `gates` that die when the pivot is removed.
    pub mffc: Vec<usize>,
    /// Divisor positions (< n_divs) feeding directly into the MFFC.
    pub in_mffc: Vec<usize>,
}

impl Window {
    pub fn divisor_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.gates[..self.n_divs].iter().map(|g| g.orig_id)
    }
}

/// Reusable scratch state for window extraction, owned by the engine and
/// cleared before each pivot — never stored on the network itself (Design
/// Notes §9).
#[derive(Default)]
pub struct WindowState {
    roles: HashMap<NodeId, u8>,
    tfo_set: HashMap<NodeId, ()>,
    order: Vec<NodeId>,
}

impl WindowState {
    pub fn new() -> Self {
        WindowState::default()
    }

    fn clear(&mut self) {
        self.roles.clear();
        self.tfo_set.clear();
        self.order.clear();
    }

    fn role(&self, id: NodeId) -> u8 {
        self.roles.get(&id).copied().unwrap_or(0)
    }

    fn add_role(&mut self, id: NodeId, bits: u8) {
        *self.roles.entry(id).or_insert(0) |= bits;
    }
}

/// Collects the pivot's TFI/TFO/MFFC and assembles the ordered divisor and
/// window-gate lists. See spec.md §4.1 for the algorithm this follows step
/// by step.
pub fn extract(net: &impl Network, pivot: NodeId, params: &Params, st: &mut WindowState, timing: Option<&dyn TimingEngine>) -> Result<Window, Outcome> {
    st.clear();

    // --- TFO collection: reverse-DFS from pivot, pruning at POs, at level
    // bound, and at fanout-count bound. ---
    let pivot_level = net.level(pivot);
    collect_tfo(net, pivot, params, st);
    if st.tfo_set.is_empty() {
        return Err(Outcome::Skip);
    }

    // --- Root detection: a TFO member is a root iff some fanout escapes
    // the collected set. ---
    let mut roots_ids: Vec<NodeId> = Vec::new();
    for &id in st.tfo_set.keys().collect::<Vec<_>>().iter().copied() {
        let escapes = net.fanouts(id).iter().any(|f| !st.tfo_set.contains_key(f)) || net.is_po_driver(id);
        if escapes {
            roots_ids.push(id);
        }
    }
    if roots_ids.is_empty() {
        roots_ids.push(pivot);
    }

    // --- TFI collection: DFS from pivot down to the level bound; visited
    // nodes get PI. ---
    let tfi_floor = pivot_level.saturating_sub(params.n_tfi_lev_max);
    let mut vtfi: Vec<NodeId> = Vec::new();
    collect_tfi(net, pivot, tfi_floor, st, &mut vtfi);

    // --- TFI(Roots) merge: DFS from each root, labelling INPUT. ---
    for &r in &roots_ids {
        collect_tfi_input(net, r, tfi_floor, st);
    }

    // --- FANIN upgrade: any fanin of a mixed-role TFI node that is exactly
    // INPUT is promoted to FANIN. ---
    for &id in &vtfi.clone() {
        let self_role = st.role(id);
        if self_role & role::INPUT != 0 && self_role & !(role::PI | role::INPUT) == 0 {
            // exclusively (PI|)INPUT nodes do not upgrade their fanins
            continue;
        }
        for &fi in net.fanins(id) {
            if st.role(fi) == role::INPUT {
                st.add_role(fi, role::FANIN);
            }
        }
    }

    // --- MFFC marking: BFS from pivot's fanins, budget n_mffc_max. ---
    let mut mffc_ids: Vec<NodeId> = vec![pivot];
    st.add_role(pivot, role::MFFC | role::PIVOT);
    let mut frontier = net.fanins(pivot).to_vec();
    while let Some(cand) = frontier.first().copied() {
        frontier.remove(0);
        if mffc_ids.len() - 1 >= params.n_mffc_max as usize {
            break;
        }
        let single_fanout = net.fanouts(cand).len() == 1;
        let in_tfi = st.role(cand) & role::PI != 0 || vtfi.contains(&cand);
        let level_ok = net.level(cand) >= tfi_floor;
        if net.data(cand).is_some() && single_fanout && in_tfi && level_ok {
            st.add_role(cand, role::MFFC);
            mffc_ids.push(cand);
            frontier.extend(net.fanins(cand).iter().copied());
        }
    }

    // --- In-MFFC inputs: divisors feeding directly into MFFC nodes. ---
    let in_mffc_ids: Vec<NodeId> = mffc_ids.iter().flat_map(|&m| net.fanins(m).iter().copied()).filter(|&fi| st.role(fi) & role::MFFC == 0).unique().collect();

    // --- Divisor assembly ---
    let mut group_pi: Vec<NodeId> = Vec::new();
    let mut group_mixed: Vec<NodeId> = Vec::new();
    for &id in &vtfi {
        if id == pivot {
            continue;
        }
        let r = st.role(id);
        if r & role::MFFC != 0 {
            continue; // internal to MFFC, not a divisor
        }
        if r & role::PI != 0 && r & role::INPUT == 0 {
            group_pi.push(id);
        } else if (r & role::PI != 0 && r & role::INPUT != 0) || r & role::FANIN != 0 {
            group_mixed.push(id);
        }
    }
    // also admit pure-FANIN nodes that may not be in vtfi (fanins of mixed
    // nodes outside TFI proper)
    for (&id, &r) in st.roles.clone().iter() {
        if r & role::FANIN != 0 && !group_mixed.contains(&id) && !group_pi.contains(&id) {
            group_mixed.push(id);
        }
    }

    // In delay mode, reorder divisors by arrival time (most slack-rich
    // first) and drop any `sort_by_arrival` deems too late to help —
    // mirrors the original's "reorder nodes according to delay" step,
    // which reassigns `nDivs` from the sorted/truncated count.
    let mut divisors: Vec<NodeId> = group_pi.into_iter().chain(group_mixed).collect();
    if let Some(t) = timing {
        let n_keep = t.sort_by_arrival(&mut divisors, pivot);
        divisors.truncate(n_keep);
    }

    let n_divs = divisors.len();
    if n_divs < 2 {
        return Err(Outcome::Skip);
    }

    let mut gates: Vec<WinGate> = Vec::with_capacity(n_divs + mffc_ids.len() + roots_ids.len());
    let mut pos_of: HashMap<NodeId, usize> = HashMap::new();
    for &id in &divisors {
        pos_of.insert(id, gates.len());
        gates.push(WinGate { gate: None, fanins: Vec::new(), orig_id: id });
    }

    // TFI non-divisor interior gates (in topological order, then pivot).
    let mut interior: Vec<NodeId> = vtfi.iter().copied().filter(|id| !pos_of.contains_key(id) && *id != pivot).collect();
    interior.sort_by_key(|id| net.level(*id));
    for &id in &interior {
        pos_of.insert(id, gates.len());
        gates.push(WinGate { gate: net.data(id), fanins: Vec::new(), orig_id: id });
    }
    let i_target = gates.len();
    pos_of.insert(pivot, i_target);
    gates.push(WinGate { gate: net.data(pivot), fanins: Vec::new(), orig_id: pivot });
    let tfi_size = gates.len();

    // TFO nodes beyond the pivot.
    let mut tfo_ordered: Vec<NodeId> = st.tfo_set.keys().copied().filter(|id| *id != pivot).collect();
    tfo_ordered.sort_by_key(|id| net.level(*id));
    for &id in &tfo_ordered {
        pos_of.insert(id, gates.len());
        gates.push(WinGate { gate: net.data(id), fanins: Vec::new(), orig_id: id });
    }

    if gates.len() > params.n_win_size_max.max(limits::SFM_WIN_MAX as u32) as usize {
        return Err(Outcome::Skip);
    }

    // Back-fill fanin positions now that every node has a W position.
    for i in 0..gates.len() {
        let id = gates[i].orig_id;
        if gates[i].gate.is_none() {
            continue;
        }
        let fanins: Vec<usize> = net
            .fanins(id)
            .iter()
            .map(|f| *pos_of.get(f).unwrap_or(&usize::MAX))
            .collect();
        if fanins.iter().any(|&p| p == usize::MAX) {
            // a fanin fell entirely outside the window; treat as Skip
            // rather than silently dropping a clause.
            return Err(Outcome::Skip);
        }
        gates[i].fanins = fanins;
    }

    let roots: Vec<usize> = roots_ids.iter().filter_map(|id| pos_of.get(id).copied()).collect();
    if roots.is_empty() {
        return Err(Outcome::Skip);
    }
    let mffc: Vec<usize> = mffc_ids.iter().filter_map(|id| pos_of.get(id).copied()).collect();
    let in_mffc: Vec<usize> = in_mffc_ids.iter().filter_map(|id| pos_of.get(id).copied()).filter(|p| *p < n_divs).collect();

    Ok(Window { n_divs, gates, i_target, tfi_size, roots, mffc, in_mffc })
}

fn collect_tfo(net: &impl Network, pivot: NodeId, params: &Params, st: &mut WindowState) {
    let pivot_level = net.level(pivot);
    let level_cap = pivot_level + params.n_tfo_lev_max;
    let mut stack = vec![pivot];
    let mut visited: HashMap<NodeId, ()> = HashMap::new();
    visited.insert(pivot, ());
    while let Some(id) = stack.pop() {
        for &fo in net.fanouts(id) {
            if visited.contains_key(&fo) {
                continue;
            }
            visited.insert(fo, ());
            if net.is_po_driver(fo) {
                continue;
            }
            if net.level(fo) > level_cap {
                continue;
            }
            if net.fanouts(fo).len() as u32 > params.n_fanout_max {
                continue;
            }
            st.tfo_set.insert(fo, ());
            stack.push(fo);
        }
    }
}

fn collect_tfi(net: &impl Network, id: NodeId, floor: u32, st: &mut WindowState, out: &mut Vec<NodeId>) {
    if st.role(id) & role::PI != 0 {
        return;
    }
    st.add_role(id, role::PI);
    out.push(id);
    if net.level(id) <= floor {
        return; // leaf: stop descending further, still marked PI
    }
    for &fi in net.fanins(id) {
        collect_tfi(net, fi, floor, st, out);
    }
}

fn collect_tfi_input(net: &impl Network, id: NodeId, floor: u32, st: &mut WindowState) {
    if st.role(id) & role::INPUT != 0 {
        return;
    }
    st.add_role(id, role::INPUT);
    if net.level(id) <= floor {
        return;
    }
    for &fi in net.fanins(id) {
        collect_tfi_input(net, fi, floor, st);
    }
}
