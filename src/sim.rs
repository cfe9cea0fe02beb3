//! Bit-parallel Simulator (spec.md §4.2): a 64-pattern random simulation
//! over the whole network, plus per-window re-simulation of the TFO cone
//! with the pivot's value complemented, which together narrow the SAT
//! work to a care-set mask.

use hashbrown::HashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::library::CellLibrary;
use crate::network::{Network, NodeId};
use crate::params::limits;
use crate::truth::{Pattern64, TruthTable};
use crate::window::Window;

/// Evaluates a library gate's truth table over bit-parallel fanin words by
/// minterm expansion: OR together, across every row whose output bit is 1,
/// the AND of each input literal's pattern (the fanin word or its
/// complement, depending on the row's bit).
pub fn eval_gate_word(truth: &TruthTable, fanin_words: &[Pattern64]) -> Pattern64 {
    debug_assert_eq!(fanin_words.len(), truth.n() as usize);
    let rows = 1u64 << truth.n();
    let mut out = Pattern64::ZERO;
    for row in 0..rows {
        if (truth.bits() >> row) & 1 == 0 {
            continue;
        }
        let mut term = Pattern64::ALL;
        for (i, &w) in fanin_words.iter().enumerate() {
            let bit_set = (row >> i) & 1 == 1;
            term = term & if bit_set { w } else { !w };
        }
        out = out | term;
    }
    out
}

/// Persistent, whole-network simulation state plus the deterministic PRNG
/// used to draw primary-input patterns (seeded once, per spec.md §4.2).
pub struct Simulator {
    rng: ChaCha8Rng,
    sims: HashMap<NodeId, Pattern64>,
}

impl Simulator {
    pub fn new(seed: u64) -> Self {
        Simulator { rng: ChaCha8Rng::seed_from_u64(seed), sims: HashMap::new() }
    }

    /// Value of `id` under the current simulation, computing and caching it
    /// (and its transitive fanins) if not already known. Primary inputs get
    /// a fresh random pattern the first time they are touched.
    pub fn ensure(&mut self, net: &impl Network, lib: &impl CellLibrary, id: NodeId) -> Pattern64 {
        if let Some(&w) = self.sims.get(&id) {
            return w;
        }
        let w = match net.data(id) {
            None => Pattern64::new(self.rng.gen()),
            Some(h) => {
                let fanins = net.fanins(id).to_vec();
                let fanin_words: Vec<Pattern64> = fanins.iter().map(|f| self.ensure(net, lib, *f)).collect();
                eval_gate_word(&lib.gate(h).truth, &fanin_words)
            }
        };
        self.sims.insert(id, w);
        w
    }

    /// The care-set for `window`: patterns where the pivot's value is
    /// observable at some root (spec.md §4.2). Recomputes a parallel
    /// `sims2` only along the window's TFO positions (those after
    /// `i_target`), per Design Notes.
    pub fn care_set(&mut self, net: &impl Network, lib: &impl CellLibrary, window: &Window) -> Pattern64 {
        let pivot_id = window.gates[window.i_target].orig_id;
        let _ = self.ensure(net, lib, pivot_id);
        let mut sims2: HashMap<NodeId, Pattern64> = HashMap::new();
        sims2.insert(pivot_id, !self.sims[&pivot_id]);

        for pos in (window.i_target + 1)..window.gates.len() {
            let entry = &window.gates[pos];
            let id = entry.orig_id;
            let Some(h) = entry.gate else {
                // TFO positions are always real gates, never sentinels.
                continue;
            };
            let fanin_words: Vec<Pattern64> = entry
                .fanins
                .iter()
                .map(|&fp| {
                    let fid = window.gates[fp].orig_id;
                    sims2.get(&fid).copied().unwrap_or_else(|| self.ensure(net, lib, fid))
                })
                .collect();
            let w = eval_gate_word(&lib.gate(h).truth, &fanin_words);
            sims2.insert(id, w);
        }

        let mut care = Pattern64::ZERO;
        for &r in &window.roots {
            let rid = window.gates[r].orig_id;
            let s1 = self.ensure(net, lib, rid);
            let s2 = sims2.get(&rid).copied().unwrap_or(s1);
            care = care | (s1 ^ s2);
        }
        care
    }

    /// Partitions the care-set's one-bits into on-set/off-set pattern
    /// buffers, capping each side at 24 (spec.md §4.2 "Setup").
    pub fn setup(&mut self, net: &impl Network, lib: &impl CellLibrary, window: &Window, care: Pattern64) -> PatternBuffers {
        let mut buf = PatternBuffers::new(window.n_divs);
        let pivot_id = window.gates[window.i_target].orig_id;
        let pivot_val = self.ensure(net, lib, pivot_id);
        const SETUP_CAP: usize = 24;
        for bitpos in care.iter_ones() {
            let c = usize::from(pivot_val.bit(bitpos));
            if buf.n_pats[c] >= SETUP_CAP {
                continue;
            }
            let divisor_vals: Vec<bool> = window.divisor_ids().map(|d| self.ensure(net, lib, d).bit(bitpos)).collect();
            buf.push_pattern(c, &divisor_vals)
                .expect("setup never exceeds the 64-pattern cap given a 24-per-side budget");
        }
        buf
    }

    /// Merges the window's final pattern columns back into the persistent
    /// simulation vectors, masked to 32 bits per side and overwriting the
    /// low/high halves of each divisor's word (spec.md §4.2 "Setdown" —
    /// the active truncating strategy, per Open Question 2 in SPEC_FULL.md).
    pub fn setdown(&mut self, window: &Window, buf: &PatternBuffers) {
        for d_pos in 0..window.n_divs {
            let id = window.gates[d_pos].orig_id;
            let mut w = self.sims.get(&id).copied().unwrap_or(Pattern64::ZERO);
            let low = buf.v_sets[0][d_pos].0 & 0xFFFF_FFFF;
            let high = buf.v_sets[1][d_pos].0 & 0xFFFF_FFFF;
            w.0 = (w.0 & !0xFFFF_FFFFu64) | low;
            w.0 = (w.0 & 0xFFFF_FFFF) | (high << 32);
            self.sims.insert(id, w);
        }
    }
}

/// Per-window, per-polarity pattern buffers (spec.md §3): counter-example
/// patterns recorded while searching for divisors that imply the pivot's
/// value, shared by the Simulator's setup pass and the Decomposition
/// Engine.
#[derive(Clone, Debug)]
pub struct PatternBuffers {
    pub n_pats: [usize; 2],
    pub u_mask: [Pattern64; 2],
    /// `v_sets[c][d]`: divisor `d`'s value under each recorded pattern for
    /// polarity `c`.
    pub v_sets: [Vec<Pattern64>; 2],
    pub v_impls: [Vec<crate::sat::Lit>; 2],
}

impl PatternBuffers {
    pub fn new(n_divs: usize) -> Self {
        PatternBuffers {
            n_pats: [0, 0],
            u_mask: [Pattern64::ZERO, Pattern64::ZERO],
            v_sets: [vec![Pattern64::ZERO; n_divs], vec![Pattern64::ZERO; n_divs]],
            v_impls: [Vec::new(), Vec::new()],
        }
    }

    /// Appends one pattern (a column of per-divisor booleans) to side `c`.
    /// Returns `Err(())` if doing so would exceed the 64-pattern cap
    /// (Property 8 of spec.md §8).
    pub fn push_pattern(&mut self, c: usize, divisor_vals: &[bool]) -> Result<(), ()> {
        if self.n_pats[c] >= limits::SFM_PAT_MAX {
            return Err(());
        }
        let idx = self.n_pats[c] as u32;
        for (d, &v) in divisor_vals.iter().enumerate() {
            self.v_sets[c][d].set_bit(idx, v);
        }
        self.u_mask[c].set_bit(idx, true);
        self.n_pats[c] += 1;
        Ok(())
    }
}
