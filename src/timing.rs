//! The `TimingEngine` collaborator contract (spec.md §6), used only by the
//! delay-mode driver loop and `delay_opt_one`.

use crate::library::{DelayMatch, GateHandle};
use crate::network::NodeId;

/// Arrival-time bookkeeping the delay-mode driver and `delay_opt_one` call
/// into. Maintaining arrival/slack incrementally as the network mutates is
/// out of scope for this crate (spec.md §1); the engine only reads and
/// writes through this trait.
pub trait TimingEngine {
    fn start(&mut self);
    fn stop(&mut self);

    /// Current arrival time at the network's latest primary output.
    fn read_ntk_delay(&self) -> i64;
    fn read_obj_delay(&self, id: NodeId) -> i64;

    /// Up to `n_time_win` percent of nodes, ordered by increasing slack
    /// (most critical first). Returns an empty list when no further batch
    /// is worth trying.
    fn priority_nodes(&self, n_time_win_pct: u32) -> Vec<NodeId>;

    /// Stably reorders `divisors` by arrival time (ascending), returning
    /// the (possibly reduced) count to actually use as `nDivsNew`.
    fn sort_by_arrival(&self, divisors: &mut Vec<NodeId>, pivot: NodeId) -> usize;

    /// `true` if replacing `pivot` cannot possibly help `obj`'s arrival
    /// (already far from critical).
    fn node_is_non_critical(&self, pivot: NodeId, obj: NodeId) -> bool;

    /// Arrival time at the pivot's fanout interface if it were replaced by
    /// the given one- or two-gate realization over `fanins` (mapped
    /// through `div_map`, arrival times of divisors assumed already
    /// known).
    fn eval_remapping(&self, fanins: &[NodeId], div_map: &[u8], realization: &DelayMatch) -> i64;

    /// Rerun an incremental arrival/slack pass seeded from the given newly
    /// created node ids.
    fn update_timing(&mut self, new_ids: &[NodeId]);
}

/// A realization candidate scored by [`TimingEngine::eval_remapping`],
/// paired with the library match it came from, used by `delay_opt_one`.
#[derive(Clone, Debug)]
pub struct ScoredMatch {
    pub matched: DelayMatch,
    pub arrival: i64,
}

/// Standalone identity buffer truth value (`0x55..` on any support size),
/// used by `delay_opt_one`'s "reject trivial buffers" rule.
pub fn is_identity_buffer(gate1: GateHandle, gate2: Option<GateHandle>, inv: GateHandle, buf: GateHandle) -> bool {
    gate2.is_none() && (gate1 == buf || gate1 == inv)
}
