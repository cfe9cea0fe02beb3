//! The `Network` collaborator contract (spec.md §6).
//!
//! The mapped-network container itself — DAG storage, fanout maintenance,
//! topological levels — is out of scope for this crate (spec.md §1): the
//! engine only ever talks to a caller-supplied implementation of the
//! [`Network`] trait. [`NodeId`] is the stable handle it deals in.

use crate::library::GateHandle;

/// A stable integer id identifying a gate in the caller's network.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(id: u32) -> Self {
        NodeId(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for NodeId {
    fn from(v: u32) -> Self {
        NodeId(v)
    }
}

/// Read-only queries the engine needs over the mapped network.
///
/// A `NodeId` with no library handle (`data` returns `None`) is a primary
/// input / leaf; the window extractor treats it as a divisor directly.
pub trait Network {
    /// Ordered fanin ids of `id` (empty for a primary input).
    fn fanins(&self, id: NodeId) -> &[NodeId];
    /// Fanout ids of `id`, in no particular order.
    fn fanouts(&self, id: NodeId) -> &[NodeId];
    /// Topological level (longest path from any primary input).
    fn level(&self, id: NodeId) -> u32;
    /// The library gate realizing `id`, or `None` for a primary input.
    fn data(&self, id: NodeId) -> Option<GateHandle>;
    /// `true` if `id` drives a primary output directly.
    fn is_po_driver(&self, id: NodeId) -> bool;

    /// Monotonically increasing traversal counter, bumped once per window
    /// (or other bounded traversal) so visited-marking can use
    /// `is_trav_current`/`set_trav_current` instead of a full reset.
    fn inc_trav_id(&mut self) -> u32;
    fn is_trav_current(&self, id: NodeId) -> bool;
    fn set_trav_current(&mut self, id: NodeId);
}

/// Mutation primitives the engine invokes on accept.
pub trait NetworkMut: Network {
    /// Allocate a new gate with the given library handle and ordered
    /// fanins, returning its fresh id. The new node is *not* wired into any
    /// fanout lists yet.
    fn create_node(&mut self, gate: GateHandle, fanins: &[NodeId]) -> NodeId;

    /// Redirect every fanout of `old` to `new_root` instead, then destroy
    /// `old` and any now-unreferenced node transitively feeding only `old`
    /// (its former MFFC). Must preserve network acyclicity.
    fn replace(&mut self, old: NodeId, new_root: NodeId) -> anyhow::Result<()>;

    /// Destroy an unreferenced node outright (used when area bookkeeping
    /// determines a node has zero fanouts left).
    fn destroy(&mut self, id: NodeId);

    fn set_level(&mut self, id: NodeId, level: u32);

    /// Bump the fanout-count of `id` by `delta` (positive or negative) for
    /// the duration of an MFFC ref/deref pass; does not mutate the real
    /// fanout list.
    fn bump_ref(&mut self, id: NodeId, delta: i32) -> u32;
    fn ref_count(&self, id: NodeId) -> u32;

    /// Swaps `node`'s gate to `new_gate` and its full fanin list to
    /// `new_fanins` (same arity, reordered/replaced in place; no new node
    /// id). Used to propagate an inverter directly into a fanout via a
    /// complemented-input library variant instead of materializing a
    /// standalone inverter node (spec.md §4.6, scenario S3). Must update
    /// the fanout list of every old and new fanin whose edge to `node`
    /// actually changed.
    fn absorb_input(&mut self, node: NodeId, new_gate: GateHandle, new_fanins: &[NodeId]);
}
