//! SAT-based don't-care-aware resynthesis for mapped combinational logic
//! networks.
//!
//! A caller provides a mapped network (implementing [`Network`] /
//! [`NetworkMut`]), a cell library ([`CellLibrary`]), a CDCL solver
//! ([`SatSolver`]), and — for delay-driven passes — a timing engine
//! ([`TimingEngine`]). This crate owns none of those containers; it only
//! drives the window-extraction, simulation, CNF-encoding, SAT-based
//! decomposition, library-matching, and network-rewrite pipeline over
//! whatever the caller hands it.
//!
//! The two entry points are [`engine::rewrite_area`] (area-recovery pass,
//! every node a candidate) and [`engine::rewrite_delay`] (timing-driven
//! pass, worked in priority-window batches). Single-node variants
//! ([`engine::area_opt_one`], [`engine::delay_opt_one`]) are exposed for
//! callers that want to drive their own node order.

pub mod accept;
pub mod cnf;
pub mod decomp;
pub mod engine;
pub mod error;
pub mod library;
pub mod matcher;
pub mod network;
pub mod params;
pub mod profile;
pub mod sat;
pub mod sim;
pub mod timing;
pub mod truth;
pub mod window;

// Exposed under a feature flag (rather than `#[cfg(test)]` alone) so the
// `tests/` integration binaries — separate crates from this one — can
// build fixtures against the same `SimpleNetwork` / `SimpleLibrary` /
// `NaiveSolver` the unit tests use.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use engine::{area_opt_one, delay_opt_one, rewrite_area, rewrite_delay};
pub use error::{Outcome, Stats, SubstKind};
pub use library::CellLibrary;
pub use network::{Network, NetworkMut, NodeId};
pub use params::{Params, ParamsBuilder};
pub use sat::SatSolver;
pub use sim::Simulator;
pub use timing::TimingEngine;
pub use truth::TruthTable;
pub use window::{Window, WindowState};
