//! Tunable parameters for a resynthesis run.
//!
//! Mirrors the teacher's `CircuitConfig` pattern (plain data struct with a
//! `Default` impl carrying every documented default, plus `with_*` setters
//! for the handful of fields callers are expected to override).

/// Window-shape, decomposition, and acceptance parameters for one
/// `rewrite_area`/`rewrite_delay` pass. See spec.md §6 for the meaning of
/// each field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Params {
    /// Max level increase, forward from the pivot, the TFO cone will reach into.
    pub n_tfo_lev_max: u32,
    /// Max level decrease, backward from the pivot, the TFI cone will reach into.
    pub n_tfi_lev_max: u32,
    /// Fanout-count bound for descending through a node while collecting TFO.
    pub n_fanout_max: u32,
    /// Minimum MFFC size a pivot must have to be attempted.
    pub n_mffc_min: u32,
    /// Maximum MFFC size tracked / new gates budget.
    pub n_mffc_max: u32,
    /// Maximum support size carried through decomposition (`nVarMax <= 6`).
    pub n_var_max: u8,
    /// Number of decomposition attempts per pivot.
    pub n_dec_max: u32,
    /// Maximum window size before a pivot is skipped (0 = use SFM_WIN_MAX).
    pub n_win_size_max: u32,
    /// Level-increase tolerance on accept, in delay mode.
    pub n_growth_level: u32,
    /// SAT conflict budget per call (0 = unbounded).
    pub n_bt_limit: u32,
    /// Percentage of nodes considered per delay-mode priority batch.
    pub n_time_win: u32,
    /// Critical-path window in delay mode, in picoseconds. `None` means
    /// "5/2 times the library's max inverter delay", resolved by the
    /// caller once the library is known.
    pub delta_crit: Option<i64>,

    pub f_area: bool,
    pub f_area_rev: bool,
    pub f_rr_only: bool,
    pub f_use_and_or: bool,
    pub f_zero_cost: bool,
    pub f_more_effort: bool,
    pub f_use_sim: bool,
    pub f_verbose: bool,
    pub f_very_verbose: bool,
    pub f_lib_verbose: bool,
    pub f_delay_verbose: bool,
    pub f_print_decs: bool,

    /// Debug: optimize only this node id.
    pub i_node_one: Option<u32>,
    /// Cap on the number of gates processed (0 = unbounded).
    pub n_nodes_max: u32,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            n_tfo_lev_max: 100,
            n_tfi_lev_max: 100,
            n_fanout_max: 30,
            n_mffc_min: 1,
            n_mffc_max: 3,
            n_var_max: 6,
            n_dec_max: 1,
            n_win_size_max: 0,
            n_growth_level: 0,
            n_bt_limit: 0,
            n_time_win: 1,
            delta_crit: None,
            f_area: true,
            f_area_rev: false,
            f_rr_only: false,
            f_use_and_or: false,
            f_zero_cost: false,
            f_more_effort: false,
            f_use_sim: true,
            f_verbose: false,
            f_very_verbose: false,
            f_lib_verbose: false,
            f_delay_verbose: false,
            f_print_decs: false,
            i_node_one: None,
            n_nodes_max: 0,
        }
    }
}

impl Params {
    pub fn builder() -> ParamsBuilder {
        ParamsBuilder(Params::default())
    }
}

/// Fluent builder over [`Params`], for the common case of overriding a few
/// fields without writing out a full struct literal.
#[derive(Clone, Debug, Default)]
pub struct ParamsBuilder(Params);

macro_rules! setter {
    ($name:ident, $field:ident, $ty:ty) => {
        pub fn $name(mut self, v: $ty) -> Self {
            self.0.$field = v;
            self
        }
    };
}

impl ParamsBuilder {
    setter!(n_tfo_lev_max, n_tfo_lev_max, u32);
    setter!(n_tfi_lev_max, n_tfi_lev_max, u32);
    setter!(n_fanout_max, n_fanout_max, u32);
    setter!(n_mffc_min, n_mffc_min, u32);
    setter!(n_mffc_max, n_mffc_max, u32);
    setter!(n_var_max, n_var_max, u8);
    setter!(n_dec_max, n_dec_max, u32);
    setter!(n_bt_limit, n_bt_limit, u32);
    setter!(n_nodes_max, n_nodes_max, u32);
    setter!(f_area, f_area, bool);
    setter!(f_area_rev, f_area_rev, bool);
    setter!(f_use_and_or, f_use_and_or, bool);
    setter!(f_zero_cost, f_zero_cost, bool);
    setter!(f_more_effort, f_more_effort, bool);
    setter!(f_use_sim, f_use_sim, bool);
    setter!(f_verbose, f_verbose, bool);

    pub fn build(self) -> Params {
        self.0
    }
}

/// Resource bounds that are constants, not tunables (spec.md §5).
pub mod limits {
    /// Maximum window gates (`SFM_WIN_MAX`).
    pub const SFM_WIN_MAX: usize = 128;
    /// Maximum support variables per truth table (`SFM_SUPP_MAX`).
    pub const SFM_SUPP_MAX: usize = 16;
    /// Maximum recorded counter-example patterns per polarity.
    pub const SFM_PAT_MAX: usize = 64;
}
