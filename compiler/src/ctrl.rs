// ctrl.rs — Per-slot control vector derivation
//
// Compiles a MAC's finalized slot maps into the ten parallel control arrays
// the hardware pipeline consumes, one entry per time slot. FIFO numbers index
// the layout planner's sorted descriptor table, so the control arrays and the
// emitted FIFO/coefficient tables agree.
//
// Preconditions: `mac` comes from a fully bound engine; `layout` is its
//                planned FIFO layout.
// Postconditions: every array has one entry per time slot, within its field
//                 width.
// Failure modes: none (a slot map referencing an unknown FIR is a defect and
//                panics).
// Side effects: none.

use serde::Serialize;

use crate::bind::MacState;
use crate::layout::FifoLayout;

// ── Field widths ────────────────────────────────────────────────────────────

pub const CHANNEL_SELECT_BITS: u32 = 4;
pub const FIRST_ENGINE_BITS: u32 = 1;
pub const LAST_ENGINE_BITS: u32 = 1;
pub const FIRST_TAP_BITS: u32 = 1;
pub const PRE_ADD_MODE_BITS: u32 = 4;
pub const MUL_MODE_BITS: u32 = 4;
pub const ADD_PREV_ENGINE_ACCUM_BITS: u32 = 1;
pub const RD_FIFO_NUM_BITS: u32 = 8;
pub const UPDATE_FIFO_NUM_BITS: u32 = 8;
pub const DO_UPDATE_BITS: u32 = 1;

/// Channel-select value meaning "no channel".
pub const CHANNEL_NONE: u32 = 0xF;

/// Multiplier mode: start a fresh accumulation.
pub const MUL_MODE_MUL: u32 = 0;
/// Multiplier mode: multiply-accumulate.
pub const MUL_MODE_MADD: u32 = 1;

// ── Control vectors ─────────────────────────────────────────────────────────

/// The ten per-slot control arrays of one MAC, indexed by absolute time slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlVectors {
    /// Input channel to sample at this slot (0xF = none). Non-default only
    /// on update slots.
    pub channel_select: Vec<u32>,
    /// 1 when updating the first engine of a chain. With single-MAC FIRs the
    /// first and last engine are always this one.
    pub first_engine: Vec<u32>,
    /// 1 when updating the last engine of a chain.
    pub last_engine: Vec<u32>,
    /// 1 on the slot multiplying tap 0 of a FIR.
    pub first_tap: Vec<u32>,
    /// Pre-adder mode; the pre-adder is unused.
    pub pre_add_mode: Vec<u32>,
    /// 0 (fresh multiply) on tap-0 slots, 1 (accumulate) elsewhere.
    pub mul_mode: Vec<u32>,
    /// Chain-accumulator import; unused.
    pub add_prev_engine_accum: Vec<u32>,
    /// FIFO number read at this slot, in layout order.
    pub rd_fifo_num: Vec<u32>,
    /// FIFO number updated at this slot, in layout order.
    pub update_fifo_num: Vec<u32>,
    /// 1 on every update slot.
    pub do_update: Vec<u32>,
}

/// Derive the control vectors of one MAC from its slot maps and FIFO layout.
pub fn derive_control_vectors(mac: &MacState, layout: &FifoLayout) -> ControlVectors {
    let n = mac.num_time_slots() as usize;

    let mut channel_select = vec![CHANNEL_NONE; n];
    let mut first_engine = vec![0u32; n];
    let mut last_engine = vec![0u32; n];
    let mut first_tap = vec![0u32; n];
    let pre_add_mode = vec![0u32; n];
    let mut mul_mode = vec![MUL_MODE_MADD; n];
    let add_prev_engine_accum = vec![0u32; n];
    let mut rd_fifo_num = vec![0u32; n];
    let mut update_fifo_num = vec![0u32; n];
    let mut do_update = vec![0u32; n];

    for (slot, entry) in mac.update_slots.iter().enumerate() {
        let Some(fir) = entry else { continue };
        let channel = mac
            .input_index_of(*fir)
            .expect("update slot refers to a FIR that is not an input");
        let fifo = layout
            .fifo_index_of(*fir)
            .expect("update slot refers to a FIR without a FIFO");
        channel_select[slot] = channel as u32;
        first_engine[slot] = 1;
        last_engine[slot] = 1;
        update_fifo_num[slot] = fifo as u32;
        do_update[slot] = 1;
    }

    for (slot, entry) in mac.coeff_slots.iter().enumerate() {
        let Some(tap) = entry else { continue };
        let fifo = layout
            .fifo_index_of(tap.fir)
            .expect("coefficient slot refers to a FIR without a FIFO");
        rd_fifo_num[slot] = fifo as u32;
        if tap.tap == 0 {
            first_tap[slot] = 1;
            mul_mode[slot] = MUL_MODE_MUL;
        }
    }

    ControlVectors {
        channel_select,
        first_engine,
        last_engine,
        first_tap,
        pre_add_mode,
        mul_mode,
        add_prev_engine_accum,
        rd_fifo_num,
        update_fifo_num,
        do_update,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
