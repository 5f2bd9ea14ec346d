// lower.rs — Per-MAC lowering of the bound schedule
//
// Runs the layout planner, coefficient encoder, and control-vector deriver
// once per MAC and bundles the results into the `LoweredEngine` the renderers
// consume. All numeric artifacts here are bit-exact deliverables.
//
// Preconditions: binding is complete for every FIR; `engine` is read-only.
// Postconditions: one `LoweredMac` per MAC with consistent table sizes,
//                 verified by the L1-L3 obligations.
// Failure modes: planner/encoder range violations propagate as error
//                diagnostics; no partial lowering is returned.
// Side effects: none.

use serde::Serialize;

use crate::ast::Span;
use crate::bind::BoundEngine;
use crate::coeff::coeff_table;
use crate::ctrl::{derive_control_vectors, ControlVectors};
use crate::diag::Diagnostic;
use crate::id::{FirId, MacId};
use crate::layout::{plan_layout, FifoLayout};
use crate::pass::StageCert;
use crate::spec::EngineSpec;

// ── Lowered artifacts ───────────────────────────────────────────────────────

/// Everything the renderers need for one MAC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoweredMac {
    pub mac: MacId,
    /// Input port order (FIR indices).
    pub input_firs: Vec<FirId>,
    /// Output port order; mirrors the inputs while FIRs stay single-MAC.
    pub output_firs: Vec<FirId>,
    pub ctrl: ControlVectors,
    pub fifo_layout: FifoLayout,
    /// Packed 16-bit FIFO descriptors, in layout order.
    pub fifo_table: Vec<u16>,
    /// 18-bit coefficient memory image.
    pub coeff_table: Vec<u32>,
}

/// The complete lowered engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoweredEngine {
    pub num_firs: u32,
    pub num_macs: u32,
    pub num_time_slots: u32,
    pub macs: Vec<LoweredMac>,
}

/// Result of lowering: the artifacts, or diagnostics explaining why not.
#[derive(Debug)]
pub struct LowerResult {
    pub lowered: Option<LoweredEngine>,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Lower every MAC of a bound engine.
///
/// `span` is attached to range-violation diagnostics (the bound schedule has
/// no source spans of its own).
pub fn lower(spec: &EngineSpec, engine: &BoundEngine, span: Span) -> LowerResult {
    let mut macs = Vec::with_capacity(engine.macs.len());

    for (index, mac) in engine.macs.iter().enumerate() {
        let mac_id = MacId(index as u32);
        let fifo_layout = match plan_layout(mac, mac_id, span) {
            Ok(layout) => layout,
            Err(diag) => {
                return LowerResult {
                    lowered: None,
                    diagnostics: vec![diag],
                }
            }
        };
        let coeffs = match coeff_table(spec, mac, &fifo_layout, mac_id, span) {
            Ok(table) => table,
            Err(diag) => {
                return LowerResult {
                    lowered: None,
                    diagnostics: vec![diag],
                }
            }
        };
        let ctrl = derive_control_vectors(mac, &fifo_layout);
        macs.push(LoweredMac {
            mac: mac_id,
            input_firs: mac.input_firs.clone(),
            output_firs: mac.output_firs.clone(),
            ctrl,
            fifo_table: fifo_layout.packed_table(),
            fifo_layout,
            coeff_table: coeffs,
        });
    }

    LowerResult {
        lowered: Some(LoweredEngine {
            num_firs: engine.num_firs,
            num_macs: engine.num_macs(),
            num_time_slots: engine.num_time_slots,
            macs,
        }),
        diagnostics: Vec::new(),
    }
}

// ── Verification ────────────────────────────────────────────────────────────

/// Machine-checkable evidence for lowering postconditions (L1-L3).
#[derive(Debug, Clone)]
pub struct LowerCert {
    /// L1: every FIFO offset is a multiple of its size and ranges are disjoint.
    pub l1_layout_aligned_disjoint: bool,
    /// L2: every table has the size its MAC requires.
    pub l2_table_sizes_consistent: bool,
    /// L3: every bound FIR has exactly one FIFO entry on its MAC.
    pub l3_every_fir_has_fifo: bool,
}

impl StageCert for LowerCert {
    fn all_pass(&self) -> bool {
        self.l1_layout_aligned_disjoint
            && self.l2_table_sizes_consistent
            && self.l3_every_fir_has_fifo
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("L1_layout_aligned_disjoint", self.l1_layout_aligned_disjoint),
            ("L2_table_sizes_consistent", self.l2_table_sizes_consistent),
            ("L3_every_fir_has_fifo", self.l3_every_fir_has_fifo),
        ]
    }
}

/// Verify lowering postconditions.
pub fn verify_lower(engine: &BoundEngine, lowered: &LoweredEngine) -> LowerCert {
    LowerCert {
        l1_layout_aligned_disjoint: verify_l1(lowered),
        l2_table_sizes_consistent: verify_l2(lowered),
        l3_every_fir_has_fifo: verify_l3(engine, lowered),
    }
}

fn verify_l1(lowered: &LoweredEngine) -> bool {
    for mac in &lowered.macs {
        let mut ranges: Vec<(u32, u32)> = Vec::new();
        for entry in &mac.fifo_layout.entries {
            if entry.mem_words == 0 || entry.offset % entry.mem_words != 0 {
                return false;
            }
            ranges.push((entry.offset, entry.offset + entry.mem_words));
        }
        ranges.sort_unstable();
        if ranges.windows(2).any(|pair| pair[0].1 > pair[1].0) {
            return false;
        }
    }
    true
}

fn verify_l2(lowered: &LoweredEngine) -> bool {
    let n = lowered.num_time_slots as usize;
    lowered.macs.iter().all(|mac| {
        let ctrl = &mac.ctrl;
        ctrl.channel_select.len() == n
            && ctrl.first_engine.len() == n
            && ctrl.last_engine.len() == n
            && ctrl.first_tap.len() == n
            && ctrl.pre_add_mode.len() == n
            && ctrl.mul_mode.len() == n
            && ctrl.add_prev_engine_accum.len() == n
            && ctrl.rd_fifo_num.len() == n
            && ctrl.update_fifo_num.len() == n
            && ctrl.do_update.len() == n
            && mac.fifo_table.len() == mac.fifo_layout.entries.len()
            && mac.coeff_table.len() == mac.fifo_layout.mem_words_total as usize
    })
}

fn verify_l3(engine: &BoundEngine, lowered: &LoweredEngine) -> bool {
    if engine.macs.len() != lowered.macs.len() {
        return false;
    }
    engine.macs.iter().zip(&lowered.macs).all(|(bound, low)| {
        bound.input_firs.len() == low.fifo_layout.entries.len()
            && bound
                .input_firs
                .iter()
                .all(|&fir| low.fifo_layout.fifo_index_of(fir).is_some())
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::bind;
    use crate::spec::{EngineParams, EngineSpec, FirSpec};
    use chumsky::span::Span as _;

    fn dummy_span() -> Span {
        Span::new((), 0..0)
    }

    fn two_filter_spec() -> EngineSpec {
        EngineSpec {
            params: EngineParams {
                clock_freq: 400.0,
                num_time_slots: 16,
            },
            firs: vec![
                FirSpec {
                    sample_rate: 50,
                    coeffs: vec![0.25, 0.5, 0.25, 0.125],
                    span: dummy_span(),
                },
                FirSpec {
                    sample_rate: 50,
                    coeffs: vec![0.5, 0.5],
                    span: dummy_span(),
                },
            ],
        }
    }

    fn lower_ok(spec: &EngineSpec) -> (BoundEngine, LoweredEngine) {
        let engine = bind(spec).engine.expect("bind failed");
        let result = lower(spec, &engine, dummy_span());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let lowered = result.lowered.expect("lowering failed");
        (engine, lowered)
    }

    #[test]
    fn lowers_every_mac() {
        let spec = two_filter_spec();
        let (engine, lowered) = lower_ok(&spec);
        assert_eq!(lowered.num_macs, engine.num_macs());
        assert_eq!(lowered.num_firs, 2);
        assert_eq!(lowered.macs.len(), engine.macs.len());
    }

    #[test]
    fn cert_passes_on_lowered_engine() {
        let spec = two_filter_spec();
        let (engine, lowered) = lower_ok(&spec);
        let cert = verify_lower(&engine, &lowered);
        assert!(cert.all_pass(), "cert failed: {:?}", cert.obligations());
    }

    #[test]
    fn fifo_table_matches_layout() {
        let spec = two_filter_spec();
        let (_, lowered) = lower_ok(&spec);
        let mac = &lowered.macs[0];
        assert_eq!(mac.fifo_table.len(), 2);
        for (entry, &packed) in mac.fifo_layout.entries.iter().zip(&mac.fifo_table) {
            assert_eq!(packed, entry.packed);
        }
    }

    #[test]
    fn coeff_table_sized_to_layout() {
        let spec = two_filter_spec();
        let (_, lowered) = lower_ok(&spec);
        let mac = &lowered.macs[0];
        assert_eq!(
            mac.coeff_table.len(),
            mac.fifo_layout.mem_words_total as usize
        );
    }

    #[test]
    fn out_of_range_coefficient_stops_lowering() {
        let mut spec = two_filter_spec();
        spec.firs[0].coeffs[1] = 1.75;
        let engine = bind(&spec).engine.unwrap();
        let result = lower(&spec, &engine, dummy_span());
        assert!(result.lowered.is_none());
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn cert_detects_truncated_table() {
        let spec = two_filter_spec();
        let (engine, mut lowered) = lower_ok(&spec);
        lowered.macs[0].coeff_table.pop();
        let cert = verify_lower(&engine, &lowered);
        assert!(!cert.l2_table_sizes_consistent);
    }

    #[test]
    fn lowering_is_deterministic() {
        let spec = two_filter_spec();
        let (_, first) = lower_ok(&spec);
        let (_, second) = lower_ok(&spec);
        assert_eq!(first, second);
    }
}
