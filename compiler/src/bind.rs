// bind.rs — Binding FIRs onto time-multiplexed MAC pipelines
//
// The central constraint solver. Each FIR is assigned a (MAC, phase origin,
// interval) binding such that every per-slot resource constraint holds over
// the whole repeating cycle: one update per slot, one coefficient tap per
// slot, the pipelined read slot free, and the per-MAC port/FIFO capacities
// respected. FIRs are bound strictly in specification order; the schedule is
// a deterministic function of the ordered input.
//
// Preconditions: `spec` is a validated `EngineSpec`.
// Postconditions: on success every FIR has exactly one binding and the
//                 per-MAC slot maps satisfy the B1-B4 obligations.
// Failure modes: rate/capacity violations produce error diagnostics naming
//                the offending FIR; no partial engine is returned.
// Side effects: none.

use std::fmt;

use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::id::{FirId, MacId, TapRef};
use crate::pass::StageCert;
use crate::spec::{EngineParams, EngineSpec, FirSpec};

// ── Hardware limits ─────────────────────────────────────────────────────────

/// Clock cycles between the FIFO read and the FIFO write of one update.
/// No update may be scheduled on another update's read slot.
pub const FIR_UPDATE_LATENCY: u32 = 2;

/// A MAC multiplexes at most 15 input channels.
pub const MAX_MAC_INPUTS: usize = 15;
/// A MAC drives at most 15 output channels.
pub const MAX_MAC_OUTPUTS: usize = 15;
/// A MAC addresses at most 256 data FIFOs.
pub const MAX_MAC_FIFOS: usize = 256;

// ── Public types ────────────────────────────────────────────────────────────

/// The (MAC, phase, interval) assignment chosen for one FIR.
///
/// Updates occur at slots `phase_origin + n * interval` for all n keeping the
/// slot below the engine's cycle length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub fir: FirId,
    pub mac: MacId,
    pub phase_origin: u32,
    pub interval: u32,
}

/// One FIR's circular sample-history buffer on a MAC.
#[derive(Debug, Clone, PartialEq)]
pub struct FifoDesc {
    pub fir: FirId,
    /// Entries required: the FIR's coefficient count.
    pub depth: u32,
    /// Words reserved: next power of two >= depth.
    pub mem_words: u32,
    /// The FIR's taps in forward order (tap 0 first).
    pub taps: Vec<TapRef>,
}

/// Scheduling state of one MAC pipeline.
///
/// Mutated only by `commit` during binding; the layout planner and control
/// deriver read it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MacState {
    /// FIRs feeding this MAC, in bind order (defines input port order).
    pub input_firs: Vec<FirId>,
    /// FIRs computed by this MAC. A FIR is never split across MACs, so this
    /// always mirrors `input_firs`; kept separate for hardware port order.
    pub output_firs: Vec<FirId>,
    /// Slot -> FIR whose sample history advances there.
    pub update_slots: Vec<Option<FirId>>,
    /// Slot -> coefficient tap multiplied there.
    pub coeff_slots: Vec<Option<TapRef>>,
    /// FIFO descriptors, in bind order.
    pub fifos: Vec<FifoDesc>,
}

impl MacState {
    fn new(num_time_slots: u32) -> Self {
        MacState {
            input_firs: Vec::new(),
            output_firs: Vec::new(),
            update_slots: vec![None; num_time_slots as usize],
            coeff_slots: vec![None; num_time_slots as usize],
            fifos: Vec::new(),
        }
    }

    pub fn num_time_slots(&self) -> u32 {
        self.update_slots.len() as u32
    }

    /// Input channel index of a FIR on this MAC.
    pub fn input_index_of(&self, fir: FirId) -> Option<usize> {
        self.input_firs.iter().position(|&f| f == fir)
    }
}

/// All MACs of a fully or partially bound engine, addressed by `MacId`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundEngine {
    pub num_time_slots: u32,
    pub update_latency: u32,
    pub num_firs: u32,
    pub bindings: Vec<Binding>,
    pub macs: Vec<MacState>,
}

impl BoundEngine {
    pub fn new(num_time_slots: u32) -> Self {
        BoundEngine {
            num_time_slots,
            update_latency: FIR_UPDATE_LATENCY,
            num_firs: 0,
            bindings: Vec::new(),
            macs: Vec::new(),
        }
    }

    pub fn num_macs(&self) -> u32 {
        self.macs.len() as u32
    }

    pub fn mac(&self, id: MacId) -> &MacState {
        &self.macs[id.index()]
    }
}

/// Result of binding: the bound engine, or diagnostics explaining why not.
#[derive(Debug)]
pub struct BindResult {
    pub engine: Option<BoundEngine>,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Bind every FIR of `spec`, in specification order, creating MACs on demand.
///
/// Binding stops at the first fatal error; no partial engine is returned.
pub fn bind(spec: &EngineSpec) -> BindResult {
    let mut engine = BoundEngine::new(spec.params.num_time_slots);
    let mut diagnostics = Vec::new();

    for (index, fir) in spec.firs.iter().enumerate() {
        let fir_id = FirId(index as u32);
        if let Err(diag) = bind_fir(&mut engine, &spec.params, fir, fir_id) {
            diagnostics.push(diag);
            return BindResult {
                engine: None,
                diagnostics,
            };
        }
    }

    BindResult {
        engine: Some(engine),
        diagnostics,
    }
}

fn bind_fir(
    engine: &mut BoundEngine,
    params: &EngineParams,
    fir: &FirSpec,
    fir_id: FirId,
) -> Result<(), Diagnostic> {
    let interval = compute_interval(params, fir, fir_id)?;
    let binding = find_valid_binding(engine, fir, fir_id, interval)?;
    commit(engine, fir, binding);
    Ok(())
}

// ── Interval computation ────────────────────────────────────────────────────

/// Compute the update interval for a FIR.
///
/// `floor(clock / rate)`, clamped to the cycle length, then rounded down so
/// that `repeats * interval` tiles the cycle.
pub fn compute_interval(
    params: &EngineParams,
    fir: &FirSpec,
    fir_id: FirId,
) -> Result<u32, Diagnostic> {
    if f64::from(fir.sample_rate) > params.clock_freq / 2.0 {
        return Err(Diagnostic::new(
            DiagLevel::Error,
            fir.span,
            format!("{fir_id}: sample frequency must be less than half the clock frequency"),
        )
        .with_code(codes::E0100));
    }

    let mut interval = (params.clock_freq / f64::from(fir.sample_rate)).floor() as u32;
    if interval > params.num_time_slots {
        interval = params.num_time_slots;
    }
    let repeats = ceil_div(params.num_time_slots, interval);
    interval = params.num_time_slots / repeats;

    if interval < fir.num_coeffs() {
        return Err(Diagnostic::new(
            DiagLevel::Error,
            fir.span,
            format!(
                "{fir_id}: too many coefficients ({}) for the update interval ({interval}); \
                 multi-MAC FIR is not supported",
                fir.num_coeffs()
            ),
        )
        .with_code(codes::E0101));
    }

    Ok(interval)
}

// ── First-fit search ────────────────────────────────────────────────────────

/// Find the first feasible binding: lowest MAC index first (with a fresh MAC
/// as the final candidate), then lowest phase origin.
///
/// The iteration order is part of the output contract — downstream artifacts
/// are bit-exact deliverables.
fn find_valid_binding(
    engine: &BoundEngine,
    fir: &FirSpec,
    fir_id: FirId,
    interval: u32,
) -> Result<Binding, Diagnostic> {
    for mac_index in 0..=engine.macs.len() {
        for phase_origin in 0..interval {
            let binding = Binding {
                fir: fir_id,
                mac: MacId(mac_index as u32),
                phase_origin,
                interval,
            };
            if can_bind(engine, fir, &binding) {
                return Ok(binding);
            }
        }
    }

    // Unreachable by construction: a fresh MAC has no occupied slots, so the
    // (macs.len(), phase 0) candidate always succeeds. Abort loudly rather
    // than emit a broken schedule.
    Err(Diagnostic::new(
        DiagLevel::Error,
        fir.span,
        format!("scheduler invariant violated: no feasible binding found for {fir_id}"),
    )
    .with_code(codes::E0500))
}

/// Check whether `binding` fits the addressed MAC without conflicts.
///
/// A binding onto a not-yet-created MAC trivially fits.
pub fn can_bind(engine: &BoundEngine, fir: &FirSpec, binding: &Binding) -> bool {
    let Some(mac) = engine.macs.get(binding.mac.index()) else {
        return true;
    };

    if mac.input_firs.len() == MAX_MAC_INPUTS {
        return false;
    }
    if mac.output_firs.len() == MAX_MAC_OUTPUTS {
        return false;
    }
    if mac.fifos.len() == MAX_MAC_FIFOS {
        return false;
    }

    let n = engine.num_time_slots;
    for slot in phase_slots(binding.phase_origin, binding.interval, n) {
        if mac.update_slots[slot as usize].is_some() {
            return false;
        }
        // The FIFO read happens `update_latency` slots before the write and
        // must not collide with another update.
        let read_slot = slot_sub(slot, engine.update_latency, n);
        if mac.update_slots[read_slot as usize].is_some() {
            return false;
        }
    }

    for slot in phase_slots(binding.phase_origin, binding.interval, n) {
        // All coefficient slots leading up to and including the update slot
        // must be free.
        for i in 0..fir.num_coeffs() {
            let coeff_slot = slot_sub(slot, i, n);
            if mac.coeff_slots[coeff_slot as usize].is_some() {
                return false;
            }
        }
    }

    true
}

/// Commit a binding `can_bind` accepted, creating the MAC if needed.
fn commit(engine: &mut BoundEngine, fir: &FirSpec, binding: Binding) {
    if binding.mac.index() == engine.macs.len() {
        engine.macs.push(MacState::new(engine.num_time_slots));
    }
    let n = engine.num_time_slots;
    let mac = &mut engine.macs[binding.mac.index()];

    mac.input_firs.push(binding.fir);
    mac.output_firs.push(binding.fir);

    for slot in phase_slots(binding.phase_origin, binding.interval, n) {
        mac.update_slots[slot as usize] = Some(binding.fir);
    }

    let k = fir.num_coeffs();
    for slot in phase_slots(binding.phase_origin, binding.interval, n) {
        // Taps are laid down in reverse: the last tap lands on the update
        // slot, earlier taps occupy the slots walking backward from it.
        for i in 0..k {
            let coeff_slot = slot_sub(slot, i, n);
            mac.coeff_slots[coeff_slot as usize] = Some(TapRef {
                fir: binding.fir,
                tap: k - 1 - i,
            });
        }
    }

    mac.fifos.push(FifoDesc {
        fir: binding.fir,
        depth: k,
        mem_words: k.next_power_of_two(),
        taps: (0..k).map(|tap| TapRef {
            fir: binding.fir,
            tap,
        })
        .collect(),
    });

    engine.num_firs += 1;
    engine.bindings.push(binding);
}

// ── Slot arithmetic ─────────────────────────────────────────────────────────

/// The update slots of a binding: `origin, origin+interval, ... < n`.
pub fn phase_slots(origin: u32, interval: u32, num_time_slots: u32) -> impl Iterator<Item = u32> {
    (origin..num_time_slots).step_by(interval as usize)
}

/// `(slot - delta) mod n`, safe for delta > slot.
fn slot_sub(slot: u32, delta: u32, num_time_slots: u32) -> u32 {
    (i64::from(slot) - i64::from(delta)).rem_euclid(i64::from(num_time_slots)) as u32
}

fn ceil_div(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

// ── Verification ────────────────────────────────────────────────────────────

/// Machine-checkable evidence for the binder's postconditions (B1-B4).
#[derive(Debug, Clone)]
pub struct BindCert {
    /// B1: update slots hold exactly the slots every binding claims.
    pub b1_update_slots_consistent: bool,
    /// B2: coefficient slots hold exactly every binding's reverse tap walk.
    pub b2_coeff_slots_consistent: bool,
    /// B3: no update sits on another FIR's read slot (latency freedom).
    pub b3_latency_slots_free: bool,
    /// B4: port and FIFO capacities respected on every MAC.
    pub b4_capacities_respected: bool,
}

impl StageCert for BindCert {
    fn all_pass(&self) -> bool {
        self.b1_update_slots_consistent
            && self.b2_coeff_slots_consistent
            && self.b3_latency_slots_free
            && self.b4_capacities_respected
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("B1_update_slots_consistent", self.b1_update_slots_consistent),
            ("B2_coeff_slots_consistent", self.b2_coeff_slots_consistent),
            ("B3_latency_slots_free", self.b3_latency_slots_free),
            ("B4_capacities_respected", self.b4_capacities_respected),
        ]
    }
}

/// Verify the binder's postconditions against the finished engine.
pub fn verify_bound(spec: &EngineSpec, engine: &BoundEngine) -> BindCert {
    BindCert {
        b1_update_slots_consistent: verify_b1(spec, engine),
        b2_coeff_slots_consistent: verify_b2(spec, engine),
        b3_latency_slots_free: verify_b3(engine),
        b4_capacities_respected: verify_b4(engine),
    }
}

/// B1: every binding's phase slots hold its FIR, and the total number of
/// occupied update slots equals the sum the bindings account for.
fn verify_b1(_spec: &EngineSpec, engine: &BoundEngine) -> bool {
    let mut claimed = 0usize;
    for binding in &engine.bindings {
        let Some(mac) = engine.macs.get(binding.mac.index()) else {
            return false;
        };
        for slot in phase_slots(binding.phase_origin, binding.interval, engine.num_time_slots) {
            if mac.update_slots[slot as usize] != Some(binding.fir) {
                return false;
            }
            claimed += 1;
        }
    }
    let occupied: usize = engine
        .macs
        .iter()
        .map(|m| m.update_slots.iter().filter(|s| s.is_some()).count())
        .sum();
    claimed == occupied
}

/// B2: every binding's reverse tap walk is present, and no coefficient slot
/// is occupied that no binding accounts for.
fn verify_b2(spec: &EngineSpec, engine: &BoundEngine) -> bool {
    let mut claimed = 0usize;
    for binding in &engine.bindings {
        let Some(mac) = engine.macs.get(binding.mac.index()) else {
            return false;
        };
        let k = spec.firs[binding.fir.index()].num_coeffs();
        for slot in phase_slots(binding.phase_origin, binding.interval, engine.num_time_slots) {
            for i in 0..k {
                let coeff_slot = slot_sub(slot, i, engine.num_time_slots);
                let expected = TapRef {
                    fir: binding.fir,
                    tap: k - 1 - i,
                };
                if mac.coeff_slots[coeff_slot as usize] != Some(expected) {
                    return false;
                }
                claimed += 1;
            }
        }
    }
    let occupied: usize = engine
        .macs
        .iter()
        .map(|m| m.coeff_slots.iter().filter(|s| s.is_some()).count())
        .sum();
    claimed == occupied
}

/// B3: for every occupied update slot, the slot `update_latency` earlier is
/// not occupied by a different FIR.
fn verify_b3(engine: &BoundEngine) -> bool {
    for mac in &engine.macs {
        let n = engine.num_time_slots;
        for slot in 0..n {
            if let Some(fir) = mac.update_slots[slot as usize] {
                let read_slot = slot_sub(slot, engine.update_latency, n);
                match mac.update_slots[read_slot as usize] {
                    None => {}
                    Some(other) if other == fir => {}
                    Some(_) => return false,
                }
            }
        }
    }
    true
}

/// B4: capacities, and one FIFO per input FIR.
fn verify_b4(engine: &BoundEngine) -> bool {
    engine.macs.iter().all(|mac| {
        mac.input_firs.len() <= MAX_MAC_INPUTS
            && mac.output_firs.len() <= MAX_MAC_OUTPUTS
            && mac.fifos.len() <= MAX_MAC_FIFOS
            && mac.fifos.len() == mac.input_firs.len()
            && mac.input_firs == mac.output_firs
    })
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for BoundEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "BoundEngine: {} fir(s), {} mac(s), {} slots",
            self.num_firs,
            self.macs.len(),
            self.num_time_slots
        )?;
        for b in &self.bindings {
            writeln!(
                f,
                "  {} -> {} phase {} interval {}",
                b.fir, b.mac, b.phase_origin, b.interval
            )?;
        }
        for (index, mac) in self.macs.iter().enumerate() {
            writeln!(f, "  mac{index}:")?;
            writeln!(f, "    inputs:  [{}]", join_ids(&mac.input_firs))?;
            writeln!(f, "    outputs: [{}]", join_ids(&mac.output_firs))?;
            for (slot, entry) in mac.update_slots.iter().enumerate() {
                if let Some(fir) = entry {
                    writeln!(f, "    update[{slot:2}] = {fir}")?;
                }
            }
            for (slot, entry) in mac.coeff_slots.iter().enumerate() {
                if let Some(tap) = entry {
                    writeln!(f, "    coeff[{slot:2}]  = {tap}")?;
                }
            }
            for (i, fifo) in mac.fifos.iter().enumerate() {
                writeln!(
                    f,
                    "    fifo[{i}]: {} depth {} words {}",
                    fifo.fir, fifo.depth, fifo.mem_words
                )?;
            }
        }
        Ok(())
    }
}

fn join_ids(ids: &[FirId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Tests ───────────────────────────────────────────────────────────────────
