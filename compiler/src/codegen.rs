// codegen.rs — Verilog rendering of the lowered engine
//
// Emits one top-level engine module plus one configuration module per MAC.
// The top level declares the per-FIR data ports, chains the MACs together
// (chain inputs of MAC 0 tied to zero), and instantiates each MAC module.
// Each MAC module carries the schedule as localizable parameters: the ten
// control vectors, the packed FIFO descriptor table, and the coefficient
// memory image; the static DSP pipeline itself is the `fir_mac_pipeline`
// library primitive the module instantiates.
//
// The parameter vectors are bit-exact deliverables; everything else is
// boilerplate.
//
// Preconditions: `lowered` verified by the L1-L3 obligations.
// Postconditions: output is deterministic for identical inputs.
// Failure modes: none.
// Side effects: none.

use std::fmt::Write as _;

use crate::coeff::COEFF_WIDTH_BITS;
use crate::ctrl::{
    ADD_PREV_ENGINE_ACCUM_BITS, CHANNEL_SELECT_BITS, DO_UPDATE_BITS, FIRST_ENGINE_BITS,
    FIRST_TAP_BITS, LAST_ENGINE_BITS, MUL_MODE_BITS, PRE_ADD_MODE_BITS, RD_FIFO_NUM_BITS,
    UPDATE_FIFO_NUM_BITS,
};
use crate::lower::{LoweredEngine, LoweredMac};

/// One generated output file.
#[derive(Debug, Clone, PartialEq)]
pub struct RtlFile {
    pub name: String,
    pub contents: String,
}

/// All generated RTL.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRtl {
    pub files: Vec<RtlFile>,
}

impl GeneratedRtl {
    /// All files concatenated, each preceded by a `// file:` banner. Used
    /// when emitting to stdout.
    pub fn concatenated(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            let _ = writeln!(out, "// file: {}", file.name);
            out.push_str(&file.contents);
            out.push('\n');
        }
        out
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Render the engine shell and one configuration module per MAC.
pub fn generate_rtl(engine_name: &str, lowered: &LoweredEngine) -> GeneratedRtl {
    let mut files = Vec::with_capacity(lowered.macs.len() + 1);
    files.push(RtlFile {
        name: format!("{engine_name}.v"),
        contents: render_engine_shell(engine_name, lowered),
    });
    for mac in &lowered.macs {
        let module = format!("{engine_name}_fir{}", mac.mac.0);
        files.push(RtlFile {
            name: format!("{module}.v"),
            contents: render_mac_module(&module, lowered, mac),
        });
    }
    GeneratedRtl { files }
}

// ── Engine shell ────────────────────────────────────────────────────────────

fn render_engine_shell(engine_name: &str, lowered: &LoweredEngine) -> String {
    let mut v = String::new();
    header(&mut v, engine_name);

    let _ = writeln!(v, "module {engine_name} (");
    let _ = writeln!(v, "\tinput             iClk,");
    let _ = writeln!(v, "\tinput             iRst,");
    let _ = writeln!(v);
    let _ = writeln!(v, "\t// Each channel has a separate (data, data-changed) pair;");
    let _ = writeln!(v, "\t// data-changed flips every time a new sample arrives.");
    for i in 0..lowered.num_firs {
        let _ = writeln!(v, "\tinput             iData{i}Changed,");
        let _ = writeln!(v, "\tinput [17:0]      iData{i},");
    }
    let _ = writeln!(v);
    for i in 0..lowered.num_firs {
        let _ = writeln!(v, "\toutput            oData{i}Changed,");
        let _ = writeln!(v, "\toutput [17:0]     oData{i},");
    }
    let _ = writeln!(v);
    let _ = writeln!(v, "\t// Coefficient memory write interface");
    let _ = writeln!(v, "\tinput             iCoefBuff_wren,");
    let _ = writeln!(v, "\tinput [31:0]      iCoefBuff_wraddr,");
    let _ = writeln!(v, "\tinput [17:0]      iCoefBuff_wrdata");
    let _ = writeln!(v, ");");
    let _ = writeln!(v);

    for k in 0..=lowered.num_macs {
        let _ = writeln!(v, "wire [17:0] chainD{k};");
        let _ = writeln!(v, "wire [17:0] chainR{k};");
        let _ = writeln!(v, "wire [35:0] chainS{k};");
        let _ = writeln!(v, "wire        inputChangeChain{k};");
    }
    let _ = writeln!(v);
    let _ = writeln!(v, "// Initialize the start of the MAC chain");
    let _ = writeln!(v, "assign chainD0 = 18'b0;");
    let _ = writeln!(v, "assign chainR0 = 18'b0;");
    let _ = writeln!(v, "assign chainS0 = 36'b0;");
    let _ = writeln!(v, "assign inputChangeChain0 = 1'b0;");
    let _ = writeln!(v);

    for mac in &lowered.macs {
        let idx = mac.mac.0;
        let _ = writeln!(v, "{engine_name}_fir{idx} i_{engine_name}_fir{idx} (");
        let _ = writeln!(v, "\t.iClk              (iClk),");
        let _ = writeln!(v, "\t.iRst              (iRst),");
        for (port, fir) in mac.input_firs.iter().enumerate() {
            let _ = writeln!(v, "\t.iData{port}Changed     (iData{}Changed),", fir.0);
            let _ = writeln!(v, "\t.iData{port}            (iData{}),", fir.0);
        }
        for (port, fir) in mac.output_firs.iter().enumerate() {
            let _ = writeln!(v, "\t.oData{port}Changed     (oData{}Changed),", fir.0);
            let _ = writeln!(v, "\t.oData{port}            (oData{}),", fir.0);
        }
        let _ = writeln!(v, "\t.iChainD           (chainD{idx}),");
        let _ = writeln!(v, "\t.oChainD           (chainD{}),", idx + 1);
        let _ = writeln!(v, "\t.iChainR           (chainR{idx}),");
        let _ = writeln!(v, "\t.oChainR           (chainR{}),", idx + 1);
        let _ = writeln!(v, "\t.iChainS           (chainS{idx}),");
        let _ = writeln!(v, "\t.oChainS           (chainS{}),", idx + 1);
        let _ = writeln!(v, "\t.iInputChangeChain (inputChangeChain{idx}),");
        let _ = writeln!(v, "\t.oInputChangeChain (inputChangeChain{}),", idx + 1);
        let _ = writeln!(v, "\t.iCoefBuff_wren    (iCoefBuff_wren),");
        let _ = writeln!(v, "\t.iCoefBuff_wraddr  (iCoefBuff_wraddr),");
        let _ = writeln!(v, "\t.iCoefBuff_wrdata  (iCoefBuff_wrdata)");
        let _ = writeln!(v, ");");
        let _ = writeln!(v);
    }

    let _ = writeln!(v, "endmodule");
    v
}

// ── Per-MAC configuration module ────────────────────────────────────────────

fn render_mac_module(module: &str, lowered: &LoweredEngine, mac: &LoweredMac) -> String {
    let mut v = String::new();
    header(&mut v, module);

    let _ = writeln!(v, "module {module} (");
    let _ = writeln!(v, "\tinput             iClk,");
    let _ = writeln!(v, "\tinput             iRst,");
    let _ = writeln!(v);
    for port in 0..mac.input_firs.len() {
        let _ = writeln!(v, "\tinput             iData{port}Changed,");
        let _ = writeln!(v, "\tinput [17:0]      iData{port},");
    }
    for port in 0..mac.output_firs.len() {
        let _ = writeln!(v, "\toutput            oData{port}Changed,");
        let _ = writeln!(v, "\toutput [17:0]     oData{port},");
    }
    let _ = writeln!(v);
    let _ = writeln!(v, "\t// Chain signals linking consecutive MACs");
    let _ = writeln!(v, "\tinput [17:0]      iChainD,");
    let _ = writeln!(v, "\toutput [17:0]     oChainD,");
    let _ = writeln!(v, "\tinput [17:0]      iChainR,");
    let _ = writeln!(v, "\toutput [17:0]     oChainR,");
    let _ = writeln!(v, "\tinput [35:0]      iChainS,");
    let _ = writeln!(v, "\toutput [35:0]     oChainS,");
    let _ = writeln!(v, "\tinput             iInputChangeChain,");
    let _ = writeln!(v, "\toutput            oInputChangeChain,");
    let _ = writeln!(v);
    let _ = writeln!(v, "\t// Coefficient memory write interface");
    let _ = writeln!(v, "\tinput             iCoefBuff_wren,");
    let _ = writeln!(v, "\tinput [31:0]      iCoefBuff_wraddr,");
    let _ = writeln!(v, "\tinput [17:0]      iCoefBuff_wrdata");
    let _ = writeln!(v, ");");
    let _ = writeln!(v);

    let buffer_depth = mac.coeff_table.len() as u32;
    let num_fifos = mac.fifo_table.len() as u32;
    let n = lowered.num_time_slots;
    let _ = writeln!(v, "parameter LOG2BUFFERDEPTH = {};", bits_to_encode(buffer_depth));
    let _ = writeln!(v, "parameter BUFFERDEPTH = {buffer_depth};");
    let _ = writeln!(v, "parameter LOG2NUMFIFOS = {};", bits_to_encode(num_fifos));
    let _ = writeln!(v, "parameter NUMFIFOS = {num_fifos};");
    let _ = writeln!(v, "parameter LOG2TIMESLICES = {};", bits_to_encode(n));
    let _ = writeln!(v, "parameter TIMESLICES = {n};");
    let _ = writeln!(v);

    let _ = writeln!(v, "// Schedule configuration, one field per time slot:");
    let _ = writeln!(
        v,
        "//   CHANNEL_SELECT      {CHANNEL_SELECT_BITS} bits - input channel sampled in this slot (0xF = none)"
    );
    let _ = writeln!(
        v,
        "//   FIRST_ENGINE        {FIRST_ENGINE_BITS} bit  - updating the first engine of a chain"
    );
    let _ = writeln!(
        v,
        "//   LAST_ENGINE         {LAST_ENGINE_BITS} bit  - updating the last engine of a chain"
    );
    let _ = writeln!(
        v,
        "//   FIRST_TAP           {FIRST_TAP_BITS} bit  - slot multiplies tap 0 of a FIR"
    );
    let _ = writeln!(
        v,
        "//   PREADD_MODE         {PRE_ADD_MODE_BITS} bits - 0=NoPreadder(B*A), 1=PreAdd, 2=PreSub"
    );
    let _ = writeln!(v, "//   MUL_MODE            {MUL_MODE_BITS} bits - 0=MUL, 1=MADD, 2=MSUB");
    let _ = writeln!(
        v,
        "//   ADDPREVENGINEACCUM  {ADD_PREV_ENGINE_ACCUM_BITS} bit  - import the previous engine's accumulator"
    );
    let _ = writeln!(v, "//   RDFIFONUM           {RD_FIFO_NUM_BITS} bits - data FIFO read in this slot");
    let _ = writeln!(
        v,
        "//   UPDATEFIFONUM       {UPDATE_FIFO_NUM_BITS} bits - data FIFO updated in this slot"
    );
    let _ = writeln!(v, "//   DOUPDATE            {DO_UPDATE_BITS} bit  - slot commits a FIR update");
    let _ = writeln!(v, "//");
    let mut ruler = String::from("//                     Slot: ");
    for slot in (0..n).rev() {
        let _ = write!(ruler, "{slot:02x} ");
    }
    let _ = writeln!(v, "{ruler}");

    let ctrl = &mac.ctrl;
    let _ = writeln!(
        v,
        "parameter CHANNEL_SELECT     = {};",
        hex_vector(CHANNEL_SELECT_BITS, &ctrl.channel_select)
    );
    let _ = writeln!(
        v,
        "parameter FIRST_ENGINE       = {};",
        hex_vector(FIRST_ENGINE_BITS, &ctrl.first_engine)
    );
    let _ = writeln!(
        v,
        "parameter LAST_ENGINE        = {};",
        hex_vector(LAST_ENGINE_BITS, &ctrl.last_engine)
    );
    let _ = writeln!(
        v,
        "parameter FIRST_TAP          = {};",
        hex_vector(FIRST_TAP_BITS, &ctrl.first_tap)
    );
    let _ = writeln!(
        v,
        "parameter PREADD_MODE        = {};",
        hex_vector(PRE_ADD_MODE_BITS, &ctrl.pre_add_mode)
    );
    let _ = writeln!(
        v,
        "parameter MUL_MODE           = {};",
        hex_vector(MUL_MODE_BITS, &ctrl.mul_mode)
    );
    let _ = writeln!(
        v,
        "parameter ADDPREVENGINEACCUM = {};",
        hex_vector(ADD_PREV_ENGINE_ACCUM_BITS, &ctrl.add_prev_engine_accum)
    );
    let _ = writeln!(
        v,
        "parameter RDFIFONUM          = {};",
        hex_vector(RD_FIFO_NUM_BITS, &ctrl.rd_fifo_num)
    );
    let _ = writeln!(
        v,
        "parameter UPDATEFIFONUM      = {};",
        hex_vector(UPDATE_FIFO_NUM_BITS, &ctrl.update_fifo_num)
    );
    let _ = writeln!(
        v,
        "parameter DOUPDATE           = {};",
        hex_vector(DO_UPDATE_BITS, &ctrl.do_update)
    );
    let _ = writeln!(v);

    let fifo_values: Vec<u32> = mac.fifo_table.iter().map(|&p| u32::from(p)).collect();
    let _ = writeln!(
        v,
        "// Per-FIFO descriptor: [offset : 10 bits | depth-1 : 6 bits]"
    );
    let _ = writeln!(v, "parameter FIFOSIZES = {};", concat_vector(16, &fifo_values));
    let _ = writeln!(v, "// 1.17 coefficient memory image, one 18-bit word per slot");
    let _ = writeln!(
        v,
        "parameter COEFF_VALUES = {};",
        concat_vector(COEFF_WIDTH_BITS, &mac.coeff_table)
    );
    let _ = writeln!(v);

    // The schedule-independent DSP pipeline lives in a library primitive;
    // this module only carries its configuration.
    let _ = writeln!(v, "fir_mac_pipeline #(");
    let _ = writeln!(v, "\t.LOG2BUFFERDEPTH    (LOG2BUFFERDEPTH),");
    let _ = writeln!(v, "\t.BUFFERDEPTH        (BUFFERDEPTH),");
    let _ = writeln!(v, "\t.LOG2NUMFIFOS       (LOG2NUMFIFOS),");
    let _ = writeln!(v, "\t.NUMFIFOS           (NUMFIFOS),");
    let _ = writeln!(v, "\t.LOG2TIMESLICES     (LOG2TIMESLICES),");
    let _ = writeln!(v, "\t.TIMESLICES         (TIMESLICES),");
    let _ = writeln!(v, "\t.NUMCHANNELS        ({}),", mac.input_firs.len());
    let _ = writeln!(v, "\t.CHANNEL_SELECT     (CHANNEL_SELECT),");
    let _ = writeln!(v, "\t.FIRST_ENGINE       (FIRST_ENGINE),");
    let _ = writeln!(v, "\t.LAST_ENGINE        (LAST_ENGINE),");
    let _ = writeln!(v, "\t.FIRST_TAP          (FIRST_TAP),");
    let _ = writeln!(v, "\t.PREADD_MODE        (PREADD_MODE),");
    let _ = writeln!(v, "\t.MUL_MODE           (MUL_MODE),");
    let _ = writeln!(v, "\t.ADDPREVENGINEACCUM (ADDPREVENGINEACCUM),");
    let _ = writeln!(v, "\t.RDFIFONUM          (RDFIFONUM),");
    let _ = writeln!(v, "\t.UPDATEFIFONUM      (UPDATEFIFONUM),");
    let _ = writeln!(v, "\t.DOUPDATE           (DOUPDATE),");
    let _ = writeln!(v, "\t.FIFOSIZES          (FIFOSIZES),");
    let _ = writeln!(v, "\t.COEFF_VALUES       (COEFF_VALUES)");
    let _ = writeln!(v, ") i_fir_mac_pipeline (");
    let _ = writeln!(v, "\t.iClk              (iClk),");
    let _ = writeln!(v, "\t.iRst              (iRst),");
    for port in 0..mac.input_firs.len() {
        let _ = writeln!(v, "\t.iData{port}Changed     (iData{port}Changed),");
        let _ = writeln!(v, "\t.iData{port}            (iData{port}),");
    }
    for port in 0..mac.output_firs.len() {
        let _ = writeln!(v, "\t.oData{port}Changed     (oData{port}Changed),");
        let _ = writeln!(v, "\t.oData{port}            (oData{port}),");
    }
    let _ = writeln!(v, "\t.iChainD           (iChainD),");
    let _ = writeln!(v, "\t.oChainD           (oChainD),");
    let _ = writeln!(v, "\t.iChainR           (iChainR),");
    let _ = writeln!(v, "\t.oChainR           (oChainR),");
    let _ = writeln!(v, "\t.iChainS           (iChainS),");
    let _ = writeln!(v, "\t.oChainS           (oChainS),");
    let _ = writeln!(v, "\t.iInputChangeChain (iInputChangeChain),");
    let _ = writeln!(v, "\t.oInputChangeChain (oInputChangeChain),");
    let _ = writeln!(v, "\t.iCoefBuff_wren    (iCoefBuff_wren),");
    let _ = writeln!(v, "\t.iCoefBuff_wraddr  (iCoefBuff_wraddr),");
    let _ = writeln!(v, "\t.iCoefBuff_wrdata  (iCoefBuff_wrdata)");
    let _ = writeln!(v, ");");
    let _ = writeln!(v);
    let _ = writeln!(v, "endmodule");
    v
}

fn header(v: &mut String, module: &str) {
    let _ = writeln!(v, "`timescale 1ns / 1ps");
    let _ = writeln!(
        v,
        "////////////////////////////////////////////////////////////////////////////////"
    );
    let _ = writeln!(v, "// Design Name: Fir Engine");
    let _ = writeln!(v, "// Module Name: {module}");
    let _ = writeln!(
        v,
        "////////////////////////////////////////////////////////////////////////////////"
    );
    let _ = writeln!(v);
}

// ── Vector renderers ────────────────────────────────────────────────────────

/// Render per-slot values as one packed literal, highest slot first.
/// 1-bit fields render in binary, wider fields one hex digit per nibble,
/// every value separated by `_` (single-digit values get a second `_` so
/// slots line up under the ruler comment).
fn hex_vector(bits_per_value: u32, values: &[u32]) -> String {
    let total_bits = bits_per_value as usize * values.len();
    let (base, digits) = match bits_per_value {
        1 => ('b', 1),
        4 => ('h', 1),
        8 => ('h', 2),
        other => ('h', (other as usize + 3) / 4),
    };
    let mut out = format!("{total_bits}'{base}");
    for (i, &value) in values.iter().rev().enumerate() {
        debug_assert!(u64::from(value) < 1u64 << bits_per_value);
        if i > 0 {
            out.push('_');
        }
        if digits == 1 {
            out.push('_');
        }
        let _ = write!(out, "{value:0digits$x}");
    }
    out
}

/// Render values as a Verilog concatenation, highest index first.
fn concat_vector(bits_per_value: u32, values: &[u32]) -> String {
    let digits = (bits_per_value as usize + 3) / 4;
    let mut out = String::from("{");
    for (i, &value) in values.iter().rev().enumerate() {
        debug_assert!(u64::from(value) < 1u64 << bits_per_value);
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{bits_per_value}'h{value:0digits$x}");
    }
    out.push('}');
    out
}

/// Bits needed to encode `n` distinct values.
fn bits_to_encode(n: u32) -> u32 {
    if n > 1 {
        32 - (n - 1).leading_zeros()
    } else {
        0
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
