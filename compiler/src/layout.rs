// layout.rs — FIFO memory layout planning
//
// Sizes and places each FIR's circular sample-history buffer in MAC-local
// memory. Buffers are ordered by size descending and bump-allocated at
// offsets aligned to their own power-of-two size, so no buffer straddles an
// alignment boundary its circular addressing needs. Each buffer gets a packed
// 16-bit descriptor: [offset : 10 bits | depth-1 : 6 bits].
//
// The planner does not touch `MacState`; it returns the sorted order and
// offsets as a `FifoLayout` value the deriver and renderers consume.
//
// Preconditions: `mac` is read from a fully bound engine.
// Postconditions: entries are sorted by mem_words descending (stable),
//                 offsets are self-aligned and ranges disjoint.
// Failure modes: a depth beyond the 6-bit field or a total memory beyond the
//                10-bit offset field is an internal range violation.
// Side effects: none.

use serde::Serialize;

use crate::ast::Span;
use crate::bind::MacState;
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::id::{FirId, MacId};

/// Width of the depth-1 field in a packed FIFO descriptor.
pub const FIFO_DEPTH_FIELD_BITS: u32 = 6;
/// Width of the offset field in a packed FIFO descriptor.
pub const FIFO_OFFSET_FIELD_BITS: u32 = 10;
/// Largest representable FIFO depth.
pub const MAX_FIFO_DEPTH: u32 = 1 << FIFO_DEPTH_FIELD_BITS;
/// MAC-local coefficient/data memory size in words.
pub const MAC_MEM_WORDS: u32 = 1 << FIFO_OFFSET_FIELD_BITS;

// ── Types ───────────────────────────────────────────────────────────────────

/// One FIFO's placement in MAC-local memory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FifoEntry {
    pub fir: FirId,
    pub depth: u32,
    pub mem_words: u32,
    /// Word offset; always a multiple of `mem_words`.
    pub offset: u32,
    /// `(offset << 6) | (depth - 1)`.
    pub packed: u16,
}

/// The memory plan for one MAC: entries in layout (descending-size) order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FifoLayout {
    pub entries: Vec<FifoEntry>,
    /// One past the last allocated word.
    pub mem_words_total: u32,
}

impl FifoLayout {
    /// Index of a FIR's FIFO in layout order. This is the FIFO number the
    /// control vectors carry.
    pub fn fifo_index_of(&self, fir: FirId) -> Option<usize> {
        self.entries.iter().position(|e| e.fir == fir)
    }

    /// The packed 16-bit descriptor table, in layout order.
    pub fn packed_table(&self) -> Vec<u16> {
        self.entries.iter().map(|e| e.packed).collect()
    }
}

// ── Planner ─────────────────────────────────────────────────────────────────

/// Plan the FIFO memory layout of one MAC.
///
/// `span` is attached to range-violation diagnostics.
pub fn plan_layout(mac: &MacState, mac_id: MacId, span: Span) -> Result<FifoLayout, Diagnostic> {
    // Sort descending by mem_words; stable, so equal sizes keep bind order.
    let mut order: Vec<usize> = (0..mac.fifos.len()).collect();
    order.sort_by(|&a, &b| mac.fifos[b].mem_words.cmp(&mac.fifos[a].mem_words));

    let mut entries = Vec::with_capacity(order.len());
    let mut offset = 0u32;
    for index in order {
        let fifo = &mac.fifos[index];
        if fifo.depth > MAX_FIFO_DEPTH {
            return Err(Diagnostic::new(
                DiagLevel::Error,
                span,
                format!(
                    "{mac_id}: FIFO for {} is {} deep; the descriptor field holds at most {}",
                    fifo.fir, fifo.depth, MAX_FIFO_DEPTH
                ),
            )
            .with_code(codes::E0501));
        }
        offset = align_up(offset, fifo.mem_words);
        entries.push(FifoEntry {
            fir: fifo.fir,
            depth: fifo.depth,
            mem_words: fifo.mem_words,
            offset,
            packed: ((offset << FIFO_DEPTH_FIELD_BITS) | (fifo.depth - 1)) as u16,
        });
        offset += fifo.mem_words;
    }

    if offset > MAC_MEM_WORDS {
        return Err(Diagnostic::new(
            DiagLevel::Error,
            span,
            format!(
                "{mac_id}: FIFO memory needs {offset} words; the offset field addresses {}",
                MAC_MEM_WORDS
            ),
        )
        .with_code(codes::E0502));
    }

    Ok(FifoLayout {
        entries,
        mem_words_total: offset,
    })
}

/// Round `offset` up to the next multiple of `align` (a power of two).
fn align_up(offset: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    let mask = align - 1;
    (offset + mask) & !mask
}

// ── Tests ───────────────────────────────────────────────────────────────────
