// coeff.rs — 1.17 fixed-point coefficient encoding
//
// A coefficient is an 18-bit signed 1.17 fixed-point value: 1 sign bit and
// 17 fractional bits, representing a real in (-1, 1]. -1.0 is outside the
// domain, so the bit pattern 0x20000 encodes +1.0. Conversion truncates
// toward zero, which keeps every value within 2^-17 of its encoding across
// the whole domain.
//
// Coefficient memory for a MAC is the concatenation of each FIFO's encoded
// taps, in forward tap order, at the offsets the layout planner assigned;
// unused words are zero.
//
// Preconditions: callers pre-normalize coefficients into (-1, 1].
// Postconditions: encoded values fit in 18 bits.
// Failure modes: out-of-range coefficients are fatal range violations, never
//                clamped.
// Side effects: none.

use crate::ast::Span;
use crate::bind::MacState;
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::id::MacId;
use crate::layout::FifoLayout;
use crate::spec::EngineSpec;

/// Total width of an encoded coefficient.
pub const COEFF_WIDTH_BITS: u32 = 18;
/// Fractional bits of the 1.17 representation.
pub const COEFF_FRAC_BITS: u32 = 17;

const COEFF_SCALE: f64 = (1u32 << COEFF_FRAC_BITS) as f64;
const COEFF_MASK: i64 = (1i64 << COEFF_WIDTH_BITS) - 1;

// ── Encode / decode ─────────────────────────────────────────────────────────

/// Encode a real coefficient in (-1, 1] as an 18-bit 1.17 value.
///
/// Returns `None` when the coefficient is outside the domain (including NaN).
pub fn encode_coeff(c: f64) -> Option<u32> {
    if !(c > -1.0 && c <= 1.0) {
        return None;
    }
    let scaled = (c * COEFF_SCALE) as i64;
    Some((scaled & COEFF_MASK) as u32)
}

/// Decode an 18-bit 1.17 value back to a real in (-1, 1].
///
/// 0x20000 is +1.0; larger patterns are the negative range.
pub fn decode_coeff(bits: u32) -> f64 {
    let v = i64::from(bits) & COEFF_MASK;
    let signed = if v > 1 << COEFF_FRAC_BITS {
        v - (1 << COEFF_WIDTH_BITS)
    } else {
        v
    };
    signed as f64 / COEFF_SCALE
}

// ── Coefficient memory ──────────────────────────────────────────────────────

/// Build the coefficient memory image of one MAC: every FIFO's taps encoded
/// in forward order at its layout offset, zero elsewhere.
pub fn coeff_table(
    spec: &EngineSpec,
    mac: &MacState,
    layout: &FifoLayout,
    mac_id: MacId,
    span: Span,
) -> Result<Vec<u32>, Diagnostic> {
    let mut table = vec![0u32; layout.mem_words_total as usize];
    for entry in &layout.entries {
        let fifo = mac
            .fifos
            .iter()
            .find(|f| f.fir == entry.fir)
            .expect("layout entry without a bound FIFO");
        for (j, tap) in fifo.taps.iter().enumerate() {
            let value = spec.lookup_coeff(*tap);
            let Some(encoded) = encode_coeff(value) else {
                return Err(Diagnostic::new(
                    DiagLevel::Error,
                    span,
                    format!(
                        "{mac_id}: coefficient {tap} = {value} is outside the \
                         representable (-1, 1] range"
                    ),
                )
                .with_code(codes::E0503));
            };
            table[entry.offset as usize + j] = encoded;
        }
    }
    Ok(table)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_encodings() {
        assert_eq!(encode_coeff(0.0), Some(0));
        assert_eq!(encode_coeff(0.5), Some(0x10000));
        assert_eq!(encode_coeff(1.0), Some(0x20000));
        assert_eq!(encode_coeff(-0.5), Some(0x30000));
        assert_eq!(encode_coeff(2f64.powi(-17)), Some(1));
    }

    #[test]
    fn domain_boundaries_rejected() {
        assert_eq!(encode_coeff(-1.0), None);
        assert_eq!(encode_coeff(1.0 + 1e-9), None);
        assert_eq!(encode_coeff(2.0), None);
        assert_eq!(encode_coeff(f64::NAN), None);
        assert_eq!(encode_coeff(f64::INFINITY), None);
    }

    #[test]
    fn decode_inverts_encode() {
        let eps = 2f64.powi(-17);
        for &c in &[1.0, 0.999, 0.5, 0.25, 1e-6, 0.0, -1e-6, -0.25, -0.999, -1.0 + 1e-9] {
            let decoded = decode_coeff(encode_coeff(c).unwrap());
            assert!(
                (decoded - c).abs() <= eps,
                "roundtrip {c} -> {decoded} off by more than 2^-17"
            );
        }
    }

    #[test]
    fn full_scale_pattern_is_plus_one() {
        assert_eq!(decode_coeff(0x20000), 1.0);
        assert_eq!(decode_coeff(0x20001), -(131071.0 / 131072.0));
    }

    #[test]
    fn coeff_table_places_taps_at_offsets() {
        use crate::bind::bind;
        use crate::spec::{EngineParams, EngineSpec, FirSpec};
        use chumsky::span::Span as _;

        let dummy = Span::new((), 0..0);
        let spec = EngineSpec {
            params: EngineParams {
                clock_freq: 400e6,
                num_time_slots: 256,
            },
            firs: vec![
                FirSpec {
                    sample_rate: 1,
                    coeffs: vec![0.5, 0.25, -0.5],
                    span: dummy,
                },
                FirSpec {
                    sample_rate: 1,
                    coeffs: vec![0.125; 9],
                    span: dummy,
                },
            ],
        };
        let engine = bind(&spec).engine.unwrap();
        let mac = engine.mac(MacId(0));
        let layout = crate::layout::plan_layout(mac, MacId(0), dummy).unwrap();
        let table = coeff_table(&spec, mac, &layout, MacId(0), dummy).unwrap();

        // fir1 (9 taps, 16 words) sorts first at offset 0; fir0 at 16.
        assert_eq!(table.len(), 20);
        assert_eq!(table[0], encode_coeff(0.125).unwrap());
        assert_eq!(table[8], encode_coeff(0.125).unwrap());
        assert_eq!(table[9], 0); // padding inside fir1's power-of-two block
        assert_eq!(table[16], encode_coeff(0.5).unwrap());
        assert_eq!(table[17], encode_coeff(0.25).unwrap());
        assert_eq!(table[18], encode_coeff(-0.5).unwrap());
        assert_eq!(table[19], 0);
    }

    #[test]
    fn out_of_range_coefficient_is_fatal() {
        use crate::bind::bind;
        use crate::spec::{EngineParams, EngineSpec, FirSpec};
        use chumsky::span::Span as _;

        let dummy = Span::new((), 0..0);
        let spec = EngineSpec {
            params: EngineParams {
                clock_freq: 400e6,
                num_time_slots: 16,
            },
            firs: vec![FirSpec {
                sample_rate: 50,
                coeffs: vec![0.5, 1.5],
                span: dummy,
            }],
        };
        let engine = bind(&spec).engine.unwrap();
        let mac = engine.mac(MacId(0));
        let layout = crate::layout::plan_layout(mac, MacId(0), dummy).unwrap();
        let err = coeff_table(&spec, mac, &layout, MacId(0), dummy).unwrap_err();
        assert_eq!(err.code, Some(codes::E0503));
    }
}
