// spec.rs — Engine specification model
//
// Turns the parsed AST into the immutable `EngineSpec` the binder consumes:
// per-FIR sample rates and coefficient lists, plus the global engine
// parameters (clock frequency, number of time slots).
//
// Preconditions: `program` comes from `parser::parse` with no parse errors.
// Postconditions: on success every FIR index 0..n has a sample rate and a
//                 non-empty coefficient list.
// Failure modes: missing/duplicate fields, index gaps, zero rates produce
//                error diagnostics and no spec.
// Side effects: none.

use std::collections::BTreeMap;

use crate::ast::{Program, Span, StatementKind};
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::id::TapRef;

/// Largest accepted FIR index. Generous; the per-MAC input limit is what
/// actually bounds useful bank sizes.
pub const MAX_FIR_INDEX: u64 = 4095;

// ── Model ────────────────────────────────────────────────────────────────

/// Global engine parameters, fixed for a compilation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    /// Clock frequency the engine will run at, in Hz.
    pub clock_freq: f64,
    /// Number of time slots in the repeating schedule cycle.
    pub num_time_slots: u32,
}

/// The specification for a single FIR: its sample rate and taps.
#[derive(Debug, Clone, PartialEq)]
pub struct FirSpec {
    /// Rate at which samples will be processed, in Hz.
    pub sample_rate: u32,
    /// All coefficients, index 0 = first tap.
    pub coeffs: Vec<f64>,
    /// Source span of the FIR's first mention (for diagnostics).
    pub span: Span,
}

impl FirSpec {
    /// Number of taps.
    pub fn num_coeffs(&self) -> u32 {
        self.coeffs.len() as u32
    }
}

/// A complete engine specification: parameters plus the FIR bank.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSpec {
    pub params: EngineParams,
    pub firs: Vec<FirSpec>,
}

impl EngineSpec {
    /// Look up the coefficient value a tap reference names.
    pub fn lookup_coeff(&self, tap: TapRef) -> f64 {
        self.firs[tap.fir.index()].coeffs[tap.tap as usize]
    }
}

/// Result of building the spec model.
#[derive(Debug)]
pub struct SpecResult {
    pub spec: Option<EngineSpec>,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Builder ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct PartialFir {
    rate: Option<(u64, Span)>,
    coeffs: Option<(Vec<f64>, Span)>,
    first_span: Option<Span>,
}

/// Build an `EngineSpec` from a parsed program and engine parameters.
///
/// Statements may arrive in any order; later assignments of the same field
/// override earlier ones (with a warning). Every index from 0 to the highest
/// mentioned must end up fully specified.
pub fn build_spec(program: &Program, params: EngineParams) -> SpecResult {
    let mut diagnostics = Vec::new();
    let mut partial: BTreeMap<u64, PartialFir> = BTreeMap::new();

    if params.num_time_slots == 0 {
        diagnostics.push(
            Diagnostic::new(
                DiagLevel::Error,
                program.span,
                "engine must have at least one time slot",
            )
            .with_code(codes::E0002),
        );
    }
    if !(params.clock_freq > 0.0) {
        diagnostics.push(
            Diagnostic::new(
                DiagLevel::Error,
                program.span,
                format!("clock frequency must be positive (got {})", params.clock_freq),
            )
            .with_code(codes::E0002),
        );
    }

    for stmt in &program.statements {
        let index = stmt.fir_index();
        if index > MAX_FIR_INDEX {
            diagnostics.push(
                Diagnostic::new(
                    DiagLevel::Error,
                    stmt.span,
                    format!("FIR index {index} exceeds the maximum of {MAX_FIR_INDEX}"),
                )
                .with_code(codes::E0002),
            );
            continue;
        }
        let entry = partial.entry(index).or_default();
        if entry.first_span.is_none() {
            entry.first_span = Some(stmt.span);
        }
        match &stmt.kind {
            StatementKind::SampleRate(s) => {
                if entry.rate.is_some() {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagLevel::Warning,
                            s.rate_span,
                            format!("FIR[{index}].sampleRate redefined; the later value wins"),
                        )
                        .with_code(codes::W0100),
                    );
                }
                entry.rate = Some((s.rate, s.rate_span));
            }
            StatementKind::Coeffs(s) => {
                if entry.coeffs.is_some() {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagLevel::Warning,
                            stmt.span,
                            format!("FIR[{index}].coeff redefined; the later value wins"),
                        )
                        .with_code(codes::W0100),
                    );
                }
                let values = s.coeffs.iter().map(|(v, _)| *v).collect();
                entry.coeffs = Some((values, stmt.span));
            }
        }
    }

    if partial.is_empty() && diagnostics.is_empty() {
        diagnostics.push(
            Diagnostic::new(
                DiagLevel::Error,
                program.span,
                "specification defines no FIR filters",
            )
            .with_code(codes::E0002),
        );
    }

    // Indices must be contiguous from zero: a gap means a filter port with
    // no definition behind it.
    let num_firs = partial.keys().next_back().map_or(0, |&max| max + 1);
    let mut firs = Vec::with_capacity(num_firs as usize);
    for index in 0..num_firs {
        let Some(entry) = partial.get(&index) else {
            diagnostics.push(
                Diagnostic::new(
                    DiagLevel::Error,
                    program.span,
                    format!("FIR[{index}] is never defined but higher indices are"),
                )
                .with_code(codes::E0002),
            );
            continue;
        };
        let span = entry.first_span.unwrap_or(program.span);
        let rate = match entry.rate {
            Some((rate, rate_span)) => {
                if rate == 0 || rate > u64::from(u32::MAX) {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagLevel::Error,
                            rate_span,
                            format!("FIR[{index}] has an invalid sample rate ({rate})"),
                        )
                        .with_code(codes::E0002),
                    );
                    None
                } else {
                    Some(rate as u32)
                }
            }
            None => {
                diagnostics.push(
                    Diagnostic::new(
                        DiagLevel::Error,
                        span,
                        format!("FIR[{index}] is missing its sampleRate"),
                    )
                    .with_code(codes::E0002),
                );
                None
            }
        };
        let coeffs = match &entry.coeffs {
            Some((values, coeff_span)) => {
                if values.is_empty() {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagLevel::Error,
                            *coeff_span,
                            format!("FIR[{index}] has an empty coefficient list"),
                        )
                        .with_code(codes::E0002),
                    );
                    None
                } else {
                    Some(values.clone())
                }
            }
            None => {
                diagnostics.push(
                    Diagnostic::new(
                        DiagLevel::Error,
                        span,
                        format!("FIR[{index}] is missing its coeff list"),
                    )
                    .with_code(codes::E0002),
                );
                None
            }
        };
        if let (Some(sample_rate), Some(coeffs)) = (rate, coeffs) {
            firs.push(FirSpec {
                sample_rate,
                coeffs,
                span,
            });
        }
    }

    let spec = if crate::diag::has_errors(&diagnostics) {
        None
    } else {
        Some(EngineSpec { params, firs })
    };
    SpecResult { spec, diagnostics }
}

// ── Tests ────────────────────────────────────────────────────────────────
