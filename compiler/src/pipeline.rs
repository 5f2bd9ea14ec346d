// pipeline.rs — Compilation state and pass orchestration
//
// Holds all pass artifacts and runs the minimal set of passes for a given
// terminal PassId. Each pass's postcondition cert is checked as soon as the
// pass completes; a cert failure is an error diagnostic like any other.
//
// Preconditions: the spec must be set before calling run_pipeline.
// Postconditions: all artifacts for required passes are populated, or
//                 has_error is set.
// Failure modes: any pass emitting error-level diagnostics.
// Side effects: calls on_pass_complete callback after each pass for
//               immediate display.

use std::time::Instant;

use crate::ast::Span;
use crate::bind::BoundEngine;
use crate::codegen::GeneratedRtl;
use crate::diag::{codes, has_errors, DiagLevel, Diagnostic};
use crate::lower::LoweredEngine;
use crate::pass::{descriptor, required_passes, PassId, StageCert};
use crate::spec::EngineSpec;

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for hermetic builds.
///
/// `source_hash`: SHA-256 of the raw `.fsp` source text.
/// `params_fingerprint`: SHA-256 of the canonical engine-parameter string.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub params_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Hex string of the parameter fingerprint (64 characters).
    pub fn params_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.params_fingerprint)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        format!(
            "{{\n  \"source_hash\": \"{}\",\n  \"params_fingerprint\": \"{}\",\n  \"compiler_version\": \"{}\"\n}}\n",
            self.source_hash_hex(),
            self.params_fingerprint_hex(),
            self.compiler_version,
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Compute provenance from source text and engine parameters.
///
/// The parameter fingerprint hashes a canonical `name;clock;slots` string so
/// it is independent of CLI spelling (`-f 4e8` vs `-f 400000000`).
pub fn compute_provenance(source: &str, engine_name: &str, spec: &EngineSpec) -> Provenance {
    use sha2::{Digest, Sha256};

    let source_hash = {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    let params_fingerprint = {
        let canonical = format!(
            "name={engine_name};clock={:e};slots={}",
            spec.params.clock_freq, spec.params.num_time_slots
        );
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    Provenance {
        source_hash,
        params_fingerprint,
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Compilation state ──────────────────────────────────────────────────────

/// Holds all compilation artifacts and accumulated diagnostics.
pub struct CompilationState {
    pub engine_name: String,
    pub spec: EngineSpec,
    pub program_span: Span,
    pub bound: Option<BoundEngine>,
    pub lowered: Option<LoweredEngine>,
    pub rtl: Option<GeneratedRtl>,
    pub report: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Option<Provenance>,
}

impl CompilationState {
    pub fn new(engine_name: impl Into<String>, spec: EngineSpec, program_span: Span) -> Self {
        Self {
            engine_name: engine_name.into(),
            spec,
            program_span,
            bound: None,
            lowered: None,
            rtl: None,
            report: None,
            diagnostics: Vec::new(),
            has_error: false,
            provenance: None,
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed due to error-level diagnostics in a pass.
/// The specific diagnostics are available in `CompilationState.diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

/// Per-pass post-processing: callback, accumulate, verbose, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: std::time::Duration,
    verbose: bool,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_errors(&diags);
    state.diagnostics.extend(diags);
    if verbose {
        eprintln!(
            "fec: {} complete, {:.1}ms",
            descriptor(pass_id).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

/// Diagnostic for a failed stage cert, naming the unmet obligations.
fn cert_failure_diag(
    span: Span,
    code: crate::diag::DiagCode,
    what: &str,
    cert: &impl StageCert,
) -> Diagnostic {
    let failed: Vec<_> = cert
        .obligations()
        .iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| *name)
        .collect();
    Diagnostic::new(
        DiagLevel::Error,
        span,
        format!("{what} verification failed: {}", failed.join(", ")),
    )
    .with_code(code)
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → verify cert → on_pass_complete → verbose →
/// error check.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    verbose: bool,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    let passes = required_passes(terminal);

    for &pass_id in &passes {
        match pass_id {
            PassId::Bind => {
                let t = Instant::now();
                let result = crate::bind::bind(&state.spec);
                let elapsed = t.elapsed();
                let mut diags = result.diagnostics;
                state.bound = result.engine;
                if let Some(bound) = &state.bound {
                    let cert = crate::bind::verify_bound(&state.spec, bound);
                    if !cert.all_pass() {
                        diags.push(cert_failure_diag(
                            state.program_span,
                            codes::E0600,
                            "bind",
                            &cert,
                        ));
                    }
                } else if !has_errors(&diags) {
                    // A missing engine must be explained by an error.
                    diags.push(
                        Diagnostic::new(
                            DiagLevel::Error,
                            state.program_span,
                            "binding produced no engine and no diagnostics",
                        )
                        .with_code(codes::E0500),
                    );
                }
                finish_pass(state, pass_id, diags, elapsed, verbose, &mut on_pass_complete)?;
            }
            PassId::Lower => {
                let t = Instant::now();
                let bound = state.bound.as_ref().unwrap();
                let result = crate::lower::lower(&state.spec, bound, state.program_span);
                let elapsed = t.elapsed();
                let mut diags = result.diagnostics;
                state.lowered = result.lowered;
                if let Some(lowered) = &state.lowered {
                    let cert = crate::lower::verify_lower(bound, lowered);
                    if !cert.all_pass() {
                        diags.push(cert_failure_diag(
                            state.program_span,
                            codes::E0601,
                            "lowering",
                            &cert,
                        ));
                    }
                }
                finish_pass(state, pass_id, diags, elapsed, verbose, &mut on_pass_complete)?;
            }
            PassId::Codegen => {
                let t = Instant::now();
                let rtl = crate::codegen::generate_rtl(
                    &state.engine_name,
                    state.lowered.as_ref().unwrap(),
                );
                let elapsed = t.elapsed();
                state.rtl = Some(rtl);
                finish_pass(
                    state,
                    pass_id,
                    Vec::new(),
                    elapsed,
                    verbose,
                    &mut on_pass_complete,
                )?;
            }
            PassId::Report => {
                let t = Instant::now();
                let report = crate::report::render_report(
                    &state.engine_name,
                    &state.spec,
                    state.bound.as_ref().unwrap(),
                    state.lowered.as_ref().unwrap(),
                );
                let elapsed = t.elapsed();
                state.report = Some(report);
                finish_pass(
                    state,
                    pass_id,
                    Vec::new(),
                    elapsed,
                    verbose,
                    &mut on_pass_complete,
                )?;
            }
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EngineParams, FirSpec};
    use chumsky::span::Span as _;

    fn dummy_span() -> Span {
        Span::new((), 0..0)
    }

    fn state_for(firs: Vec<FirSpec>) -> CompilationState {
        let spec = EngineSpec {
            params: EngineParams {
                clock_freq: 400.0,
                num_time_slots: 16,
            },
            firs,
        };
        CompilationState::new("engine", spec, dummy_span())
    }

    fn one_filter() -> Vec<FirSpec> {
        vec![FirSpec {
            sample_rate: 50,
            coeffs: vec![0.25, 0.5, 0.25, 0.125],
            span: dummy_span(),
        }]
    }

    #[test]
    fn runs_to_codegen() {
        let mut state = state_for(one_filter());
        run_pipeline(&mut state, PassId::Codegen, false, |_, _| {}).unwrap();
        assert!(state.bound.is_some());
        assert!(state.lowered.is_some());
        assert!(state.rtl.is_some());
        assert!(state.report.is_none(), "report pass not requested");
        assert!(!state.has_error);
    }

    #[test]
    fn bind_terminal_stops_early() {
        let mut state = state_for(one_filter());
        run_pipeline(&mut state, PassId::Bind, false, |_, _| {}).unwrap();
        assert!(state.bound.is_some());
        assert!(state.lowered.is_none());
    }

    #[test]
    fn rate_error_stops_pipeline() {
        let mut state = state_for(vec![FirSpec {
            sample_rate: 400,
            coeffs: vec![0.5],
            span: dummy_span(),
        }]);
        let err = run_pipeline(&mut state, PassId::Codegen, false, |_, _| {}).unwrap_err();
        assert_eq!(err.failing_pass, PassId::Bind);
        assert!(state.has_error);
        assert!(state.rtl.is_none());
    }

    #[test]
    fn callback_sees_every_pass() {
        let mut state = state_for(one_filter());
        let mut seen = Vec::new();
        run_pipeline(&mut state, PassId::Report, false, |pass, _| seen.push(pass)).unwrap();
        assert_eq!(seen, vec![PassId::Bind, PassId::Lower, PassId::Report]);
    }

    #[test]
    fn provenance_is_stable() {
        let state = state_for(one_filter());
        let a = compute_provenance("FIR[0].sampleRate = 50;", "engine", &state.spec);
        let b = compute_provenance("FIR[0].sampleRate = 50;", "engine", &state.spec);
        assert_eq!(a.source_hash, b.source_hash);
        assert_eq!(a.params_fingerprint, b.params_fingerprint);

        let c = compute_provenance("FIR[0].sampleRate = 51;", "engine", &state.spec);
        assert_ne!(a.source_hash, c.source_hash);
        assert_eq!(a.params_fingerprint, c.params_fingerprint);
    }

    #[test]
    fn provenance_json_shape() {
        let state = state_for(one_filter());
        let prov = compute_provenance("x", "engine", &state.spec);
        let json: serde_json::Value = serde_json::from_str(&prov.to_json()).unwrap();
        assert_eq!(json["source_hash"].as_str().unwrap().len(), 64);
        assert_eq!(json["compiler_version"], env!("CARGO_PKG_VERSION"));
    }
}
