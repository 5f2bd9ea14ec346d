// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used across all compiler phases.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0100`, `W0100`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different semantic
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable diagnostic codes.
///
/// E00xx: front end (syntax, malformed engine spec).
/// E01xx: user-facing binding errors (reported with the offending FIR).
/// E05xx: internal-invariant violations (defects, never clamped away).
/// E06xx: stage-cert verification failures.
/// W01xx: warnings.
pub mod codes {
    use super::DiagCode;

    /// Syntax error in the `.fsp` source.
    pub const E0001: DiagCode = DiagCode("E0001");
    /// Malformed engine specification (missing field, bad index, empty bank).
    pub const E0002: DiagCode = DiagCode("E0002");

    /// Sample rate exceeds half the clock frequency.
    pub const E0100: DiagCode = DiagCode("E0100");
    /// Coefficient count exceeds the computed update interval.
    pub const E0101: DiagCode = DiagCode("E0101");

    /// Bind search exhausted all MACs including a fresh one.
    pub const E0500: DiagCode = DiagCode("E0500");
    /// FIFO depth exceeds the 6-bit descriptor field.
    pub const E0501: DiagCode = DiagCode("E0501");
    /// Coefficient memory exceeds the 10-bit offset field.
    pub const E0502: DiagCode = DiagCode("E0502");
    /// Coefficient outside the representable (-1, 1] range.
    pub const E0503: DiagCode = DiagCode("E0503");

    /// Bind verification failed (B1-B4 obligations not met).
    pub const E0600: DiagCode = DiagCode("E0600");
    /// Lowering verification failed (L1-L3 obligations not met).
    pub const E0601: DiagCode = DiagCode("E0601");

    /// A FIR field was given more than once; the later value wins.
    pub const W0100: DiagCode = DiagCode("W0100");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any phase.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code or hint.
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// True if any diagnostic in the slice is error-level.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        use chumsky::span::Span as _;
        Span::new((), 0..1)
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, dummy_span(), "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::new(DiagLevel::Warning, dummy_span(), "sampleRate redefined")
            .with_code(codes::W0100);
        assert_eq!(format!("{d}"), "warning[W0100]: sampleRate redefined");
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::new(DiagLevel::Error, dummy_span(), "too many coefficients")
            .with_code(codes::E0101)
            .with_hint("reduce the tap count or raise the sample rate");

        assert_eq!(d.code, Some(codes::E0101));
        assert_eq!(
            d.hint.as_deref(),
            Some("reduce the tap count or raise the sample rate")
        );
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let w = Diagnostic::new(DiagLevel::Warning, dummy_span(), "w");
        let e = Diagnostic::new(DiagLevel::Error, dummy_span(), "e");
        assert!(!has_errors(&[w.clone()]));
        assert!(has_errors(&[w, e]));
    }
}
