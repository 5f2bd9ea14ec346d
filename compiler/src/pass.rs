// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the compiler's semantic passes (parse is outside the runner),
// their dependency edges, and the artifacts they produce. Used by the
// pipeline runner to compute minimal pass subsets for each --emit target.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each compiler pass (parse excluded — handled before the runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Bind,
    Lower,
    Codegen,
    Report,
}

/// Machine-readable artifact identifiers. Each maps to a concrete type
/// in the compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Bound,   // BoundEngine
    Lowered, // LoweredEngine
    Rtl,     // GeneratedRtl
    Report,  // HTML report text
}

// ── Stage certification ────────────────────────────────────────────────────

/// Machine-checkable evidence that a pass met its postconditions.
pub trait StageCert {
    fn all_pass(&self) -> bool;
    fn obligations(&self) -> Vec<(&'static str, bool)>;
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a compiler pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Bind => PassDescriptor {
            name: "bind",
            inputs: &[],
            outputs: &[ArtifactId::Bound],
            invariants: "every FIR bound, B1-B4 obligations verified",
        },
        PassId::Lower => PassDescriptor {
            name: "lower",
            inputs: &[PassId::Bind],
            outputs: &[ArtifactId::Lowered],
            invariants: "FIFO layouts planned, control vectors derived, L1-L3 verified",
        },
        PassId::Codegen => PassDescriptor {
            name: "codegen",
            inputs: &[PassId::Lower],
            outputs: &[ArtifactId::Rtl],
            invariants: "valid Verilog emitted, parameter vectors bit-exact",
        },
        PassId::Report => PassDescriptor {
            name: "report",
            inputs: &[PassId::Lower],
            outputs: &[ArtifactId::Report],
            invariants: "self-contained HTML document",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 4] = [PassId::Bind, PassId::Lower, PassId::Codegen, PassId::Report];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_passes_bind_is_minimal() {
        assert_eq!(required_passes(PassId::Bind), vec![PassId::Bind]);
    }

    #[test]
    fn required_passes_codegen_skips_report() {
        let passes = required_passes(PassId::Codegen);
        assert_eq!(passes, vec![PassId::Bind, PassId::Lower, PassId::Codegen]);
        assert!(!passes.contains(&PassId::Report));
    }

    #[test]
    fn required_passes_report_skips_codegen() {
        let passes = required_passes(PassId::Report);
        assert_eq!(passes, vec![PassId::Bind, PassId::Lower, PassId::Report]);
    }

    #[test]
    fn no_parse_in_pass_id() {
        // Parse is handled outside the runner; PassId has no Parse variant.
        for pass in &ALL_PASSES {
            assert_ne!(descriptor(*pass).name, "parse");
        }
    }

    #[test]
    fn all_descriptors_have_outputs() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            assert!(
                !desc.outputs.is_empty(),
                "pass {:?} has no outputs declared",
                pass
            );
        }
    }

    #[test]
    fn dependency_edges_are_consistent() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            for dep in desc.inputs {
                let dep_passes = required_passes(*pass);
                let dep_pos = dep_passes.iter().position(|p| p == dep);
                let self_pos = dep_passes.iter().position(|p| p == pass);
                assert!(
                    dep_pos.unwrap() < self_pos.unwrap(),
                    "{:?} depends on {:?} but it comes later in topological order",
                    pass,
                    dep
                );
            }
        }
    }
}
