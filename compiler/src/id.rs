// id.rs — Stable identity types for compiler artifacts
//
// FIRs are identified by their position in the specification, MACs by their
// creation order in the binder's arena. Both are plain integer handles so
// that bound state can be addressed without holding references into it.

use std::fmt;

use serde::Serialize;

/// Index of a FIR filter, in specification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FirId(pub u32);

/// Arena handle of a MAC pipeline, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MacId(pub u32);

/// Identity of one coefficient tap: which FIR, and which tap within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TapRef {
    pub fir: FirId,
    pub tap: u32,
}

impl FirId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl MacId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FirId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fir{}", self.0)
    }
}

impl fmt::Display for MacId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mac{}", self.0)
    }
}

impl fmt::Display for TapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.t{}", self.fir, self.tap)
    }
}
