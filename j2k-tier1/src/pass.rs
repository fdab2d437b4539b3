//! The sequence of coding passes of a code-block (D.1).
//!
//! The first pass is always a cleanup pass on the most significant coded
//! bit-plane, after which each bit-plane is decoded with a significance
//! propagation, a magnitude refinement and a cleanup pass.

use crate::CodeBlockStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassKind {
    SignificancePropagation,
    MagnitudeRefinement,
    Cleanup,
}

/// A single coding pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CodingPass {
    pub(crate) kind: PassKind,
    pub(crate) bitplane: u8,
}

impl CodingPass {
    /// The first pass of a code-block whose most significant coded
    /// bit-plane is `bitplane`.
    pub(crate) fn first(bitplane: u8) -> Self {
        Self {
            kind: PassKind::Cleanup,
            bitplane,
        }
    }

    /// The pass following this one, or `None` if this was the cleanup pass
    /// of the least significant bit-plane.
    pub(crate) fn next(self) -> Option<Self> {
        match self.kind {
            PassKind::Cleanup => Some(Self {
                kind: PassKind::SignificancePropagation,
                bitplane: self.bitplane.checked_sub(1)?,
            }),
            PassKind::SignificancePropagation => Some(Self {
                kind: PassKind::MagnitudeRefinement,
                ..self
            }),
            PassKind::MagnitudeRefinement => Some(Self {
                kind: PassKind::Cleanup,
                ..self
            }),
        }
    }

    /// Whether this pass, the `index`-th pass of the code-block, is stored
    /// raw instead of arithmetic-coded.
    ///
    /// In selective arithmetic coding bypass mode, the significance
    /// propagation and magnitude refinement passes are raw, starting with
    /// the fourth bit-plane (Table D.9).
    pub(crate) fn is_raw(self, index: u16, style: &CodeBlockStyle) -> bool {
        style.selective_arithmetic_coding_bypass && index >= 10 && self.kind != PassKind::Cleanup
    }

    /// Whether the codeword segment ends with this pass (Table D.8).
    ///
    /// The last pass of a code-block is always terminated, which isn't
    /// reflected here.
    pub(crate) fn terminates(self, index: u16, style: &CodeBlockStyle) -> bool {
        if style.termination_on_each_pass {
            true
        } else if style.selective_arithmetic_coding_bypass {
            // Pass 9 ends the last arithmetic-coded segment before the
            // first raw one. After that, each raw significance propagation
            // and magnitude refinement pair is a segment, and so is each
            // cleanup pass.
            index >= 9 && self.kind != PassKind::SignificancePropagation
        } else {
            false
        }
    }
}
