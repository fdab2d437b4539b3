//! Context modeling, described in D.3.
//!
//! Every decision of the coding passes is decoded using one of 19 contexts.
//! Which one is chosen depends on the significance (and signs) of the
//! neighbors of the current sample.

use crate::SubBandType;
use crate::arithmetic_decoder::ArithmeticDecoderContext;

/// The number of contexts (Table D.7).
pub(crate) const NUM_CONTEXTS: usize = 19;

/// The first context used for sign coding.
pub(crate) const SIGN_CONTEXT_START: u8 = 9;
/// The first context used for magnitude refinement.
pub(crate) const MAGNITUDE_CONTEXT_START: u8 = 14;
/// The context used for run-length coding.
pub(crate) const RUN_LENGTH_CONTEXT: u8 = 17;
/// The uniform context, used for run-length positions and the segmentation
/// symbol.
pub(crate) const UNIFORM_CONTEXT: u8 = 18;

/// The probability states of all contexts of a code-block.
#[derive(Debug, Clone)]
pub(crate) struct ContextModel {
    contexts: [ArithmeticDecoderContext; NUM_CONTEXTS],
}

impl ContextModel {
    pub(crate) fn new() -> Self {
        let mut model = Self {
            contexts: [ArithmeticDecoderContext::default(); NUM_CONTEXTS],
        };
        model.reset();

        model
    }

    /// Reset all contexts to their initial states from Table D.7.
    ///
    /// All contexts start with an MPS of 0. The uniform context starts in
    /// state 46, the run-length context in state 3, the all-zero-neighbors
    /// context in state 4 and all others in state 0.
    pub(crate) fn reset(&mut self) {
        self.contexts = [ArithmeticDecoderContext::default(); NUM_CONTEXTS];
        self.contexts[0] = ArithmeticDecoderContext::new(4);
        self.contexts[RUN_LENGTH_CONTEXT as usize] = ArithmeticDecoderContext::new(3);
        self.contexts[UNIFORM_CONTEXT as usize] = ArithmeticDecoderContext::new(46);
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self, label: u8) -> &mut ArithmeticDecoderContext {
        &mut self.contexts[label as usize]
    }

    #[cfg(test)]
    pub(crate) fn get(&self, label: u8) -> ArithmeticDecoderContext {
        self.contexts[label as usize]
    }
}

/// Return the context label for zero coding (Table D.1), given the number
/// of significant horizontal (0-2), vertical (0-2) and diagonal (0-4)
/// neighbors.
#[inline(always)]
pub(crate) fn zero_coding_label(
    sub_band_type: SubBandType,
    mut horizontal: u8,
    mut vertical: u8,
    diagonal: u8,
) -> u8 {
    match sub_band_type {
        SubBandType::LowLow | SubBandType::LowHigh | SubBandType::HighLow => {
            if sub_band_type == SubBandType::HighLow {
                core::mem::swap(&mut horizontal, &mut vertical);
            }

            if horizontal == 2 {
                8
            } else if horizontal == 1 && vertical >= 1 {
                7
            } else if horizontal == 1 && diagonal >= 1 {
                6
            } else if horizontal == 1 {
                5
            } else if vertical == 2 {
                4
            } else if vertical == 1 {
                3
            } else if diagonal >= 2 {
                2
            } else if diagonal == 1 {
                1
            } else {
                0
            }
        }
        SubBandType::HighHigh => {
            let hv = horizontal + vertical;

            if diagonal >= 3 {
                8
            } else if hv >= 1 && diagonal == 2 {
                7
            } else if diagonal == 2 {
                6
            } else if hv >= 2 && diagonal == 1 {
                5
            } else if hv == 1 && diagonal == 1 {
                4
            } else if diagonal == 1 {
                3
            } else if hv >= 2 {
                2
            } else if hv == 1 {
                1
            } else {
                0
            }
        }
    }
}

/// Return the context label and XOR bit for sign coding (Tables D.2 and
/// D.3), given the clamped horizontal and vertical sign contributions.
#[inline(always)]
pub(crate) fn sign_coding_label(horizontal: i8, vertical: i8) -> (u8, u32) {
    let (offset, xor_bit) = match (horizontal.signum(), vertical.signum()) {
        (1, 1) => (4, 0),
        (1, 0) => (3, 0),
        (1, -1) => (2, 0),
        (0, 1) => (1, 0),
        (0, 0) => (0, 0),
        (0, -1) => (1, 1),
        (-1, 1) => (2, 1),
        (-1, 0) => (3, 1),
        _ => (4, 1),
    };

    (SIGN_CONTEXT_START + offset, xor_bit)
}

/// Return the context label for magnitude refinement (Table D.4).
#[inline(always)]
pub(crate) fn magnitude_refinement_label(refined: bool, has_significant_neighbor: bool) -> u8 {
    if refined {
        MAGNITUDE_CONTEXT_START + 2
    } else if has_significant_neighbor {
        MAGNITUDE_CONTEXT_START + 1
    } else {
        MAGNITUDE_CONTEXT_START
    }
}
