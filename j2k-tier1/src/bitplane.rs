//! Bitplane decoding, described in Annex D.
//!
//! JPEG2000 groups the samples of each code-block into their constituent
//! bit planes and uses a special context-modeling approach to encode the
//! bits using the arithmetic encoder. In this stage, we need to "revert" the
//! context-modeling so that we can extract the magnitudes and signs of each
//! sample.
//!
//! Some of the references are taken from the
//! "JPEG2000 Standard for Image Compression" book instead of the specification.

use alloc::vec;
use alloc::vec::Vec;

use crate::arithmetic_decoder::BitDecoder;
use crate::context::{
    ContextModel, RUN_LENGTH_CONTEXT, UNIFORM_CONTEXT, magnitude_refinement_label,
    sign_coding_label, zero_coding_label,
};
use crate::error::DecodingError;
use crate::pass::{CodingPass, PassKind};
use crate::{CodeBlock, SubBandType};

/// The number of padding samples on each side of the state grid, so that
/// neighbors can be looked up without bounds checks.
pub(crate) const EXTRA_CONTEXT_WORDS: usize = 1;

/// The sample is significant.
const SIGNIFICANT: u8 = 1 << 0;
/// The sample is negative. Only meaningful if the sample is significant.
const NEGATIVE: u8 = 1 << 1;
/// The sample has been refined at least once.
const REFINED: u8 = 1 << 2;
/// The sample has been coded in the significance propagation pass of the
/// current bit-plane.
const VISITED: u8 = 1 << 3;

/// The sign bit of a sample.
const SIGN_BIT: i32 = i32::MIN;

/// The state of a code-block while its coding passes are decoded.
pub(crate) struct CodeBlockDecodeContext {
    /// The state flags of each sample, with `EXTRA_CONTEXT_WORDS` padding
    /// on each side.
    flags: Vec<u8>,
    /// The decoded samples in sign-magnitude form, row-major.
    samples: Vec<i32>,
    width: u32,
    height: u32,
    stride: usize,
    sub_band_type: SubBandType,
    vertically_causal: bool,
    /// The shift from a bit-plane to its bit position in a sample, chosen
    /// such that the most significant bit-plane ends up in bit 30.
    shift: u8,
    /// The contexts of the arithmetic decoder.
    pub(crate) contexts: ContextModel,
}

impl CodeBlockDecodeContext {
    pub(crate) fn new(code_block: &CodeBlock) -> Self {
        let stride = code_block.width as usize + 2 * EXTRA_CONTEXT_WORDS;
        let padded_height = code_block.height as usize + 2 * EXTRA_CONTEXT_WORDS;

        Self {
            flags: vec![0; stride * padded_height],
            samples: vec![0; code_block.width as usize * code_block.height as usize],
            width: code_block.width,
            height: code_block.height,
            stride,
            sub_band_type: code_block.sub_band_type,
            vertically_causal: code_block.style.vertically_causal_context,
            shift: 31 - code_block.num_bitplanes.min(31),
            contexts: ContextModel::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub(crate) fn into_samples(self) -> Vec<i32> {
        self.samples
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        (y as usize + EXTRA_CONTEXT_WORDS) * self.stride + x as usize + EXTRA_CONTEXT_WORDS
    }

    #[inline(always)]
    pub(crate) fn is_significant(&self, idx: usize) -> bool {
        self.flags[idx] & SIGNIFICANT != 0
    }

    #[inline(always)]
    pub(crate) fn is_visited(&self, idx: usize) -> bool {
        self.flags[idx] & VISITED != 0
    }

    #[inline(always)]
    pub(crate) fn is_refined(&self, idx: usize) -> bool {
        self.flags[idx] & REFINED != 0
    }

    #[inline(always)]
    pub(crate) fn set_visited(&mut self, idx: usize) {
        self.flags[idx] |= VISITED;
    }

    #[inline(always)]
    pub(crate) fn set_refined(&mut self, idx: usize) {
        self.flags[idx] |= REFINED;
    }

    /// Mark the sample as significant with the given sign bit (1 meaning
    /// negative), and set its bit in the given bit-plane.
    pub(crate) fn set_significant(&mut self, x: u32, y: u32, sign: u32, bitplane: u8) {
        let idx = self.index(x, y);
        self.flags[idx] |= SIGNIFICANT;

        if sign != 0 {
            self.flags[idx] |= NEGATIVE;
            self.samples[(y * self.width + x) as usize] |= SIGN_BIT;
        }

        self.set_magnitude_bit(x, y, bitplane);
    }

    #[inline(always)]
    pub(crate) fn set_magnitude_bit(&mut self, x: u32, y: u32, bitplane: u8) {
        self.samples[(y * self.width + x) as usize] |= 1 << (bitplane + self.shift);
    }

    /// Clear the visited state of all samples at the end of a bit-plane.
    pub(crate) fn clear_visited(&mut self) {
        for flags in &mut self.flags {
            *flags &= !VISITED;
        }
    }

    /// Whether the neighbors below the sample in row `y` must be ignored.
    #[inline(always)]
    fn suppress_below(&self, y: u32) -> bool {
        // "[...] the contexts of the samples in the last row of a stripe
        // are formed as if the samples of the next stripe were
        // insignificant." (D.7)
        self.vertically_causal && y % 4 == 3
    }

    /// Return the number of significant horizontal, vertical and diagonal
    /// neighbors of the sample at `idx` in row `y`.
    #[inline(always)]
    fn neighbor_significance(&self, idx: usize, y: u32) -> (u8, u8, u8) {
        let sig = |i: usize| self.flags[i] & SIGNIFICANT;
        let above = idx - self.stride;
        let below = idx + self.stride;

        let horizontal = sig(idx - 1) + sig(idx + 1);
        let mut vertical = sig(above);
        let mut diagonal = sig(above - 1) + sig(above + 1);

        if !self.suppress_below(y) {
            vertical += sig(below);
            diagonal += sig(below - 1) + sig(below + 1);
        }

        (horizontal, vertical, diagonal)
    }

    #[inline(always)]
    pub(crate) fn has_significant_neighbor(&self, idx: usize, y: u32) -> bool {
        let (h, v, d) = self.neighbor_significance(idx, y);
        h + v + d != 0
    }

    /// Return the context label for zero coding of the sample at `idx`.
    #[inline(always)]
    pub(crate) fn zero_coding_label(&self, idx: usize, y: u32) -> u8 {
        let (h, v, d) = self.neighbor_significance(idx, y);
        zero_coding_label(self.sub_band_type, h, v, d)
    }

    /// Return the context label for magnitude refinement of the sample at
    /// `idx`.
    #[inline(always)]
    pub(crate) fn magnitude_refinement_label(&self, idx: usize, y: u32) -> u8 {
        magnitude_refinement_label(self.is_refined(idx), self.has_significant_neighbor(idx, y))
    }

    /// Return the context label and XOR bit for coding the sign of the
    /// sample at `idx`.
    #[inline(always)]
    pub(crate) fn sign_coding_label(&self, idx: usize, y: u32) -> (u8, u32) {
        let contribution = |i: usize| -> i8 {
            let flags = self.flags[i];

            if flags & SIGNIFICANT == 0 {
                0
            } else if flags & NEGATIVE != 0 {
                -1
            } else {
                1
            }
        };

        let horizontal = contribution(idx - 1) + contribution(idx + 1);
        let mut vertical = contribution(idx - self.stride);

        if !self.suppress_below(y) {
            vertical += contribution(idx + self.stride);
        }

        sign_coding_label(horizontal, vertical)
    }
}

/// Iterate over the columns of all stripes in scan order (D.1), yielding
/// `(x, y_start, y_end)` for each column.
///
/// Stripes are four rows high, except for possibly the last one.
pub(crate) fn stripe_columns(width: u32, height: u32) -> impl Iterator<Item = (u32, u32, u32)> {
    (0..height)
        .step_by(4)
        .flat_map(move |y_start| (0..width).map(move |x| (x, y_start, (y_start + 4).min(height))))
}

/// Decode a single coding pass.
pub(crate) fn decode_pass(
    ctx: &mut CodeBlockDecodeContext,
    pass: CodingPass,
    segmentation_symbols: bool,
    decoder: &mut impl BitDecoder,
) -> Result<(), DecodingError> {
    match pass.kind {
        PassKind::SignificancePropagation => {
            significance_propagation_pass(ctx, pass.bitplane, decoder);
        }
        PassKind::MagnitudeRefinement => {
            magnitude_refinement_pass(ctx, pass.bitplane, decoder);
        }
        PassKind::Cleanup => {
            cleanup_pass(ctx, pass.bitplane, decoder);

            if segmentation_symbols {
                decode_segmentation_symbol(ctx, decoder)?;
            }
        }
    }

    Ok(())
}

/// Perform the significance propagation pass (Section D.3.1).
fn significance_propagation_pass(
    ctx: &mut CodeBlockDecodeContext,
    bitplane: u8,
    decoder: &mut impl BitDecoder,
) {
    for (x, y_start, y_end) in stripe_columns(ctx.width, ctx.height) {
        for y in y_start..y_end {
            let idx = ctx.index(x, y);

            // "The significance propagation pass only includes bits of
            // coefficients that were insignificant (the significance state
            // has yet to be set) and have a non-zero context."
            if ctx.is_significant(idx) || !ctx.has_significant_neighbor(idx, y) {
                continue;
            }

            let label = ctx.zero_coding_label(idx, y);
            let bit = decoder.read_bit(ctx.contexts.get_mut(label));
            ctx.set_visited(idx);

            if bit == 1 {
                decode_sign_bit(ctx, x, y, idx, bitplane, decoder);
            }
        }
    }
}

/// Perform the magnitude refinement pass (Section D.3.3).
fn magnitude_refinement_pass(
    ctx: &mut CodeBlockDecodeContext,
    bitplane: u8,
    decoder: &mut impl BitDecoder,
) {
    for (x, y_start, y_end) in stripe_columns(ctx.width, ctx.height) {
        for y in y_start..y_end {
            let idx = ctx.index(x, y);

            // Samples that became significant in the significance
            // propagation pass of this bit-plane are skipped.
            if !ctx.is_significant(idx) || ctx.is_visited(idx) {
                continue;
            }

            let label = ctx.magnitude_refinement_label(idx, y);

            if decoder.read_bit(ctx.contexts.get_mut(label)) == 1 {
                ctx.set_magnitude_bit(x, y, bitplane);
            }

            ctx.set_refined(idx);
        }
    }
}

/// Perform the cleanup pass, described in Section D.3.4.
///
/// See also the flow chart in Figure 7.3 in the JPEG2000 book.
fn cleanup_pass(ctx: &mut CodeBlockDecodeContext, bitplane: u8, decoder: &mut impl BitDecoder) {
    for (x, y_start, y_end) in stripe_columns(ctx.width, ctx.height) {
        let mut y = y_start;

        // Run-length coding is only used for full columns of four samples
        // that are all uncoded and have no significant neighbors.
        let use_run_length = y_end - y_start == 4
            && (y_start..y_end).all(|y| {
                let idx = ctx.index(x, y);

                !ctx.is_significant(idx)
                    && !ctx.is_visited(idx)
                    && !ctx.has_significant_neighbor(idx, y)
            });

        if use_run_length {
            if decoder.read_bit(ctx.contexts.get_mut(RUN_LENGTH_CONTEXT)) == 0 {
                // All four samples stay insignificant.
                continue;
            }

            // The position of the first significant sample is coded as a
            // two-bit number with the uniform context.
            let uniform = ctx.contexts.get_mut(UNIFORM_CONTEXT);
            let high = decoder.read_bit(uniform);
            let low = decoder.read_bit(uniform);
            y = y_start + ((high << 1) | low);

            let idx = ctx.index(x, y);
            decode_sign_bit(ctx, x, y, idx, bitplane, decoder);
            y += 1;
        }

        for y in y..y_end {
            let idx = ctx.index(x, y);

            if ctx.is_significant(idx) || ctx.is_visited(idx) {
                continue;
            }

            let label = ctx.zero_coding_label(idx, y);

            if decoder.read_bit(ctx.contexts.get_mut(label)) == 1 {
                decode_sign_bit(ctx, x, y, idx, bitplane, decoder);
            }
        }
    }

    ctx.clear_visited();
}

/// Decode the sign of a sample that just became significant and record it.
#[inline(always)]
fn decode_sign_bit(
    ctx: &mut CodeBlockDecodeContext,
    x: u32,
    y: u32,
    idx: usize,
    bitplane: u8,
    decoder: &mut impl BitDecoder,
) {
    let (label, xor_bit) = ctx.sign_coding_label(idx, y);
    let sign = decoder.read_sign(ctx.contexts.get_mut(label), xor_bit);
    ctx.set_significant(x, y, sign, bitplane);
}

/// Decode the segmentation symbol at the end of a cleanup pass (D.5).
fn decode_segmentation_symbol(
    ctx: &mut CodeBlockDecodeContext,
    decoder: &mut impl BitDecoder,
) -> Result<(), DecodingError> {
    let uniform = ctx.contexts.get_mut(UNIFORM_CONTEXT);
    let mut symbol = 0;

    for _ in 0..4 {
        symbol = (symbol << 1) | decoder.read_bit(uniform);
    }

    if symbol != 0b1010 {
        return Err(DecodingError::SegmentationMismatch);
    }

    Ok(())
}
