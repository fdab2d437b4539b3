//! Decoding of a code-block whose data arrives over several quality layers.
//!
//! Each layer contributes zero or more codeword segments to a code-block.
//! The data of a codeword is only decoded once it is complete, i.e. when the
//! last pass it contains is a termination point or when the final layer has
//! been contributed. That way, the arithmetic decoder sees the codeword
//! exactly as the encoder produced it, no matter how the data was split up
//! between the layers.

use alloc::vec::Vec;

use crate::arithmetic_decoder::{ArithmeticDecoder, BitDecoder, RawDecoder};
use crate::bitplane::{self, CodeBlockDecodeContext};
use crate::error::{DecodeError, DecodingError, Result, bail};
use crate::log::{ldebug, ltrace, lwarn};
use crate::pass::{CodingPass, PassKind};
use crate::{CodeBlock, DecodeSettings, Segment};

/// A decoder for a single code-block that receives its data layer by layer.
pub struct CodeBlockDecoder {
    code_block: CodeBlock,
    ctx: CodeBlockDecodeContext,
    /// The data of the codeword that hasn't been decoded yet.
    pending: Vec<u8>,
    /// The number of passes in `pending`.
    pending_passes: u16,
    /// The number of passes contributed so far, including pending ones.
    passes_contributed: u16,
    passes_decoded: u16,
    last_pass: Option<CodingPass>,
    finished: bool,
    error: Option<DecodeError>,
}

impl CodeBlockDecoder {
    /// Create a new decoder for the given code-block.
    pub fn new(code_block: &CodeBlock) -> Result<Self> {
        code_block.validate()?;

        Ok(Self {
            code_block: *code_block,
            ctx: CodeBlockDecodeContext::new(code_block),
            pending: Vec::new(),
            pending_passes: 0,
            passes_contributed: 0,
            passes_decoded: 0,
            last_pass: None,
            finished: false,
            error: None,
        })
    }

    /// Add the segments that a quality layer contributes to the code-block.
    ///
    /// If `final_layer` is set, all remaining data is decoded and further
    /// contributions are ignored.
    ///
    /// In strict mode, a decoding error is returned. Otherwise, it is
    /// recorded in the decoded code-block and all further data is ignored,
    /// keeping the samples decoded so far.
    pub fn contribute(
        &mut self,
        segments: &[Segment<'_>],
        final_layer: bool,
        settings: &DecodeSettings<'_>,
    ) -> Result<()> {
        if self.finished || self.error.is_some() {
            ltrace!("ignoring contribution to finished code-block");
            return Ok(());
        }

        for segment in segments {
            if segment.num_passes == 0 {
                ltrace!(
                    "skipping segment without coding passes ({} bytes)",
                    segment.data.len()
                );
                continue;
            }

            self.pending.extend_from_slice(segment.data);
            self.pending_passes = self.pending_passes.saturating_add(segment.num_passes as u16);
            self.passes_contributed = self
                .passes_contributed
                .saturating_add(segment.num_passes as u16);

            let last_index = self.passes_contributed - 1;
            let terminated = self
                .pass_at(last_index)
                .is_none_or(|pass| self.is_termination_point(pass, last_index));

            if terminated {
                self.flush(settings)?;

                if self.error.is_some() {
                    return Ok(());
                }
            }
        }

        if final_layer {
            self.flush(settings)?;
            self.finished = true;
        }

        Ok(())
    }

    /// Decode all remaining data and return the decoded code-block.
    pub fn into_decoded(mut self, settings: &DecodeSettings<'_>) -> Result<DecodedCodeBlock> {
        if self.error.is_none() {
            self.flush(settings)?;
        }

        Ok(DecodedCodeBlock {
            width: self.ctx.width(),
            height: self.ctx.height(),
            finished: self.finished,
            passes_decoded: self.passes_decoded,
            last_bitplane: self.last_pass.map(|p| p.bitplane),
            error: self.error,
            shift: 31 - self.code_block.num_bitplanes,
            samples: self.ctx.into_samples(),
        })
    }

    /// The number of passes that have been decoded so far.
    pub fn passes_decoded(&self) -> u16 {
        self.passes_decoded
    }

    /// The error that stopped decoding, if any.
    pub fn error(&self) -> Option<DecodeError> {
        self.error
    }

    /// Return the pass with the given index, or `None` if the code-block
    /// doesn't have that many passes.
    fn pass_at(&self, index: u16) -> Option<CodingPass> {
        let start = self.code_block.start_bitplane()?;

        if index == 0 {
            return Some(CodingPass::first(start));
        }

        let planes_down = (index + 2) / 3;

        if planes_down > start as u16 {
            return None;
        }

        let kind = match (index - 1) % 3 {
            0 => PassKind::SignificancePropagation,
            1 => PassKind::MagnitudeRefinement,
            _ => PassKind::Cleanup,
        };

        Some(CodingPass {
            kind,
            bitplane: start - planes_down as u8,
        })
    }

    fn is_termination_point(&self, pass: CodingPass, index: u16) -> bool {
        pass.terminates(index, &self.code_block.style) || pass.next().is_none()
    }

    /// Decode the pending codeword, if any.
    fn flush(&mut self, settings: &DecodeSettings<'_>) -> Result<()> {
        if self.pending_passes == 0 {
            // The decoder is never run for a code-block without passes.
            self.pending.clear();
            return Ok(());
        }

        let data = core::mem::take(&mut self.pending);
        let num_passes = core::mem::take(&mut self.pending_passes);

        let result = self.decode_codeword(&data, num_passes, settings);

        // Reuse the allocation for the next codeword.
        self.pending = data;
        self.pending.clear();

        if let Err(e) = result {
            lwarn!(
                "failed to decode code-block after {} passes: {e}",
                self.passes_decoded
            );

            self.error = Some(e);

            if settings.strict {
                return Err(e);
            }
        }

        Ok(())
    }

    fn decode_codeword(
        &mut self,
        data: &[u8],
        num_passes: u16,
        settings: &DecodeSettings<'_>,
    ) -> Result<()> {
        let style = self.code_block.style;
        let first_index = self.passes_decoded;

        let Some(first_pass) = self.pass_at(first_index) else {
            bail!(DecodingError::TooManyCodingPasses);
        };

        ldebug!(
            "decoding {} passes starting at pass {} from {} bytes",
            num_passes,
            first_index,
            data.len()
        );

        if first_pass.is_raw(first_index, &style) {
            let mut decoder = RawDecoder::new(data);
            self.run_passes(&mut decoder, true, num_passes, settings)?;

            if let Some(e) = decoder.error() {
                bail!(e);
            }

            if style.predictable_termination
                && self.ends_at_termination_point()
                && decoder.check_padding()
            {
                bail!(DecodingError::PredictableTerminationFailure);
            }
        } else {
            let mut decoder = ArithmeticDecoder::new(data);
            self.run_passes(&mut decoder, false, num_passes, settings)?;

            if style.predictable_termination
                && self.ends_at_termination_point()
                && decoder.check_predictable_termination()
            {
                bail!(DecodingError::PredictableTerminationFailure);
            }
        }

        Ok(())
    }

    fn run_passes(
        &mut self,
        decoder: &mut impl BitDecoder,
        raw: bool,
        num_passes: u16,
        settings: &DecodeSettings<'_>,
    ) -> Result<()> {
        let style = self.code_block.style;

        for _ in 0..num_passes {
            if settings.is_cancelled() {
                bail!(DecodingError::Cancelled);
            }

            let index = self.passes_decoded;

            let Some(pass) = self.pass_at(index) else {
                bail!(DecodingError::TooManyCodingPasses);
            };

            if pass.is_raw(index, &style) != raw {
                bail!(DecodingError::InvalidSegment);
            }

            let result =
                bitplane::decode_pass(&mut self.ctx, pass, style.segmentation_symbols, decoder);
            self.last_pass = Some(pass);
            self.passes_decoded += 1;
            result?;

            if style.reset_context_probabilities {
                self.ctx.contexts.reset();
            }
        }

        Ok(())
    }

    /// Whether the last decoded pass ends a terminated codeword.
    fn ends_at_termination_point(&self) -> bool {
        self.last_pass
            .is_some_and(|pass| self.is_termination_point(pass, self.passes_decoded - 1))
    }
}

/// The result of decoding a code-block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCodeBlock {
    /// The width of the code-block.
    pub width: u32,
    /// The height of the code-block.
    pub height: u32,
    /// The decoded samples in row-major order.
    ///
    /// Each sample is stored in sign-magnitude form: bit 31 holds the sign
    /// and the magnitude is stored such that the most significant
    /// bit-plane of the sub-band is in bit 30.
    pub samples: Vec<i32>,
    /// The number of coding passes that were decoded.
    pub passes_decoded: u16,
    /// The least significant bit-plane that has been (partially) decoded,
    /// if any.
    pub last_bitplane: Option<u8>,
    /// Whether the final layer was contributed to the code-block.
    pub finished: bool,
    /// The error that stopped decoding, if any. The samples decoded up to
    /// that point are kept.
    pub error: Option<DecodeError>,
    shift: u8,
}

impl DecodedCodeBlock {
    /// The number of bits the magnitudes in `samples` are shifted to the
    /// left, i.e. `31` minus the number of bit-planes of the sub-band.
    pub fn magnitude_shift(&self) -> u8 {
        self.shift
    }

    /// Return the coefficient at the given position as a signed integer.
    ///
    /// # Panics
    /// Panics if the position is outside of the code-block.
    pub fn coefficient(&self, x: u32, y: u32) -> i32 {
        assert!(x < self.width && y < self.height, "position out of bounds");

        self.to_coefficient(self.samples[(y * self.width + x) as usize])
    }

    /// Return all coefficients as signed integers, in row-major order.
    pub fn coefficients(&self) -> impl Iterator<Item = i32> + '_ {
        self.samples.iter().map(|s| self.to_coefficient(*s))
    }

    fn to_coefficient(&self, sample: i32) -> i32 {
        let magnitude = (sample & i32::MAX) >> self.shift;

        if sample < 0 { -magnitude } else { magnitude }
    }
}
