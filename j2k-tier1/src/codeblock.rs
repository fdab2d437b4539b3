//! The description of a code-block and its codeword segments, as produced
//! by Tier-2 (packet) decoding.

use crate::error::{BitError, Result, ValidationError, bail, err};

/// The largest supported number of magnitude bit-planes.
///
/// The sign is stored in bit 31 of each sample, so at most 31 bits are
/// left for the magnitude.
pub const MAX_BITPLANE_COUNT: u8 = 31;

/// The largest width or height of a code-block (A.6.1).
pub const MAX_CODE_BLOCK_DIMENSION: u32 = 1024;

/// The largest number of samples in a code-block (A.6.1).
pub const MAX_CODE_BLOCK_AREA: u32 = 4096;

/// The orientation of the sub-band a code-block belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubBandType {
    /// The low-pass sub-band of the lowest resolution.
    LowLow = 0,
    /// Horizontally high-pass, vertically low-pass.
    HighLow = 1,
    /// Horizontally low-pass, vertically high-pass.
    LowHigh = 2,
    /// High-pass in both directions.
    HighHigh = 3,
}

/// Code-block style flags (Table A.19).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeBlockStyle {
    /// Significance propagation and magnitude refinement passes from the
    /// fourth bit-plane on are stored raw.
    pub selective_arithmetic_coding_bypass: bool,
    /// The contexts are reset to their initial states after each pass.
    pub reset_context_probabilities: bool,
    /// Each coding pass is terminated and forms its own codeword segment.
    pub termination_on_each_pass: bool,
    /// The context of a sample ignores the stripe below it.
    pub vertically_causal_context: bool,
    /// Terminated segments follow the predictable termination pattern, which
    /// can be used to detect errors.
    pub predictable_termination: bool,
    /// Each cleanup pass ends with the segmentation symbol `1010`.
    pub segmentation_symbols: bool,
}

impl CodeBlockStyle {
    /// Parse the code-block style byte of a COD or COC marker segment.
    pub fn from_u8(value: u8) -> Self {
        Self {
            selective_arithmetic_coding_bypass: (value & 0x01) != 0,
            reset_context_probabilities: (value & 0x02) != 0,
            termination_on_each_pass: (value & 0x04) != 0,
            vertically_causal_context: (value & 0x08) != 0,
            predictable_termination: (value & 0x10) != 0,
            segmentation_symbols: (value & 0x20) != 0,
        }
    }
}

/// A code-block to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBlock {
    /// The width of the code-block in samples.
    pub width: u32,
    /// The height of the code-block in samples.
    pub height: u32,
    /// The orientation of the sub-band the code-block belongs to.
    pub sub_band_type: SubBandType,
    /// The code-block style.
    pub style: CodeBlockStyle,
    /// The number of magnitude bit-planes of the sub-band (Mb, E.1).
    pub num_bitplanes: u8,
    /// The number of most significant bit-planes that are zero and
    /// therefore not coded, as signaled in the packet header.
    pub missing_bit_planes: u8,
}

impl CodeBlock {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.width > MAX_CODE_BLOCK_DIMENSION
            || self.height > MAX_CODE_BLOCK_DIMENSION
            || self.width * self.height > MAX_CODE_BLOCK_AREA
        {
            bail!(ValidationError::InvalidCodeBlockSize);
        }

        if self.num_bitplanes > MAX_BITPLANE_COUNT {
            bail!(ValidationError::TooManyBitplanes);
        }

        if self.missing_bit_planes > self.num_bitplanes {
            bail!(ValidationError::InvalidBitplaneCount);
        }

        Ok(())
    }

    /// The most significant bit-plane that is coded, if any.
    pub(crate) fn start_bitplane(&self) -> Option<u8> {
        self.num_bitplanes
            .checked_sub(self.missing_bit_planes)?
            .checked_sub(1)
    }

    /// The largest number of coding passes the code-block can have.
    pub fn max_coding_passes(&self) -> u16 {
        self.start_bitplane()
            .map(|b| 1 + 3 * b as u16)
            .unwrap_or(0)
    }
}

/// A codeword segment of a code-block.
///
/// Segments are the chunks of data contributed to a code-block by the
/// packets of the individual quality layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// The data of the segment.
    pub data: &'a [u8],
    /// The number of coding passes the segment contains.
    pub num_passes: u8,
}

impl<'a> Segment<'a> {
    /// Create a new segment.
    pub fn new(data: &'a [u8], num_passes: u8) -> Self {
        Self { data, num_passes }
    }

    /// Create a new segment from the `length` bytes starting at `offset`
    /// in `source`.
    ///
    /// Returns an error if the range isn't contained in `source`.
    pub fn from_source(
        source: &'a [u8],
        offset: usize,
        length: usize,
        num_passes: u8,
    ) -> Result<Self> {
        let Some(data) = offset
            .checked_add(length)
            .and_then(|end| source.get(offset..end))
        else {
            return err!(BitError::UnexpectedEof);
        };

        Ok(Self::new(data, num_passes))
    }
}
