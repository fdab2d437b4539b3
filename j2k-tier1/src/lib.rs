/*!
A memory-safe, pure-Rust JPEG 2000 Tier-1 decoder.

`j2k-tier1` implements the code-block decoding stage of JPEG 2000 as
specified in ITU-T T.800 (also known as ISO/IEC 15444-1), Annex C and D.
It takes the codeword segments that packet (Tier-2) decoding extracted for
a code-block and reconstructs the quantized wavelet coefficients by running
the significance propagation, magnitude refinement and cleanup passes on
top of the MQ arithmetic decoder.

All code-block styles are supported: selective arithmetic coding bypass,
resetting of context probabilities, termination on each pass, vertically
causal contexts, predictable termination and segmentation symbols.

# Example
```rust
use j2k_tier1::{
    CodeBlock, CodeBlockStyle, DecodeSettings, Segment, SubBandType, decode_code_block,
};

// The first code-block from the example in J.10.4 of T.800.
let data = [0x01, 0x8f, 0x0d, 0xc8, 0x75, 0x5d];
let code_block = CodeBlock {
    width: 1,
    height: 5,
    sub_band_type: SubBandType::LowLow,
    style: CodeBlockStyle::default(),
    num_bitplanes: 6,
    missing_bit_planes: 0,
};

let decoded = decode_code_block(
    &code_block,
    &[Segment::new(&data, 16)],
    &DecodeSettings::default(),
)
.unwrap();

assert_eq!(
    decoded.coefficients().collect::<Vec<_>>(),
    [-26, -22, -30, -32, -19]
);
```

# Cargo features
- `logging`: Log decoding progress and errors via the `log` crate.
- `parallel`: Decode the code-blocks passed to [`decode_code_blocks`] in
  parallel using `rayon`.

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![no_std]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use smallvec::SmallVec;

mod arithmetic_decoder;
mod bitplane;
mod block;
mod codeblock;
mod context;
mod error;
mod log;
mod pass;
#[cfg(test)]
mod test_util;

pub use block::{CodeBlockDecoder, DecodedCodeBlock};
pub use codeblock::{
    CodeBlock, CodeBlockStyle, MAX_BITPLANE_COUNT, MAX_CODE_BLOCK_AREA, MAX_CODE_BLOCK_DIMENSION,
    Segment, SubBandType,
};
pub use error::{BitError, DecodeError, DecodingError, Result, ValidationError};

/// Settings to apply during decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeSettings<'a> {
    /// Whether strict mode should be enabled when decoding.
    ///
    /// In strict mode, the first error aborts decoding of a code-block and
    /// is returned. Otherwise, the error is recorded in the
    /// [`DecodedCodeBlock`] and the samples decoded up to that point are
    /// kept, which is what most decoders do for damaged files.
    pub strict: bool,
    /// A flag that can be set from another thread to cancel decoding.
    ///
    /// It is checked before each coding pass.
    pub cancel: Option<&'a AtomicBool>,
}

impl DecodeSettings<'_> {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }
}

/// Decode a code-block whose segments are all available.
///
/// This is a shorthand for creating a [`CodeBlockDecoder`], contributing
/// all segments as the final layer and returning the decoded code-block.
pub fn decode_code_block(
    code_block: &CodeBlock,
    segments: &[Segment<'_>],
    settings: &DecodeSettings<'_>,
) -> Result<DecodedCodeBlock> {
    let mut decoder = CodeBlockDecoder::new(code_block)?;
    decoder.contribute(segments, true, settings)?;
    decoder.into_decoded(settings)
}

/// A code-block together with all of its segments.
#[derive(Debug, Clone)]
pub struct CodeBlockJob<'a> {
    /// The code-block to decode.
    pub code_block: CodeBlock,
    /// The segments of the code-block, in the order of the layers they
    /// belong to.
    pub segments: SmallVec<[Segment<'a>; 4]>,
}

/// Decode many independent code-blocks.
///
/// The results are returned in the same order as the jobs. A failure of
/// one code-block doesn't affect the others. With the `parallel` feature,
/// the code-blocks are decoded on the `rayon` thread pool.
pub fn decode_code_blocks(
    jobs: &[CodeBlockJob<'_>],
    settings: &DecodeSettings<'_>,
) -> Vec<Result<DecodedCodeBlock>> {
    let decode =
        |job: &CodeBlockJob<'_>| decode_code_block(&job.code_block, &job.segments, settings);

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        jobs.par_iter().map(decode).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        jobs.iter().map(decode).collect()
    }
}
