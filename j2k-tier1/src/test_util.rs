//! A Tier-1 encoder for tests.
//!
//! The encoder keeps its own significance state and computes the context
//! labels directly from Tables D.1 to D.4, independently of the decoder,
//! so round trips check the context modeling of the decoding passes as
//! well as the segment handling and the arithmetic decoder. The arithmetic
//! decoder itself is checked against the test sequence in H.2 of T.88.

use alloc::vec;
use alloc::vec::Vec;

use j2k_common::bit::StuffedBitWriter;

use crate::arithmetic_decoder::{ArithmeticDecoderContext, QE_TABLE};
use crate::pass::{CodingPass, PassKind};
use crate::{CodeBlockStyle, SubBandType};

/// The MQ encoder from Annex C.2.
pub(crate) struct MqEncoder {
    /// The output, starting with a placeholder byte that absorbs the carry
    /// of the first real byte.
    out: Vec<u8>,
    c: u32,
    a: u32,
    ct: u32,
}

impl MqEncoder {
    /// The INITENC procedure from C.2.8.
    pub(crate) fn new() -> Self {
        Self {
            out: vec![0],
            c: 0,
            a: 0x8000,
            ct: 12,
        }
    }

    /// The ENCODE procedure from C.2.2.
    pub(crate) fn encode(&mut self, context: &mut ArithmeticDecoderContext, bit: u32) {
        let qe_entry = &QE_TABLE[context.index as usize];
        let qe = qe_entry.qe;

        self.a -= qe;

        if bit == context.mps {
            // CODEMPS
            if self.a & 0x8000 == 0 {
                if self.a < qe {
                    self.a = qe;
                } else {
                    self.c += qe;
                }

                context.index = qe_entry.nmps;
                self.renormalize();
            } else {
                self.c += qe;
            }
        } else {
            // CODELPS
            if self.a < qe {
                self.c += qe;
            } else {
                self.a = qe;
            }

            if qe_entry.switch {
                context.mps = 1 - context.mps;
            }

            context.index = qe_entry.nlps;
            self.renormalize();
        }
    }

    /// The RENORME procedure from C.2.6.
    fn renormalize(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;

            if self.ct == 0 {
                self.byte_out();
            }

            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// The BYTEOUT procedure from C.2.7.
    fn byte_out(&mut self) {
        let last = self.out.len() - 1;

        if self.out[last] == 0xff {
            self.emit_7_bits();
        } else if self.c & 0x800_0000 == 0 {
            self.emit_8_bits();
        } else {
            // Propagate the carry into the last byte.
            self.out[last] += 1;

            if self.out[last] == 0xff {
                self.c &= 0x7ff_ffff;
                self.emit_7_bits();
            } else {
                self.emit_8_bits();
            }
        }
    }

    fn emit_7_bits(&mut self) {
        self.out.push((self.c >> 20) as u8);
        self.c &= 0xf_ffff;
        self.ct = 7;
    }

    fn emit_8_bits(&mut self) {
        self.out.push((self.c >> 19) as u8);
        self.c &= 0x7_ffff;
        self.ct = 8;
    }

    /// The FLUSH procedure from C.2.9, returning the codeword.
    pub(crate) fn flush(mut self) -> Vec<u8> {
        // SETBITS
        let temp = self.c + self.a;
        self.c |= 0xffff;

        if self.c >= temp {
            self.c -= 0x8000;
        }

        self.c <<= self.ct;
        self.byte_out();
        self.c <<= self.ct;
        self.byte_out();

        // A trailing 0xFF is implied by the decoder.
        if self.out.last() == Some(&0xff) {
            self.out.pop();
        }

        self.out.remove(0);
        self.out
    }

    /// Terminate the codeword with predictable termination (D.4.2),
    /// returning the codeword.
    ///
    /// Only the bits of the C-register the decoder needs are output, the
    /// rest of the register is left at zero so that the decoder can check
    /// it. The last byte is implied by the decoder.
    pub(crate) fn flush_predictable(mut self) -> Vec<u8> {
        let mut k = 12 - self.ct as i32;

        while k > 0 {
            self.c <<= self.ct;
            self.ct = 0;
            self.byte_out();
            k -= self.ct as i32;
        }

        if self.out.last() != Some(&0xff) {
            // Carry into the last byte, if necessary.
            self.byte_out();
        }

        self.out.pop();
        self.out.remove(0);
        self.out
    }
}

/// Writes the bits of raw passes.
struct RawEncoder {
    writer: StuffedBitWriter,
}

trait BitEncoder {
    fn encode(&mut self, context: &mut ArithmeticDecoderContext, bit: u32);

    fn encode_sign(&mut self, context: &mut ArithmeticDecoderContext, sign: u32, xor_bit: u32) {
        self.encode(context, sign ^ xor_bit);
    }
}

impl BitEncoder for MqEncoder {
    fn encode(&mut self, context: &mut ArithmeticDecoderContext, bit: u32) {
        Self::encode(self, context, bit);
    }
}

impl BitEncoder for RawEncoder {
    fn encode(&mut self, _: &mut ArithmeticDecoderContext, bit: u32) {
        self.writer.write_bit(bit);
    }

    fn encode_sign(&mut self, _: &mut ArithmeticDecoderContext, sign: u32, _: u32) {
        self.writer.write_bit(sign);
    }
}

enum SegmentEncoder {
    Mq(MqEncoder),
    Raw(RawEncoder),
}

impl SegmentEncoder {
    fn finish(self, predictable: bool) -> Vec<u8> {
        match self {
            Self::Mq(encoder) if predictable => encoder.flush_predictable(),
            Self::Mq(encoder) => encoder.flush(),
            Self::Raw(mut encoder) => {
                if predictable {
                    encoder.writer.finish_predictable();
                }

                encoder.writer.into_bytes()
            }
        }
    }
}

/// The parameters of a code-block to encode.
pub(crate) struct EncodeOptions {
    pub(crate) sub_band_type: SubBandType,
    pub(crate) style: CodeBlockStyle,
    pub(crate) num_bitplanes: u8,
    /// The symbol written at the end of each cleanup pass if segmentation
    /// symbols are enabled.
    pub(crate) segmentation_symbol: u32,
}

impl EncodeOptions {
    pub(crate) fn new(sub_band_type: SubBandType, num_bitplanes: u8) -> Self {
        Self {
            sub_band_type,
            style: CodeBlockStyle::default(),
            num_bitplanes,
            segmentation_symbol: 0b1010,
        }
    }
}

pub(crate) struct EncodedCodeBlock {
    /// The codeword segments and the number of passes in each.
    pub(crate) segments: Vec<(Vec<u8>, u8)>,
    pub(crate) missing_bit_planes: u8,
}

/// Encode the given coefficients, splitting the codewords at the
/// termination points of the style.
pub(crate) fn encode(
    coefficients: &[i32],
    width: u32,
    height: u32,
    options: &EncodeOptions,
) -> EncodedCodeBlock {
    assert_eq!(coefficients.len(), (width * height) as usize);

    let max = coefficients
        .iter()
        .map(|c| c.unsigned_abs())
        .max()
        .unwrap_or(0);

    if max == 0 {
        return EncodedCodeBlock {
            segments: vec![],
            missing_bit_planes: options.num_bitplanes,
        };
    }

    let start = (31 - max.leading_zeros()) as u8;
    assert!(start < options.num_bitplanes);

    let mut state = EncoderState::new(coefficients, width, height, options);
    let predictable = options.style.predictable_termination;

    let mut segments = vec![];
    let mut encoder: Option<SegmentEncoder> = None;
    let mut segment_passes = 0;
    let mut pass = Some(CodingPass::first(start));
    let mut index = 0;

    while let Some(p) = pass {
        let raw = p.is_raw(index, &options.style);
        let current = encoder.get_or_insert_with(|| {
            if raw {
                SegmentEncoder::Raw(RawEncoder {
                    writer: StuffedBitWriter::new(),
                })
            } else {
                SegmentEncoder::Mq(MqEncoder::new())
            }
        });

        match current {
            SegmentEncoder::Mq(e) => state.encode_pass(p, options, e),
            SegmentEncoder::Raw(e) => state.encode_pass(p, options, e),
        }

        segment_passes += 1;

        if options.style.reset_context_probabilities {
            state.reset_contexts();
        }

        let next = p.next();

        if p.terminates(index, &options.style) || next.is_none() {
            if let Some(finished) = encoder.take() {
                segments.push((finished.finish(predictable), segment_passes));
            }

            segment_passes = 0;
        }

        pass = next;
        index += 1;
    }

    EncodedCodeBlock {
        segments,
        missing_bit_planes: options.num_bitplanes - 1 - start,
    }
}

const RUN_LENGTH: usize = 17;
const UNIFORM: usize = 18;

/// Table D.3, indexed by the horizontal and vertical contributions plus
/// one. Each entry is the context label and the XOR bit.
const SIGN_CONTEXTS: [[(usize, u32); 3]; 3] = [
    [(13, 1), (12, 1), (11, 1)],
    [(10, 1), (9, 0), (10, 0)],
    [(11, 0), (12, 0), (13, 0)],
];

#[derive(Clone, Copy, Default)]
struct SampleState {
    significant: bool,
    negative: bool,
    refined: bool,
    /// Coded in the significance propagation pass of the current bit-plane.
    coded: bool,
}

struct EncoderState<'a> {
    coefficients: &'a [i32],
    width: u32,
    height: u32,
    sub_band_type: SubBandType,
    vertically_causal: bool,
    states: Vec<SampleState>,
    contexts: [ArithmeticDecoderContext; 19],
}

impl<'a> EncoderState<'a> {
    fn new(coefficients: &'a [i32], width: u32, height: u32, options: &EncodeOptions) -> Self {
        let mut state = Self {
            coefficients,
            width,
            height,
            sub_band_type: options.sub_band_type,
            vertically_causal: options.style.vertically_causal_context,
            states: vec![SampleState::default(); (width * height) as usize],
            contexts: [ArithmeticDecoderContext::default(); 19],
        };

        state.reset_contexts();

        state
    }

    /// Table D.7.
    fn reset_contexts(&mut self) {
        self.contexts = [ArithmeticDecoderContext::default(); 19];
        self.contexts[0].index = 4;
        self.contexts[RUN_LENGTH].index = 3;
        self.contexts[UNIFORM].index = 46;
    }

    fn bit(&self, x: u32, y: u32, bitplane: u8) -> u32 {
        (self.coefficients[(y * self.width + x) as usize].unsigned_abs() >> bitplane) & 1
    }

    fn sign(&self, x: u32, y: u32) -> u32 {
        u32::from(self.coefficients[(y * self.width + x) as usize] < 0)
    }

    fn state(&self, x: u32, y: u32) -> SampleState {
        self.states[(y * self.width + x) as usize]
    }

    fn state_mut(&mut self, x: u32, y: u32) -> &mut SampleState {
        &mut self.states[(y * self.width + x) as usize]
    }

    /// The state of the neighbor at offset `(dx, dy)` of the sample at
    /// `(x, y)`, or `None` if it is outside of the code-block or hidden
    /// by the vertically causal mode.
    fn neighbor(&self, x: u32, y: u32, dx: i32, dy: i32) -> Option<SampleState> {
        let nx = x.checked_add_signed(dx).filter(|nx| *nx < self.width)?;
        let ny = y.checked_add_signed(dy).filter(|ny| *ny < self.height)?;

        if self.vertically_causal && ny / 4 > y / 4 {
            return None;
        }

        Some(self.state(nx, ny))
    }

    fn is_significant(&self, x: u32, y: u32, dx: i32, dy: i32) -> usize {
        usize::from(self.neighbor(x, y, dx, dy).is_some_and(|s| s.significant))
    }

    /// The number of significant horizontal, vertical and diagonal
    /// neighbors.
    fn neighborhood(&self, x: u32, y: u32) -> (usize, usize, usize) {
        let sig = |dx, dy| self.is_significant(x, y, dx, dy);

        (
            sig(-1, 0) + sig(1, 0),
            sig(0, -1) + sig(0, 1),
            sig(-1, -1) + sig(1, -1) + sig(-1, 1) + sig(1, 1),
        )
    }

    /// Table D.1.
    fn zero_coding_context(&self, x: u32, y: u32) -> usize {
        let (h, v, d) = self.neighborhood(x, y);

        let (h, v) = match self.sub_band_type {
            SubBandType::HighLow => (v, h),
            _ => (h, v),
        };

        if self.sub_band_type == SubBandType::HighHigh {
            return match (d, h + v) {
                (3.., _) => 8,
                (2, 1..) => 7,
                (2, 0) => 6,
                (1, 2..) => 5,
                (1, 1) => 4,
                (1, 0) => 3,
                (0, 2..) => 2,
                (0, 1) => 1,
                _ => 0,
            };
        }

        match (h, v, d) {
            (2, _, _) => 8,
            (1, 1.., _) => 7,
            (1, 0, 1..) => 6,
            (1, 0, 0) => 5,
            (0, 2, _) => 4,
            (0, 1, _) => 3,
            (0, 0, 2..) => 2,
            (0, 0, 1) => 1,
            _ => 0,
        }
    }

    /// Tables D.2 and D.3.
    fn sign_context(&self, x: u32, y: u32) -> (usize, u32) {
        let contribution = |dx, dy| match self.neighbor(x, y, dx, dy) {
            Some(s) if s.significant && s.negative => -1,
            Some(s) if s.significant => 1,
            _ => 0,
        };

        let h: i32 = (contribution(-1, 0) + contribution(1, 0)).clamp(-1, 1);
        let v: i32 = (contribution(0, -1) + contribution(0, 1)).clamp(-1, 1);

        SIGN_CONTEXTS[(h + 1) as usize][(v + 1) as usize]
    }

    /// Table D.4.
    fn magnitude_refinement_context(&self, x: u32, y: u32) -> usize {
        let (h, v, d) = self.neighborhood(x, y);

        if self.state(x, y).refined {
            16
        } else if h + v + d > 0 {
            15
        } else {
            14
        }
    }

    fn encode_pass(&mut self, pass: CodingPass, options: &EncodeOptions, e: &mut impl BitEncoder) {
        let bitplane = pass.bitplane;

        for y_start in (0..self.height).step_by(4) {
            let y_end = (y_start + 4).min(self.height);

            for x in 0..self.width {
                match pass.kind {
                    PassKind::SignificancePropagation => {
                        for y in y_start..y_end {
                            let (h, v, d) = self.neighborhood(x, y);

                            if self.state(x, y).significant || h + v + d == 0 {
                                continue;
                            }

                            let bit = self.bit(x, y, bitplane);
                            let label = self.zero_coding_context(x, y);
                            e.encode(&mut self.contexts[label], bit);
                            self.state_mut(x, y).coded = true;

                            if bit == 1 {
                                self.encode_sign(x, y, e);
                            }
                        }
                    }
                    PassKind::MagnitudeRefinement => {
                        for y in y_start..y_end {
                            let state = self.state(x, y);

                            if !state.significant || state.coded {
                                continue;
                            }

                            let bit = self.bit(x, y, bitplane);
                            let label = self.magnitude_refinement_context(x, y);
                            e.encode(&mut self.contexts[label], bit);
                            self.state_mut(x, y).refined = true;
                        }
                    }
                    PassKind::Cleanup => self.encode_cleanup_column(x, y_start, y_end, bitplane, e),
                }
            }
        }

        if pass.kind == PassKind::Cleanup {
            for state in &mut self.states {
                state.coded = false;
            }

            if options.style.segmentation_symbols {
                for i in (0..4).rev() {
                    let bit = (options.segmentation_symbol >> i) & 1;
                    e.encode(&mut self.contexts[UNIFORM], bit);
                }
            }
        }
    }

    fn encode_cleanup_column(
        &mut self,
        x: u32,
        y_start: u32,
        y_end: u32,
        bitplane: u8,
        e: &mut impl BitEncoder,
    ) {
        let mut y = y_start;

        let use_run_length = y_end - y_start == 4
            && (y_start..y_end).all(|y| {
                let state = self.state(x, y);

                !state.significant && !state.coded && self.zero_coding_context(x, y) == 0
            });

        if use_run_length {
            let Some(first) = (y_start..y_end).find(|y| self.bit(x, *y, bitplane) == 1) else {
                e.encode(&mut self.contexts[RUN_LENGTH], 0);
                return;
            };

            e.encode(&mut self.contexts[RUN_LENGTH], 1);
            let offset = first - y_start;
            e.encode(&mut self.contexts[UNIFORM], offset >> 1);
            e.encode(&mut self.contexts[UNIFORM], offset & 1);

            self.encode_sign(x, first, e);
            y = first + 1;
        }

        for y in y..y_end {
            let state = self.state(x, y);

            if state.significant || state.coded {
                continue;
            }

            let bit = self.bit(x, y, bitplane);
            let label = self.zero_coding_context(x, y);
            e.encode(&mut self.contexts[label], bit);

            if bit == 1 {
                self.encode_sign(x, y, e);
            }
        }
    }

    fn encode_sign(&mut self, x: u32, y: u32, e: &mut impl BitEncoder) {
        let sign = self.sign(x, y);
        let (label, xor_bit) = self.sign_context(x, y);
        e.encode_sign(&mut self.contexts[label], sign, xor_bit);

        let state = self.state_mut(x, y);
        state.significant = true;
        state.negative = sign == 1;
    }
}
