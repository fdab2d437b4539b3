//! The arithmetic decoder, described in Annex C, and the raw decoder used
//! by passes that bypass arithmetic coding (D.6).
//!
//! The arithmetic decoder keeps track of some state and continuously receives
//! context labels as input, each time yielding a new bit from the original data
//! as output.

use j2k_common::bit::{BitError, StuffedBitReader};

/// A source of decoded bits for the coding passes.
///
/// Implemented by the arithmetic decoder and by the raw decoder, so that the
/// passes don't need to care which one is used.
pub(crate) trait BitDecoder {
    /// Read the next bit using the given context.
    fn read_bit(&mut self, context: &mut ArithmeticDecoderContext) -> u32;

    /// Read a sign bit using the given context and XOR bit from Table D.3.
    #[inline(always)]
    fn read_sign(&mut self, context: &mut ArithmeticDecoderContext, xor_bit: u32) -> u32 {
        self.read_bit(context) ^ xor_bit
    }
}

pub(crate) struct ArithmeticDecoder<'a> {
    /// The underlying encoded data.
    data: &'a [u8],
    /// The C-register (see Table C.1).
    c: u32,
    /// The A-register (see Table C.1).
    a: u32,
    /// The pointer to the current byte.
    base_pointer: usize,
    /// The bit shift counter.
    shift_count: u32,
    /// Whether a marker (`0xFF` followed by a byte larger than `0x8F`) has
    /// been encountered. From then on, only 1-bits are fed into the C-register.
    marker_found: bool,
}

impl<'a> ArithmeticDecoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        let mut decoder = ArithmeticDecoder {
            data,
            c: 0,
            a: 0,
            base_pointer: 0,
            shift_count: 0,
            marker_found: false,
        };

        decoder.initialize();

        decoder
    }

    /// The INITDEC procedure from C.3.5.
    ///
    /// We use the version from Annex G in <https://www.itu.int/rec/T-REC-T.88-201808-I>.
    fn initialize(&mut self) {
        self.c = ((self.current_byte() as u32) ^ 0xff) << 16;
        self.read_byte();

        self.c <<= 7;
        self.shift_count -= 7;
        self.a = 0x8000;
    }

    /// The BYTEIN procedure from C.3.4.
    ///
    /// We use the version from Annex G from <https://www.itu.int/rec/T-REC-T.88-201808-I>.
    #[inline(always)]
    fn read_byte(&mut self) {
        if self.marker_found {
            self.shift_count = 8;
        } else if self.current_byte() == 0xff {
            let b1 = self.next_byte();

            if b1 > 0x8f {
                self.marker_found = true;
                self.shift_count = 8;
            } else {
                self.base_pointer += 1;
                self.c = self
                    .c
                    .wrapping_add(0xfe00)
                    .wrapping_sub((self.current_byte() as u32) << 9);
                self.shift_count = 7;
            }
        } else {
            self.base_pointer += 1;
            self.c = self
                .c
                .wrapping_add(0xff00)
                .wrapping_sub((self.current_byte() as u32) << 8);
            self.shift_count = 8;
        }
    }

    /// The RENORMD procedure from C.3.3.
    #[inline(always)]
    fn renormalize(&mut self) {
        loop {
            if self.shift_count == 0 {
                self.read_byte();
            }

            self.a <<= 1;
            self.c <<= 1;
            self.shift_count -= 1;

            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// The `LPS_EXCHANGE` procedure from C.3.2.
    #[inline(always)]
    fn exchange_lps(&mut self, context: &mut ArithmeticDecoderContext, qe_entry: &QeData) -> u32 {
        let d;

        if self.a < qe_entry.qe {
            self.a = qe_entry.qe;
            d = context.mps;
            context.index = qe_entry.nmps;
        } else {
            self.a = qe_entry.qe;
            d = 1 - context.mps;

            if qe_entry.switch {
                context.mps = 1 - context.mps;
            }

            context.index = qe_entry.nlps;
        }

        d
    }

    /// The DECODE procedure from C.3.2.
    ///
    /// We use the version from Annex G from <https://www.itu.int/rec/T-REC-T.88-201808-I>.
    #[inline(always)]
    pub(crate) fn decode(&mut self, context: &mut ArithmeticDecoderContext) -> u32 {
        let qe_entry = &QE_TABLE[context.index as usize];

        self.a -= qe_entry.qe;

        let d;

        if (self.c >> 16) < self.a {
            if self.a & 0x8000 == 0 {
                d = self.exchange_mps(context, qe_entry);
                self.renormalize();
            } else {
                d = context.mps;
            }
        } else {
            self.c -= self.a << 16;

            d = self.exchange_lps(context, qe_entry);
            self.renormalize();
        }

        d
    }

    /// The `MPS_EXCHANGE` procedure from C.3.2.
    #[inline(always)]
    fn exchange_mps(&mut self, context: &mut ArithmeticDecoderContext, qe_entry: &QeData) -> u32 {
        let d;

        if self.a < qe_entry.qe {
            d = 1 - context.mps;

            if qe_entry.switch {
                context.mps = 1 - context.mps;
            }

            context.index = qe_entry.nlps;
        } else {
            d = context.mps;
            context.index = qe_entry.nmps;
        }

        d
    }

    /// Check whether the decoder stopped at a position that is consistent
    /// with predictable termination (D.4.2).
    ///
    /// The encoder terminates the segment as if an LPS with the smallest
    /// probability that still renormalizes the spare bits of the C-register
    /// had been coded, followed by a marker. Returns `true` if the data
    /// doesn't match that pattern.
    ///
    /// The state of the decoder is modified, so this should only be called
    /// once all passes of the segment have been decoded.
    pub(crate) fn check_predictable_termination(&mut self) -> bool {
        // The last byte read must be 0xFF, unless we already reached the
        // terminating marker.
        if self.current_byte() != 0xff && !self.marker_found {
            return true;
        }

        // If the counter isn't 0, the terminating marker must have been
        // reached already.
        if self.shift_count != 0 && !self.marker_found {
            return true;
        }

        // There were no spare bits at the encoder, nothing else to check.
        if self.shift_count == 1 {
            return false;
        }

        if self.shift_count == 0 {
            // The next byte must be the second byte of the terminating marker.
            if !self.marker_found && self.next_byte() <= 0x8f {
                return true;
            }

            self.shift_count = 8;
        }

        // The number of bits carrying termination information.
        let k = self.shift_count - 1;
        let q = 0x8000_u32 >> k;

        self.a -= q;

        if (self.c >> 16) < self.a {
            // An MPS interval was decoded.
            return true;
        }

        self.c -= self.a << 16;
        self.a = q;

        loop {
            if self.shift_count == 0 {
                self.read_byte();
            }

            self.a <<= 1;
            self.c <<= 1;
            self.shift_count -= 1;

            if self.a >= 0x8000 {
                break;
            }
        }

        false
    }

    #[inline(always)]
    fn current_byte(&self) -> u8 {
        self.data
            .get(self.base_pointer)
            .copied()
            // "The number of bytes corresponding to the coding passes is
            // specified in the packet header. Often at that point there are
            // more symbols to be decoded. Therefore, the decoder shall extend
            // the input bit stream to the arithmetic coder with 0xFF bytes,
            // as necessary, until all symbols have been decoded."
            .unwrap_or(0xFF)
    }

    #[inline(always)]
    fn next_byte(&self) -> u8 {
        self.data
            .get(self.base_pointer + 1)
            .copied()
            .unwrap_or(0xFF)
    }
}

impl BitDecoder for ArithmeticDecoder<'_> {
    #[inline(always)]
    fn read_bit(&mut self, context: &mut ArithmeticDecoderContext) -> u32 {
        self.decode(context)
    }
}

/// A decoder for raw segments, used by the significance propagation and
/// magnitude refinement passes in selective arithmetic coding bypass mode.
///
/// Bits are read directly from the data, skipping stuff bits. Past the end
/// of the data, 1-bits are returned. Corrupt bit-stuffing is remembered so
/// that it can be reported once the pass is done.
pub(crate) struct RawDecoder<'a> {
    reader: StuffedBitReader<'a>,
    error: Option<BitError>,
}

impl<'a> RawDecoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            reader: StuffedBitReader::new(data),
            error: None,
        }
    }

    #[inline(always)]
    pub(crate) fn read(&mut self) -> u32 {
        match self.reader.read_bit() {
            Ok(bit) => bit,
            Err(BitError::UnexpectedEof) => 1,
            Err(e) => {
                self.error.get_or_insert(e);
                1
            }
        }
    }

    /// The first error encountered while reading, if any.
    pub(crate) fn error(&self) -> Option<BitError> {
        self.error
    }

    /// Check whether the segment ends with the padding pattern of
    /// predictable termination: the unused bits of the last byte alternate
    /// `0101...` and no bytes are left. Returns `true` if that isn't the case.
    pub(crate) fn check_padding(&self) -> bool {
        let (value, count) = self.reader.remaining_in_byte();

        if count > 0 && value != 0x55 >> (8 - count) {
            return true;
        }

        match self.reader.tail() {
            [] => false,
            // A last byte of 0xFF is followed by the stuff bit and seven
            // bits of padding.
            [b] => !(count == 0 && self.reader.after_marker_byte() && *b == 0x2a),
            _ => true,
        }
    }
}

impl BitDecoder for RawDecoder<'_> {
    #[inline(always)]
    fn read_bit(&mut self, _: &mut ArithmeticDecoderContext) -> u32 {
        self.read()
    }

    #[inline(always)]
    fn read_sign(&mut self, _: &mut ArithmeticDecoderContext, _: u32) -> u32 {
        // Raw sign bits are stored as is.
        self.read()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ArithmeticDecoderContext {
    pub(crate) index: u32,
    pub(crate) mps: u32,
}

impl ArithmeticDecoderContext {
    pub(crate) const fn new(index: u32) -> Self {
        Self { index, mps: 0 }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct QeData {
    pub(crate) qe: u32,
    pub(crate) nmps: u32,
    pub(crate) nlps: u32,
    pub(crate) switch: bool,
}

macro_rules! qe {
    ($($qe:expr, $nmps:expr, $nlps:expr, $switch:expr),+ $(,)?) => {
        [
            $(
                QeData {
                    qe: $qe,
                    nmps: $nmps,
                    nlps: $nlps,
                    switch: $switch,
                }
            ),+
        ]
    };
}

/// QE values and associated data from Table C.2.
#[rustfmt::skip]
pub(crate) static QE_TABLE: [QeData; 47] = qe!(
    0x5601, 1, 1, true,
    0x3401, 2, 6, false,
    0x1801, 3, 9, false,
    0x0AC1, 4, 12, false,
    0x0521, 5, 29, false,
    0x0221, 38, 33, false,
    0x5601, 7, 6, true,
    0x5401, 8, 14, false,
    0x4801, 9, 14, false,
    0x3801, 10, 14, false,
    0x3001, 11, 17, false,
    0x2401, 12, 18, false,
    0x1C01, 13, 20, false,
    0x1601, 29, 21, false,
    0x5601, 15, 14, true,
    0x5401, 16, 14, false,
    0x5101, 17, 15, false,
    0x4801, 18, 16, false,
    0x3801, 19, 17, false,
    0x3401, 20, 18, false,
    0x3001, 21, 19, false,
    0x2801, 22, 19, false,
    0x2401, 23, 20, false,
    0x2201, 24, 21, false,
    0x1C01, 25, 22, false,
    0x1801, 26, 23, false,
    0x1601, 27, 24, false,
    0x1401, 28, 25, false,
    0x1201, 29, 26, false,
    0x1101, 30, 27, false,
    0x0AC1, 31, 28, false,
    0x09C1, 32, 29, false,
    0x08A1, 33, 30, false,
    0x0521, 34, 31, false,
    0x0441, 35, 32, false,
    0x02A1, 36, 33, false,
    0x0221, 37, 34, false,
    0x0141, 38, 35, false,
    0x0111, 39, 36, false,
    0x0085, 40, 37, false,
    0x0049, 41, 38, false,
    0x0025, 42, 39, false,
    0x0015, 43, 40, false,
    0x0009, 44, 41, false,
    0x0005, 45, 42, false,
    0x0001, 45, 43, false,
    0x5601, 46, 46, false,
);
