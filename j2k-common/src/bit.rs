//! A bit-stuffed bit reader and writer.

use alloc::vec::Vec;
use core::fmt;

/// Errors that can occur while reading bit-stuffed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitError {
    /// A byte following `0xFF` was itself `0xFF`, so it can't carry
    /// the mandatory stuff bit.
    CorruptBitstuffing,
    /// The data ended before the requested bits could be read.
    UnexpectedEof,
    /// More than 64 bits were requested at once.
    TooManyBits,
}

impl fmt::Display for BitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptBitstuffing => write!(f, "corrupt bit-stuffing after 0xFF byte"),
            Self::UnexpectedEof => write!(f, "unexpected end of data"),
            Self::TooManyBits => write!(f, "at most 64 bits can be read at once"),
        }
    }
}

impl core::error::Error for BitError {}

/// A reader that yields the bits of a byte stream, skipping the stuff bit
/// that follows every `0xFF` byte.
///
/// B.10.1: "If the value of the byte is 0xFF, the next byte includes an
/// extra zero bit stuffed into the MSB."
#[derive(Debug, Clone, Copy)]
pub struct StuffedBitReader<'a> {
    /// The underlying bytes of the bit reader.
    data: &'a [u8],
    /// The index of the next byte to load.
    pos: usize,
    /// The byte that is currently being consumed.
    byte_buffer: u8,
    /// The number of unread bits in `byte_buffer`.
    bits_left: u8,
    /// The number of data bits that have been read so far.
    bits_read: usize,
}

impl<'a> StuffedBitReader<'a> {
    /// Create a new bit-stuffed reader.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            byte_buffer: 0,
            bits_left: 0,
            bits_read: 0,
        }
    }

    /// Load the next byte into the byte buffer.
    #[inline]
    fn refill(&mut self) -> Result<(), BitError> {
        let next = *self.data.get(self.pos).ok_or(BitError::UnexpectedEof)?;

        if self.byte_buffer == 0xff {
            if next == 0xff {
                return Err(BitError::CorruptBitstuffing);
            }

            self.bits_left = 7;
        } else {
            self.bits_left = 8;
        }

        self.byte_buffer = next;
        self.pos += 1;

        Ok(())
    }

    /// Read a single bit.
    #[inline(always)]
    pub fn read_bit(&mut self) -> Result<u32, BitError> {
        if self.bits_left == 0 {
            self.refill()?;
        }

        self.bits_left -= 1;
        self.bits_read += 1;

        Ok(((self.byte_buffer >> self.bits_left) & 1) as u32)
    }

    /// Read `bit_size` bits (at most 64), most significant bit first.
    ///
    /// The read is transactional: if it fails, the position of the reader
    /// is left where it was before the call.
    #[inline]
    pub fn read_bits(&mut self, bit_size: u8) -> Result<u64, BitError> {
        if bit_size > 64 {
            return Err(BitError::TooManyBits);
        }

        let mut attempt = *self;
        let mut value = 0_u64;
        let mut remaining = bit_size;

        while remaining > 0 {
            if attempt.bits_left == 0 {
                attempt.refill()?;
            }

            // Take as many bits as possible from the current byte at once.
            let take = remaining.min(attempt.bits_left);
            let shift = attempt.bits_left - take;
            let chunk = (attempt.byte_buffer as u64 >> shift) & ((1 << take) - 1);

            value = (value << take) | chunk;
            attempt.bits_left -= take;
            remaining -= take;
        }

        attempt.bits_read += bit_size as usize;
        *self = attempt;

        Ok(value)
    }

    /// Peek the next `bit_size` bits without consuming them.
    pub fn peek_bits(&self, bit_size: u8) -> Result<u64, BitError> {
        let mut copy = *self;
        copy.read_bits(bit_size)
    }

    /// The number of data bits (excluding stuff bits) read so far.
    #[inline]
    pub fn bits_read(&self) -> usize {
        self.bits_read
    }

    /// The unread bits of the current byte, as `(value, count)`.
    #[inline]
    pub fn remaining_in_byte(&self) -> (u8, u8) {
        let mask = ((1_u16 << self.bits_left) - 1) as u8;

        (self.byte_buffer & mask, self.bits_left)
    }

    /// The bytes that haven't been loaded yet.
    #[inline]
    pub fn tail(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Whether the last loaded byte was `0xFF`, meaning that the next byte
    /// starts with a stuff bit.
    #[inline]
    pub fn after_marker_byte(&self) -> bool {
        self.byte_buffer == 0xff
    }

    /// Stop reading and return the remaining bytes.
    ///
    /// The unread bits of the current byte are discarded. If the last
    /// byte was `0xFF`, the byte after it belongs to the bit stream as well
    /// (it holds at least the stuff bit) and is skipped, so that the
    /// returned data starts at the right position. Calling this method
    /// again returns the same data.
    pub fn finish(&mut self) -> &'a [u8] {
        self.bits_left = 0;

        if self.byte_buffer == 0xff && self.pos < self.data.len() {
            self.pos += 1;
        }

        self.byte_buffer = 0;

        self.tail()
    }
}

/// A writer that inserts a zero stuff bit after every `0xFF` byte.
#[derive(Debug, Clone, Default)]
pub struct StuffedBitWriter {
    data: Vec<u8>,
    /// The bits of the byte that is currently being assembled.
    byte_buffer: u8,
    /// The number of bits in `byte_buffer`.
    count: u8,
    /// The number of data bits the current byte can hold (7 after `0xFF`).
    capacity: u8,
    finished: bool,
}

impl StuffedBitWriter {
    /// Create a new, empty writer.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            byte_buffer: 0,
            count: 0,
            capacity: 8,
            finished: false,
        }
    }

    /// Write a single bit. Only the least significant bit of `bit` is used.
    #[inline]
    pub fn write_bit(&mut self, bit: u32) {
        debug_assert!(!self.finished, "writing to a finished writer");

        self.byte_buffer = (self.byte_buffer << 1) | (bit & 1) as u8;
        self.count += 1;

        if self.count == self.capacity {
            self.emit();
        }
    }

    /// Write the `bit_size` least significant bits of `value` (at most 64),
    /// most significant bit first.
    pub fn write_bits(&mut self, value: u64, bit_size: u8) -> Result<(), BitError> {
        if bit_size > 64 {
            return Err(BitError::TooManyBits);
        }

        for i in (0..bit_size).rev() {
            self.write_bit(((value >> i) & 1) as u32);
        }

        Ok(())
    }

    fn emit(&mut self) {
        let byte = self.byte_buffer;
        self.data.push(byte);
        self.byte_buffer = 0;
        self.count = 0;
        self.capacity = if byte == 0xff { 7 } else { 8 };
    }

    /// The number of bytes emitted so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no byte has been emitted yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pad the last byte with zero bits and return the written data.
    ///
    /// The data never ends with `0xFF`: if it would, a stuffing byte is
    /// appended. Calling this method again returns the same data.
    pub fn finish(&mut self) -> &[u8] {
        if !self.finished {
            if self.count > 0 {
                self.byte_buffer <<= self.capacity - self.count;
                self.emit();
            } else if self.data.last() == Some(&0xff) {
                self.data.push(0x00);
            }

            self.finished = true;
        }

        &self.data
    }

    /// Pad the last byte with the alternating `0101...` pattern of
    /// predictable termination and return the written data.
    ///
    /// If the data ends with `0xFF`, the byte after it is filled with the
    /// pattern as well. Calling this method (or [`Self::finish`]) again
    /// returns the same data.
    pub fn finish_predictable(&mut self) -> &[u8] {
        if !self.finished {
            if self.count > 0 || self.data.last() == Some(&0xff) {
                let padding = self.capacity - self.count;

                for i in 0..padding {
                    self.write_bit(u32::from(i & 1));
                }
            }

            self.finished = true;
        }

        &self.data
    }

    /// Finish the writer and return the underlying buffer.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.finish();
        self.data
    }
}
