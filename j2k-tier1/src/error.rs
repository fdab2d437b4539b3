//! Error types for code-block decoding.

use core::fmt;

pub use j2k_common::bit::BitError;

/// The main error type for code-block decoding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Errors related to reading bit-stuffed data.
    Bitstream(BitError),
    /// Errors detected while running the coding passes.
    Decoding(DecodingError),
    /// Errors related to the code-block parameters.
    Validation(ValidationError),
}

/// Errors detected while running the coding passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingError {
    /// The segmentation symbol at the end of a cleanup pass wasn't `1010`.
    SegmentationMismatch,
    /// The end of a terminated segment doesn't follow the predictable
    /// termination pattern.
    PredictableTerminationFailure,
    /// A code-block contains more coding passes than its bit-planes allow.
    TooManyCodingPasses,
    /// A codeword segment mixes raw and arithmetic-coded passes.
    InvalidSegment,
    /// Decoding was cancelled.
    Cancelled,
}

/// Errors related to the code-block parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// The code-block dimensions exceed the limits of the standard.
    InvalidCodeBlockSize,
    /// The number of bit-planes is too large.
    TooManyBitplanes,
    /// More bit-planes are missing than the sub-band has.
    InvalidBitplaneCount,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitstream(e) => write!(f, "{e}"),
            Self::Decoding(e) => write!(f, "{e}"),
            Self::Validation(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SegmentationMismatch => write!(f, "encountered invalid segmentation symbol"),
            Self::PredictableTerminationFailure => {
                write!(f, "segment doesn't end with the predictable termination pattern")
            }
            Self::TooManyCodingPasses => write!(f, "code-block contains too many coding passes"),
            Self::InvalidSegment => {
                write!(f, "codeword segment mixes raw and arithmetic-coded passes")
            }
            Self::Cancelled => write!(f, "decoding was cancelled"),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCodeBlockSize => write!(f, "invalid code-block size"),
            Self::TooManyBitplanes => write!(f, "number of bitplanes is too large"),
            Self::InvalidBitplaneCount => write!(f, "invalid number of bitplanes"),
        }
    }
}

impl core::error::Error for DecodeError {}
impl core::error::Error for DecodingError {}
impl core::error::Error for ValidationError {}

impl From<BitError> for DecodeError {
    fn from(e: BitError) -> Self {
        Self::Bitstream(e)
    }
}

impl From<DecodingError> for DecodeError {
    fn from(e: DecodingError) -> Self {
        Self::Decoding(e)
    }
}

impl From<ValidationError> for DecodeError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

/// Result type for code-block decoding operations.
pub type Result<T> = core::result::Result<T, DecodeError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}

macro_rules! err {
    ($err:expr) => {
        Err($err.into())
    };
}

pub(crate) use bail;
pub(crate) use err;
