//! Bit-level I/O shared by the j2k crates.
//!
//! JPEG 2000 uses the same bit-stuffing convention (T.800 B.10.1) for
//! packet headers and for raw (bypass) code-block segments: after every
//! `0xFF` byte, the most significant bit of the following byte is a stuff
//! bit that carries no data. This crate provides a reader that removes
//! those bits and a writer that inserts them.

#![no_std]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

pub mod bit;
