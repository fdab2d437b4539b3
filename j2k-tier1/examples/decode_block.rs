//! This example decodes a code-block stored in a file and prints its
//! coefficients.
//!
//! Usage: `decode_block <file> <width> <height> <sub-band> <passes> <bitplanes> <missing> [style]`
//!
//! The sub-band is one of `ll`, `hl`, `lh` and `hh`. The style is the
//! code-block style byte of the COD marker segment, in hexadecimal.

use std::env;
use std::error::Error;
use std::fs;

use j2k_tier1::{
    CodeBlock, CodeBlockStyle, DecodeSettings, Segment, SubBandType, decode_code_block,
};

fn main() -> Result<(), Box<dyn Error>> {
    if let Ok(()) = log::set_logger(&LOGGER) {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let args: Vec<String> = env::args().skip(1).collect();

    if args.len() < 7 {
        return Err("expected at least 7 arguments".into());
    }

    let data = fs::read(&args[0])?;
    let sub_band_type = match args[3].as_str() {
        "ll" => SubBandType::LowLow,
        "hl" => SubBandType::HighLow,
        "lh" => SubBandType::LowHigh,
        "hh" => SubBandType::HighHigh,
        other => return Err(format!("unknown sub-band {other}").into()),
    };
    let style = match args.get(7) {
        Some(style) => CodeBlockStyle::from_u8(u8::from_str_radix(style, 16)?),
        None => CodeBlockStyle::default(),
    };

    let code_block = CodeBlock {
        width: args[1].parse()?,
        height: args[2].parse()?,
        sub_band_type,
        style,
        num_bitplanes: args[5].parse()?,
        missing_bit_planes: args[6].parse()?,
    };
    let num_passes = args[4].parse()?;

    let decoded = decode_code_block(
        &code_block,
        &[Segment::new(&data, num_passes)],
        &DecodeSettings::default(),
    )?;

    if let Some(error) = decoded.error {
        eprintln!("decoding stopped early: {error}");
    }

    let coefficients: Vec<i32> = decoded.coefficients().collect();

    for row in coefficients.chunks(decoded.width.max(1) as usize) {
        let row: Vec<String> = row.iter().map(|c| format!("{c:>4}")).collect();
        println!("{}", row.join(""));
    }

    Ok(())
}

static LOGGER: SimpleLogger = SimpleLogger;

struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::LevelFilter::Debug
    }

    fn log(&self, record: &log::Record<'_>) {
        eprintln!("{}", record.args());
    }

    fn flush(&self) {}
}
