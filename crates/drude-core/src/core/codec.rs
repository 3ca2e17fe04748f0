//! Fixed-width hexadecimal-overflow serial numbering.
//!
//! Serial numbers in fixed-column text fields normally use decimal digits.
//! Beyond a field's decimal capacity (`10^ndigits`), values are encoded with
//! hexadecimal digits starting at `A` followed by `ndigits - 1` zeros,
//! re-based so the first overflow value follows immediately after the last
//! representable decimal value. A 5-digit serial field therefore runs
//! `0..=99999` in decimal and continues `A0000..=FFFFF` in hexadecimal,
//! covering `100000..=493215`.

use thiserror::Error;

/// Field width of atom serial numbers in the fixed-column format.
pub const SERIAL_DIGITS: u32 = 5;
/// Field width of residue sequence numbers in the fixed-column format.
pub const RESSEQ_DIGITS: u32 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("value {value} does not fit in a {ndigits}-digit field (max {max})")]
    OutOfRange {
        value: usize,
        ndigits: u32,
        max: usize,
    },
    #[error("cannot decode '{0}' as a serial number")]
    Malformed(String),
}

fn hex_base(ndigits: u32) -> usize {
    0xA * 16usize.pow(ndigits - 1)
}

/// The largest value representable in an `ndigits`-wide field.
pub fn max_value(ndigits: u32) -> usize {
    let hex_span = 16usize.pow(ndigits) - hex_base(ndigits);
    10usize.pow(ndigits) - 1 + hex_span
}

/// Encodes `value` for an `ndigits`-wide field, switching to offset
/// hexadecimal once the decimal capacity is exhausted.
///
/// The result is unpadded; callers right-justify it into the field.
pub fn encode(value: usize, ndigits: u32) -> Result<String, CodecError> {
    let decimal_capacity = 10usize.pow(ndigits);
    if value < decimal_capacity {
        Ok(value.to_string())
    } else if value <= max_value(ndigits) {
        Ok(format!("{:X}", value - decimal_capacity + hex_base(ndigits)))
    } else {
        Err(CodecError::OutOfRange {
            value,
            ndigits,
            max: max_value(ndigits),
        })
    }
}

/// Decodes a field produced by [`encode`].
///
/// An all-decimal field parses as decimal; anything else parses as
/// hexadecimal and the overflow offset is inverted.
pub fn decode(field: &str, ndigits: u32) -> Result<usize, CodecError> {
    let s = field.trim();
    if s.is_empty() {
        return Err(CodecError::Malformed(field.to_string()));
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse()
            .map_err(|_| CodecError::Malformed(field.to_string()))
    } else {
        let raw = usize::from_str_radix(s, 16)
            .map_err(|_| CodecError::Malformed(field.to_string()))?;
        let base = hex_base(ndigits);
        if raw < base {
            return Err(CodecError::Malformed(field.to_string()));
        }
        Ok(raw - base + 10usize.pow(ndigits))
    }
}
