//! Bit-section codec: extract and pack ordered, contiguous unsigned bit
//! fields out of and into a 128-bit integer (spec §4.1).
//!
//! This is the primitive every variant's encode/decode is built on. Hot
//! paths (the per-variant encode/decode in [`crate::value`]) inline their
//! own masking instead of going through `extract`/`pack`, as the design
//! allows.

use crate::error::BridgeError;

/// A named, fixed-width bit field read left-to-right starting at bit 0.
pub type Section<'a> = (&'a str, u32);

/// A named, fixed-width bit field together with the value to pack into it.
pub type PackSection<'a> = (&'a str, u32, u128);

fn mask(width: u32) -> u128 {
    if width >= 128 { u128::MAX } else { (1u128 << width) - 1 }
}

/// Extracts `sections` from `value`, consuming low bits first: the first
/// section is `value & mask(width)`, the next begins after a right-shift by
/// that width, and so on.
pub fn extract(value: u128, sections: &[Section<'_>]) -> Result<Vec<(String, u128)>, BridgeError> {
    let total: u64 = sections.iter().map(|(_, w)| u64::from(*w)).sum();
    if total > 128 {
        return Err(BridgeError::SectionOverflow { total });
    }
    let mut offset = 0u32;
    let mut out = Vec::with_capacity(sections.len());
    for (name, width) in sections {
        let field = (value >> offset) & mask(*width);
        out.push(((*name).to_string(), field));
        offset += width;
    }
    Ok(out)
}

/// Assembles `sections` into a single 128-bit integer, masking each value to
/// its declared width (truncating silently; that is caller error per spec).
pub fn pack(sections: &[PackSection<'_>]) -> Result<u128, BridgeError> {
    let total: u64 = sections.iter().map(|(_, w, _)| u64::from(*w)).sum();
    if total > 128 {
        return Err(BridgeError::SectionOverflow { total });
    }
    let mut offset = 0u32;
    let mut acc = 0u128;
    for (_, width, value) in sections {
        acc |= (value & mask(*width)) << offset;
        offset += width;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_simple_fields() {
        let packed = pack(&[("tag", 4, 5), ("detail", 124, 0xabc)]).unwrap();
        let fields = extract(packed, &[("tag", 4), ("detail", 124)]).unwrap();
        assert_eq!(fields[0], ("tag".to_string(), 5));
        assert_eq!(fields[1], ("detail".to_string(), 0xabc));
    }

    #[test]
    fn truncates_oversized_values() {
        let packed = pack(&[("x", 4, 0xff)]).unwrap();
        assert_eq!(packed, 0xf);
    }

    #[test]
    fn rejects_overflowing_widths() {
        let err = pack(&[("a", 100, 0), ("b", 100, 0)]).unwrap_err();
        assert!(matches!(err, BridgeError::SectionOverflow { total: 200 }));
    }

    #[test]
    fn extract_consumes_low_bits_first() {
        // ptr in bits 0..32, len in bits 32..64
        let value = (7u128 << 32) | 3u128;
        let fields = extract(value, &[("ptr", 32), ("len", 32)]).unwrap();
        assert_eq!(fields[0].1, 3);
        assert_eq!(fields[1].1, 7);
    }
}
