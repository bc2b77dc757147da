//! Little-endian scalar conversion for object values.
//!
//! Devices may answer a scalar read with fewer bytes than asked for. Only
//! the first four bytes of a reply are ever used.

const MAX_SCALAR_LEN: usize = 4;

/// Zero-extend up to the first four bytes of `data`.
pub fn decode_unsigned(data: &[u8]) -> u32 {
    data.iter()
        .take(MAX_SCALAR_LEN)
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc | (u32::from(b) << (8 * i)))
}

/// Decode up to the first four bytes of `data` as a signed value.
///
/// Sign extension applies to 2-byte and 4-byte values only. One- and
/// three-byte values come back zero-extended.
pub fn decode_signed(data: &[u8]) -> i32 {
    let raw = decode_unsigned(data);
    if data.len() == 2 {
        i32::from(raw as u16 as i16)
    } else {
        // a 4-byte value reinterprets; shorter ones never reach bit 31
        raw as i32
    }
}

/// The low `width` bytes of `value`, least significant first.
pub fn encode_le(value: u32, width: usize) -> Vec<u8> {
    value.to_le_bytes()[..width.min(MAX_SCALAR_LEN)].to_vec()
}
