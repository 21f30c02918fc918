//! Binary primitives of the ABC format.
//!
//! Everything is little-endian. Unsigned and signed 32-bit integers use the
//! variable-length encoding (7 payload bits per byte, high bit set when
//! another byte follows, at most 5 bytes). Branch offsets are fixed 3-byte
//! signed values.

use abc_core::Decimal128;

/// Append-only writer for ABC primitives.
pub trait AbcWrite {
    fn write_u8(&mut self, value: u8);

    /// 16-bit little-endian.
    fn write_u16(&mut self, value: u16);

    /// Signed 24-bit little-endian, used only for branch offsets.
    fn write_s24(&mut self, value: i32);

    /// Variable-length unsigned integer (1 to 5 bytes).
    fn write_u30(&mut self, value: u32);

    /// Signed integer, written as the varint of its two's-complement bits.
    fn write_s32(&mut self, value: i32) {
        self.write_u30(value as u32);
    }

    /// IEEE-754 double, 8 bytes.
    fn write_d64(&mut self, value: f64);

    /// 128-bit decimal, 16 bytes.
    fn write_decimal(&mut self, value: &Decimal128);
}

impl AbcWrite for Vec<u8> {
    fn write_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    fn write_s24(&mut self, value: i32) {
        self.extend_from_slice(&value.to_le_bytes()[..3]);
    }

    fn write_u30(&mut self, value: u32) {
        if value < 0x80 {
            self.push(value as u8);
        } else if value < 0x4000 {
            self.push((value & 0x7F) as u8 | 0x80);
            self.push((value >> 7) as u8 & 0x7F);
        } else if value < 0x20_0000 {
            self.push((value & 0x7F) as u8 | 0x80);
            self.push((value >> 7) as u8 | 0x80);
            self.push((value >> 14) as u8 & 0x7F);
        } else if value < 0x1000_0000 {
            self.push((value & 0x7F) as u8 | 0x80);
            self.push((value >> 7) as u8 | 0x80);
            self.push((value >> 14) as u8 | 0x80);
            self.push((value >> 21) as u8 & 0x7F);
        } else {
            self.push((value & 0x7F) as u8 | 0x80);
            self.push((value >> 7) as u8 | 0x80);
            self.push((value >> 14) as u8 | 0x80);
            self.push((value >> 21) as u8 | 0x80);
            self.push((value >> 28) as u8 & 0x0F);
        }
    }

    fn write_d64(&mut self, value: f64) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    fn write_decimal(&mut self, value: &Decimal128) {
        self.extend_from_slice(&value.to_le_bytes());
    }
}

/// Number of bytes [`AbcWrite::write_u30`] uses for `value`.
pub fn u30_len(value: u32) -> usize {
    match value {
        0..0x80 => 1,
        0x80..0x4000 => 2,
        0x4000..0x20_0000 => 3,
        0x20_0000..0x1000_0000 => 4,
        _ => 5,
    }
}

/// Overwrite three bytes at `at` with a signed 24-bit value.
pub fn patch_s24(code: &mut [u8], at: usize, value: i32) {
    code[at..at + 3].copy_from_slice(&value.to_le_bytes()[..3]);
}

/// Read a varint at `*pos`, advancing it.
pub fn read_u30(bytes: &[u8], pos: &mut usize) -> Option<u32> {
    let mut result = 0u32;
    for shift in (0..35).step_by(7) {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Some(result)
}

/// Read a signed 24-bit value at `*pos`, advancing it.
pub fn read_s24(bytes: &[u8], pos: &mut usize) -> Option<i32> {
    let raw = bytes.get(*pos..*pos + 3)?;
    *pos += 3;
    let value = raw[0] as i32 | (raw[1] as i32) << 8 | (raw[2] as i32) << 16;
    Some((value << 8) >> 8)
}
