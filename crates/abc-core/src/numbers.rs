//! Numeric usage hints.
//!
//! A `use` pragma can select which numeric type unsuffixed literals and
//! generic arithmetic default to. When decimal numerics are enabled and the
//! usage is not the default one, arithmetic is emitted in its `_p` form with
//! the encoded usage as operand.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The numeric type selected by a usage pragma or a literal suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum NumberType {
    /// Plain `Number`: the smallest adequate representation.
    #[default]
    Number = 0,
    Decimal = 1,
    Double = 2,
    Int = 3,
    Uint = 4,
}

/// Decimal rounding modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RoundingMode {
    Ceiling = 0,
    Up = 1,
    HalfUp = 2,
    #[default]
    HalfEven = 3,
    HalfDown = 4,
    Down = 5,
    Floor = 6,
}

/// Default decimal precision in digits.
pub const DEFAULT_PRECISION: u8 = 34;

/// Numeric context in effect at a literal or arithmetic site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumberUsage {
    /// Type used for integral-looking literals and arithmetic.
    pub usage: NumberType,
    /// Type used for literals that are written as floating point.
    pub floating_usage: NumberType,
    pub rounding: RoundingMode,
    pub precision: u8,
}

impl Default for NumberUsage {
    fn default() -> Self {
        Self {
            usage: NumberType::Number,
            floating_usage: NumberType::Number,
            rounding: RoundingMode::HalfEven,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl NumberUsage {
    /// Usage that forces every literal to one type.
    pub fn new(usage: NumberType) -> Self {
        Self {
            usage,
            floating_usage: usage,
            ..Self::default()
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Packed operand for the `_p` arithmetic opcodes:
    /// `precision << 16 | rounding << 8 | usage`.
    pub fn encode(&self) -> u32 {
        (self.precision as u32) << 16 | (u8::from(self.rounding) as u32) << 8 | u8::from(self.usage) as u32
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(param: u32) -> Option<Self> {
        let usage = NumberType::try_from((param & 0xFF) as u8).ok()?;
        let rounding = RoundingMode::try_from(((param >> 8) & 0xFF) as u8).ok()?;
        Some(Self {
            usage,
            floating_usage: usage,
            rounding,
            precision: (param >> 16) as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_usage() {
        let usage = NumberUsage::default();
        assert!(usage.is_default());
        assert_eq!(usage.encode(), 34 << 16 | 3 << 8);
    }

    #[test]
    fn encode_decode() {
        let usage = NumberUsage {
            rounding: RoundingMode::Floor,
            precision: 7,
            ..NumberUsage::new(NumberType::Decimal)
        };
        assert!(!usage.is_default());
        let decoded = NumberUsage::decode(usage.encode()).unwrap();
        assert_eq!(decoded, usage);
    }

    #[test]
    fn decode_rejects_unknown_usage() {
        assert_eq!(NumberUsage::decode(0x09), None);
    }
}
