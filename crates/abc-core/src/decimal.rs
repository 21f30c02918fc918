//! 128-bit IEEE 754 decimal values.
//!
//! Decimal constants are stored in the module as 16 bytes, the
//! little-endian image of the value's binary-integer-decimal (BID)
//! encoding: a sign bit, a 14-bit biased exponent and a 113-bit
//! coefficient of at most 34 decimal digits.

use std::fmt;

const MAX_DIGITS: usize = 34;
const MAX_COEFFICIENT: u128 = 9_999_999_999_999_999_999_999_999_999_999;
const EXPONENT_BIAS: i32 = 6176;
const MIN_EXPONENT: i32 = -6176;
const MAX_EXPONENT: i32 = 6111;
const COEFFICIENT_BITS: u32 = 113;
const COEFFICIENT_MASK: u128 = (1u128 << COEFFICIENT_BITS) - 1;
const SIGN_BIT: u128 = 1u128 << 127;
const INFINITY_BITS: u128 = 0x78u128 << 120;
const NAN_BITS: u128 = 0x7Cu128 << 120;

/// A decimal128 value in BID encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128(u128);

impl Decimal128 {
    pub const ZERO: Self = Self((EXPONENT_BIAS as u128) << COEFFICIENT_BITS);
    pub const NAN: Self = Self(NAN_BITS);
    pub const INFINITY: Self = Self(INFINITY_BITS);
    pub const NEG_INFINITY: Self = Self(SIGN_BIT | INFINITY_BITS);

    /// Build `(-1)^negative * coefficient * 10^exponent`, rounding half-even
    /// to 34 digits and clamping the exponent into range.
    pub fn from_parts(negative: bool, coefficient: u128, exponent: i32) -> Self {
        let sign = if negative { SIGN_BIT } else { 0 };
        let mut coef = coefficient;
        let mut exp = exponent;
        let mut round_digit = 0u8;
        let mut sticky = false;

        while coef > MAX_COEFFICIENT || exp < MIN_EXPONENT {
            if coef == 0 {
                exp = MIN_EXPONENT;
                break;
            }
            sticky |= round_digit != 0;
            round_digit = (coef % 10) as u8;
            coef /= 10;
            exp += 1;
        }
        coef = round_half_even(coef, round_digit, sticky);
        if coef > MAX_COEFFICIENT {
            coef /= 10;
            exp += 1;
        }

        while exp > MAX_EXPONENT {
            if coef == 0 {
                exp = MAX_EXPONENT;
                break;
            }
            if coef * 10 > MAX_COEFFICIENT {
                return Self(sign | INFINITY_BITS);
            }
            coef *= 10;
            exp -= 1;
        }

        Self(sign | (((exp + EXPONENT_BIAS) as u128) << COEFFICIENT_BITS) | coef)
    }

    pub fn from_i64(value: i64) -> Self {
        Self::from_parts(value < 0, value.unsigned_abs() as u128, 0)
    }

    /// An integral value, rounded to 34 digits if necessary.
    pub fn from_u128(value: u128) -> Self {
        Self::from_parts(false, value, 0)
    }

    /// Parse decimal text: optional sign, digits with an optional point,
    /// optional `e`/`E` exponent. `NaN` and `Infinity` are accepted.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, body) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        match body {
            "NaN" => return Some(Self::NAN),
            "Infinity" if negative => return Some(Self::NEG_INFINITY),
            "Infinity" => return Some(Self::INFINITY),
            _ => {}
        }

        let (mantissa, exponent) = match body.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = body[pos + 1..].parse().ok()?;
                (&body[..pos], exp.clamp(-100_000, 100_000) as i32)
            }
            None => (body, 0),
        };

        let mut digits = Vec::with_capacity(mantissa.len());
        let mut fraction_digits = 0i32;
        let mut seen_point = false;
        let mut seen_digit = false;
        for ch in mantissa.chars() {
            match ch {
                '0'..='9' => {
                    seen_digit = true;
                    if seen_point {
                        fraction_digits += 1;
                    }
                    if !(digits.is_empty() && ch == '0') {
                        digits.push(ch as u8 - b'0');
                    }
                }
                '.' if !seen_point => seen_point = true,
                _ => return None,
            }
        }
        if !seen_digit {
            return None;
        }

        let kept = digits.len().min(MAX_DIGITS);
        let coefficient = digits[..kept]
            .iter()
            .fold(0u128, |acc, &d| acc * 10 + d as u128);
        let dropped = (digits.len() - kept) as i32;
        let round_digit = digits.get(kept).copied().unwrap_or(0);
        let sticky = digits.iter().skip(kept + 1).any(|&d| d != 0);
        let coefficient = round_half_even(coefficient, round_digit, sticky);

        Some(Self::from_parts(
            negative,
            coefficient,
            exponent - fraction_digits + dropped,
        ))
    }

    /// The same value with the sign flipped. Zero becomes negative zero.
    pub fn negate(self) -> Self {
        Self(self.0 ^ SIGN_BIT)
    }

    pub fn is_nan(&self) -> bool {
        self.0 & NAN_BITS == NAN_BITS
    }

    pub fn is_infinite(&self) -> bool {
        self.0 & NAN_BITS == INFINITY_BITS
    }

    pub fn is_negative(&self) -> bool {
        self.0 & SIGN_BIT != 0
    }

    pub fn is_zero(&self) -> bool {
        !self.is_nan() && !self.is_infinite() && self.coefficient() == 0
    }

    pub fn coefficient(&self) -> u128 {
        self.0 & COEFFICIENT_MASK
    }

    pub fn exponent(&self) -> i32 {
        (((self.0 & !SIGN_BIT) >> COEFFICIENT_BITS) as i32) - EXPONENT_BIAS
    }

    /// The value as an `i64` if it is integral and in range.
    pub fn to_i64(&self) -> Option<i64> {
        if self.is_nan() || self.is_infinite() {
            return None;
        }
        let mut coef = self.coefficient();
        let exp = self.exponent();
        if exp >= 0 {
            for _ in 0..exp {
                coef = coef.checked_mul(10)?;
            }
        } else {
            for _ in 0..exp.unsigned_abs() {
                if coef % 10 != 0 {
                    return None;
                }
                coef /= 10;
            }
        }
        let magnitude = i64::try_from(coef).ok()?;
        Some(if self.is_negative() {
            -magnitude
        } else {
            magnitude
        })
    }

    /// The 16-byte pool encoding.
    pub fn to_le_bytes(&self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    pub fn to_bits(&self) -> u128 {
        self.0
    }
}

fn round_half_even(coefficient: u128, round_digit: u8, sticky: bool) -> u128 {
    let round_up = round_digit > 5 || (round_digit == 5 && (sticky || coefficient % 2 == 1));
    if round_up { coefficient + 1 } else { coefficient }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            return f.write_str("NaN");
        }
        let sign = if self.is_negative() { "-" } else { "" };
        if self.is_infinite() {
            return write!(f, "{sign}Infinity");
        }
        match self.exponent() {
            0 => write!(f, "{sign}{}m", self.coefficient()),
            exp => write!(f, "{sign}{}E{exp}m", self.coefficient()),
        }
    }
}
