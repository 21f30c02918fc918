//! Numeric literals.
//!
//! Literal text is classified and parsed into the narrowest representation
//! the numeric mode allows, then pushed with the shortest instruction that
//! holds it.

use abc_core::{Decimal128, DefaultValue, NumberType, NumberUsage};

use super::AbcEmitter;

/// A parsed numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberLiteral {
    Int(i32),
    Uint(u32),
    Double(f64),
    Decimal(Decimal128),
}

impl NumberLiteral {
    pub fn number_type(&self) -> NumberType {
        match self {
            NumberLiteral::Int(_) => NumberType::Int,
            NumberLiteral::Uint(_) => NumberType::Uint,
            NumberLiteral::Double(_) => NumberType::Double,
            NumberLiteral::Decimal(_) => NumberType::Decimal,
        }
    }

    fn to_f64(&self) -> f64 {
        match *self {
            NumberLiteral::Int(v) => v as f64,
            NumberLiteral::Uint(v) => v as f64,
            NumberLiteral::Double(v) => v,
            NumberLiteral::Decimal(d) => decimal_to_f64(&d),
        }
    }

    /// ECMAScript ToInt32.
    fn to_int32(&self) -> i32 {
        match *self {
            NumberLiteral::Int(v) => v,
            NumberLiteral::Uint(v) => v as i32,
            _ => wrap_to_u32(self.to_f64()) as i32,
        }
    }

    /// ECMAScript ToUint32.
    fn to_uint32(&self) -> u32 {
        match *self {
            NumberLiteral::Int(v) => v as u32,
            NumberLiteral::Uint(v) => v,
            _ => wrap_to_u32(self.to_f64()),
        }
    }
}

impl From<NumberLiteral> for DefaultValue {
    fn from(value: NumberLiteral) -> Self {
        match value {
            NumberLiteral::Int(v) => DefaultValue::Int(v),
            NumberLiteral::Uint(v) => DefaultValue::Uint(v),
            NumberLiteral::Double(v) => DefaultValue::Double(v),
            NumberLiteral::Decimal(v) => DefaultValue::Decimal(v),
        }
    }
}

/// Truncate and reduce modulo 2^32. NaN and infinities give 0.
fn wrap_to_u32(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4_294_967_296.0) as u32
}

fn decimal_to_f64(value: &Decimal128) -> f64 {
    if value.is_nan() {
        return f64::NAN;
    }
    let sign = if value.is_negative() { -1.0 } else { 1.0 };
    if value.is_infinite() {
        return sign * f64::INFINITY;
    }
    let magnitude = format!("{}e{}", value.coefficient(), value.exponent())
        .parse::<f64>()
        .unwrap_or(f64::NAN);
    sign * magnitude
}

/// Looks like a floating literal: has a point or exponent, or is too long
/// for an integer, and is not hex.
fn looks_floating(text: &str) -> bool {
    (text.contains(['.', 'e', 'E']) || text.len() > 10) && !text.contains(['x', 'X'])
}

/// Sign, radix and digit span of an integral literal.
struct IntegralText<'a> {
    negative: bool,
    hex: bool,
    digits: &'a str,
}

fn split_integral(text: &str) -> IntegralText<'_> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut start = 0;
    let mut negative = false;
    if len > 1 && matches!(bytes[0], b'-' | b'+') {
        negative = bytes[0] == b'-';
        start = 1;
    }
    let mut hex = false;
    if len > 2 && bytes.get(start) == Some(&b'0') {
        start += 1;
        if matches!(bytes.get(start), Some(b'x' | b'X')) {
            hex = true;
            start += 1;
        }
    }
    // Leading zeros, keeping the last digit.
    while start + 1 < len && bytes[start] == b'0' {
        start += 1;
    }
    IntegralText {
        negative,
        hex,
        digits: text.get(start..).unwrap_or(""),
    }
}

fn hex_digit(ch: char) -> u32 {
    ch.to_digit(16).unwrap_or(0)
}

/// Parse into an int, a uint (only when `es4`), or a double.
///
/// `force` skips the integer narrowing.
fn double_or_int(text: &str, force: bool, es4: bool) -> NumberLiteral {
    match text {
        "NaN" => return NumberLiteral::Double(f64::NAN),
        "Infinity" => return NumberLiteral::Double(f64::INFINITY),
        "-Infinity" => return NumberLiteral::Double(f64::NEG_INFINITY),
        _ => {}
    }

    let mut is_int = false;
    let mut sum: f64;
    if looks_floating(text) {
        sum = text.parse().unwrap_or(f64::NAN);
    } else {
        is_int = true;
        let parts = split_integral(text);
        let digits: Vec<char> = parts.digits.chars().collect();
        sum = 0.0;
        if parts.hex {
            // 13 digits fit the 53-bit mantissa; one more is read before
            // rounding.
            let mut end = 0;
            let mut last = 0;
            while end * 4 < 53 && end < digits.len() {
                last = hex_digit(digits[end]);
                sum = sum * 16.0 + last as f64;
                end += 1;
            }
            if end < digits.len() {
                let bit53 = last & 1;
                let next = hex_digit(digits[end]);
                let bit54 = (next & 8) >> 3;
                let mut sticky = next & 7 != 0;
                let mut factor = 16.0;
                for &ch in &digits[end + 1..] {
                    sticky |= hex_digit(ch) != 0;
                    factor *= 16.0;
                }
                if bit54 != 0 && (bit53 != 0 || sticky) {
                    sum += 1.0;
                }
                sum *= factor;
            }
        } else {
            for &ch in &digits {
                sum = sum * 10.0 + ch.to_digit(10).unwrap_or(0) as f64;
            }
            // Past i32 the running sum may have lost precision.
            if sum > 2_147_483_647.0 {
                sum = parts.digits.parse().unwrap_or(sum);
            }
        }
        if parts.negative {
            if sum == 0.0 {
                sum = -0.0;
                is_int = false;
            } else {
                sum = -sum;
            }
        }
    }

    if !force && is_int {
        let value = sum as i64;
        if let Ok(v) = i32::try_from(value) {
            return NumberLiteral::Int(v);
        }
        if es4 {
            if let Ok(v) = u32::try_from(value) {
                return NumberLiteral::Uint(v);
            }
        }
    }

    if sum.is_infinite() {
        sum = if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    NumberLiteral::Double(sum)
}

/// Decimal counterpart of [`double_or_int`].
fn decimal_or_int(text: &str, force: bool) -> NumberLiteral {
    match text {
        "NaN" => return NumberLiteral::Decimal(Decimal128::NAN),
        "Infinity" => return NumberLiteral::Decimal(Decimal128::INFINITY),
        "-Infinity" => return NumberLiteral::Decimal(Decimal128::NEG_INFINITY),
        _ => {}
    }

    let mut is_int = false;
    let mut value;
    if looks_floating(text) {
        value = Decimal128::parse(text).unwrap_or(Decimal128::NAN);
    } else {
        is_int = true;
        let parts = split_integral(text);
        value = if parts.hex {
            let magnitude = parts.digits.chars().fold(0u128, |acc, ch| {
                acc.saturating_mul(16).saturating_add(hex_digit(ch) as u128)
            });
            Decimal128::from_u128(magnitude)
        } else {
            Decimal128::parse(parts.digits).unwrap_or(Decimal128::NAN)
        };
        if parts.negative {
            if value.is_zero() {
                value = Decimal128::ZERO.negate();
                is_int = false;
            } else {
                value = value.negate();
            }
        }
    }

    if !force && is_int {
        if let Some(v) = value.to_i64() {
            if let Ok(v) = i32::try_from(v) {
                return NumberLiteral::Int(v);
            }
            if let Ok(v) = u32::try_from(v) {
                return NumberLiteral::Uint(v);
            }
        }
    }

    if value.is_nan() {
        value = Decimal128::NAN;
    } else if value.is_infinite() {
        value = if text.starts_with('-') {
            Decimal128::NEG_INFINITY
        } else {
            Decimal128::INFINITY
        };
    }
    NumberLiteral::Decimal(value)
}

/// Parse numeric literal text under the active number usage.
///
/// Without `es4` the literal becomes an int when it is integral and fits,
/// else a double; the usage is ignored. With `es4` a usage of `int`,
/// `uint`, `double` or `decimal`, or a type suffix (`i`, `u`, `d`, `m`),
/// forces the literal's type; the floating usage picks double or decimal
/// for non-integral values.
pub fn parse_number_literal(text: &str, usage: Option<&NumberUsage>, es4: bool) -> NumberLiteral {
    if !es4 {
        return double_or_int(text, false, false);
    }

    let mut floating = NumberType::Double;
    let mut forced = None;
    if let Some(usage) = usage {
        if usage.floating_usage == NumberType::Decimal {
            floating = NumberType::Decimal;
        }
        forced = match usage.usage {
            NumberType::Number => None,
            other => Some(other),
        };
    }

    let mut text = text;
    let is_hex = text.contains(['x', 'X']);
    let suffix = match text.chars().last() {
        Some('i') => Some(NumberType::Int),
        Some('u') => Some(NumberType::Uint),
        Some('m') => {
            floating = NumberType::Decimal;
            Some(NumberType::Decimal)
        }
        // A trailing d on a hex literal is a digit.
        Some('d') if !is_hex => {
            floating = NumberType::Double;
            Some(NumberType::Double)
        }
        _ => None,
    };
    if suffix.is_some() {
        forced = suffix;
        text = &text[..text.len() - 1];
    }

    match forced {
        Some(NumberType::Double) => return double_or_int(text, true, true),
        Some(NumberType::Decimal) => return decimal_or_int(text, true),
        _ => {}
    }

    let result = if floating == NumberType::Decimal {
        decimal_or_int(text, false)
    } else {
        double_or_int(text, false, true)
    };
    match forced {
        Some(NumberType::Int) => NumberLiteral::Int(result.to_int32()),
        Some(NumberType::Uint) => NumberLiteral::Uint(result.to_uint32()),
        _ => result,
    }
}

impl AbcEmitter {
    /// Push a numeric constant with the narrowest instruction.
    pub fn push_number(&mut self, value: &NumberLiteral) {
        match *value {
            NumberLiteral::Int(v) => self.push_int_value(v),
            NumberLiteral::Uint(v) => {
                if v <= 0x7F {
                    self.push_byte(v as i8);
                } else if v <= 0x7FFF {
                    self.push_short(v as i16);
                } else {
                    self.push_uint(v);
                }
            }
            NumberLiteral::Double(v) => {
                if v.is_nan() {
                    self.push_nan();
                } else if v.is_finite()
                    && v.trunc() == v
                    && v >= i32::MIN as f64
                    && v <= i32::MAX as f64
                    && !(v == 0.0 && v.is_sign_negative())
                {
                    self.push_int_value(v as i32);
                } else {
                    self.push_double(v);
                }
            }
            NumberLiteral::Decimal(ref d) => self.push_decimal(d),
        }
    }

    /// Parse and push literal text under the configured numeric mode.
    pub fn push_number_literal(&mut self, text: &str, usage: Option<&NumberUsage>) {
        let value = parse_number_literal(text, usage, self.config.es4_numerics);
        self.push_number(&value);
    }

    fn push_int_value(&mut self, value: i32) {
        if let Ok(b) = i8::try_from(value) {
            self.push_byte(b);
        } else if let Ok(s) = i16::try_from(value) {
            self.push_short(s);
        } else {
            self.push_int(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{OpCode, assert_opcodes};
    use crate::emit::FrameLayout;
    use abc_core::EmitterConfig;

    fn plain(text: &str) -> NumberLiteral {
        parse_number_literal(text, None, false)
    }

    fn es4(text: &str, usage: Option<&NumberUsage>) -> NumberLiteral {
        parse_number_literal(text, usage, true)
    }

    fn usage(usage: NumberType, floating: NumberType) -> NumberUsage {
        NumberUsage {
            usage,
            floating_usage: floating,
            ..NumberUsage::default()
        }
    }

    #[test]
    fn special_spellings() {
        assert!(matches!(plain("NaN"), NumberLiteral::Double(v) if v.is_nan()));
        assert_eq!(plain("Infinity"), NumberLiteral::Double(f64::INFINITY));
        assert_eq!(plain("-Infinity"), NumberLiteral::Double(f64::NEG_INFINITY));
    }

    #[test]
    fn integers_narrow_to_int() {
        assert_eq!(plain("42"), NumberLiteral::Int(42));
        assert_eq!(plain("-42"), NumberLiteral::Int(-42));
        assert_eq!(plain("007"), NumberLiteral::Int(7));
        assert_eq!(plain("0x7FFFFFFF"), NumberLiteral::Int(i32::MAX));
        assert_eq!(plain("-2147483648"), NumberLiteral::Int(i32::MIN));
    }

    #[test]
    fn uint_only_with_es4() {
        assert_eq!(plain("2147483648"), NumberLiteral::Double(2147483648.0));
        assert_eq!(plain("0xFFFFFFFF"), NumberLiteral::Double(4294967295.0));
        assert_eq!(es4("2147483648", None), NumberLiteral::Uint(2147483648));
        assert_eq!(es4("4294967296", None), NumberLiteral::Double(4294967296.0));
    }

    #[test]
    fn floating_classification() {
        assert_eq!(plain("1.5"), NumberLiteral::Double(1.5));
        assert_eq!(plain("1e3"), NumberLiteral::Double(1000.0));
        // eleven characters reads as floating
        assert_eq!(plain("12345678901"), NumberLiteral::Double(12345678901.0));
    }

    #[test]
    fn negative_zero_is_double() {
        match plain("-0") {
            NumberLiteral::Double(v) => assert!(v == 0.0 && v.is_sign_negative()),
            other => panic!("expected double, got {other:?}"),
        }
    }

    #[test]
    fn hex_rounds_half_even_at_53_bits() {
        let two_56 = 2f64.powi(56);
        // exact tie, even mantissa stays
        assert_eq!(plain("0x100000000000008"), NumberLiteral::Double(two_56));
        // tie with odd mantissa rounds up
        assert_eq!(
            plain("0x100000000000018"),
            NumberLiteral::Double(two_56 + 32.0)
        );
        // above the tie rounds up
        assert_eq!(
            plain("0x100000000000009"),
            NumberLiteral::Double(two_56 + 16.0)
        );
    }

    #[test]
    fn suffixes_force_type() {
        assert_eq!(es4("5i", None), NumberLiteral::Int(5));
        assert_eq!(es4("5u", None), NumberLiteral::Uint(5));
        assert_eq!(es4("5d", None), NumberLiteral::Double(5.0));
        assert_eq!(es4("5m", None), NumberLiteral::Decimal(Decimal128::from_i64(5)));
        // hex digit, not a suffix
        assert_eq!(es4("0x1d", None), NumberLiteral::Int(29));
    }

    #[test]
    fn usage_forces_type() {
        let int = usage(NumberType::Int, NumberType::Number);
        assert_eq!(es4("3.7", Some(&int)), NumberLiteral::Int(3));
        let uint = usage(NumberType::Uint, NumberType::Number);
        assert_eq!(es4("-1", Some(&uint)), NumberLiteral::Uint(u32::MAX));
        let double = usage(NumberType::Double, NumberType::Number);
        assert_eq!(es4("7", Some(&double)), NumberLiteral::Double(7.0));
        // usage is ignored without es4
        assert_eq!(parse_number_literal("7", Some(&double), false), NumberLiteral::Int(7));
    }

    #[test]
    fn decimal_floating_usage() {
        let decimal = usage(NumberType::Number, NumberType::Decimal);
        assert_eq!(
            es4("1.5", Some(&decimal)),
            NumberLiteral::Decimal(Decimal128::parse("1.5").unwrap())
        );
        assert_eq!(es4("12", Some(&decimal)), NumberLiteral::Int(12));
        assert_eq!(es4("3000000000", Some(&decimal)), NumberLiteral::Uint(3_000_000_000));
        assert!(matches!(
            es4("-0", Some(&decimal)),
            NumberLiteral::Decimal(d) if d.is_zero() && d.is_negative()
        ));
    }

    #[test]
    fn int32_conversion_wraps() {
        assert_eq!(NumberLiteral::Double(4294967297.0).to_int32(), 1);
        assert_eq!(NumberLiteral::Double(-1.5).to_uint32(), u32::MAX);
        assert_eq!(NumberLiteral::Double(f64::NAN).to_int32(), 0);
        assert_eq!(NumberLiteral::Double(f64::INFINITY).to_uint32(), 0);
    }

    fn pushed(value: NumberLiteral) -> Vec<u8> {
        let mut e = AbcEmitter::new(EmitterConfig::new().with_es4_numerics(true));
        e.start_method("test", FrameLayout::default()).unwrap();
        e.push_number(&value);
        assert_eq!(e.stack_depth(), 1);
        e.code().to_vec()
    }

    #[test]
    fn narrowest_int_push() {
        assert_opcodes(&pushed(NumberLiteral::Int(5)), &[OpCode::PushByte]);
        assert_opcodes(&pushed(NumberLiteral::Int(-128)), &[OpCode::PushByte]);
        assert_opcodes(&pushed(NumberLiteral::Int(300)), &[OpCode::PushShort]);
        assert_opcodes(&pushed(NumberLiteral::Int(100_000)), &[OpCode::PushInt]);
    }

    #[test]
    fn narrowest_uint_push() {
        assert_opcodes(&pushed(NumberLiteral::Uint(0x7F)), &[OpCode::PushByte]);
        assert_opcodes(&pushed(NumberLiteral::Uint(200)), &[OpCode::PushShort]);
        assert_opcodes(&pushed(NumberLiteral::Uint(0x8000)), &[OpCode::PushUint]);
    }

    #[test]
    fn integral_doubles_push_as_ints() {
        assert_opcodes(&pushed(NumberLiteral::Double(2.0)), &[OpCode::PushByte]);
        assert_opcodes(&pushed(NumberLiteral::Double(0.0)), &[OpCode::PushByte]);
        assert_opcodes(&pushed(NumberLiteral::Double(-0.0)), &[OpCode::PushDouble]);
        assert_opcodes(&pushed(NumberLiteral::Double(1.5)), &[OpCode::PushDouble]);
        assert_opcodes(&pushed(NumberLiteral::Double(3e9)), &[OpCode::PushDouble]);
        assert_opcodes(&pushed(NumberLiteral::Double(f64::NAN)), &[OpCode::PushNaN]);
        assert_opcodes(
            &pushed(NumberLiteral::Double(f64::INFINITY)),
            &[OpCode::PushDouble],
        );
    }

    #[test]
    fn decimal_push() {
        assert_opcodes(
            &pushed(NumberLiteral::Decimal(Decimal128::from_i64(1))),
            &[OpCode::PushDecimal],
        );
    }

    #[test]
    fn literal_into_default_value() {
        assert_eq!(DefaultValue::from(NumberLiteral::Int(5)), DefaultValue::Int(5));
    }
}
