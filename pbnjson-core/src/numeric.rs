//! Numeric literal decoding: a JSON number byte slice to a canonical
//! `{fraction, exponent, sign}` triple, plus overflow-aware conversions to
//! `i32`, `i64`, and `f64`.

/// The magnitude beyond which an `f64` mantissa cannot represent every
/// integer exactly (`2^53 - 1`), mirroring the source's `PJSON_MAX_INT_IN_DBL`.
pub const MAX_INT_IN_DBL: i64 = 0x1F_FFFF_FFFF_FFFF;
pub const MIN_INT_IN_DBL: i64 = -MAX_INT_IN_DBL;

/// A local substitute for a `bitflags!`-style combinable flag set. The pack
/// does not carry the `bitflags` crate for any JSON-domain consumer, so this
/// mirrors its `const`/bitor idiom directly rather than adding a dependency
/// for four flag bits.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name($repr);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            pub fn contains(self, other: $name) -> bool {
                other.0 == 0 || (self.0 & other.0) == other.0
            }

            pub fn is_ok(self) -> bool {
                self.0 == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitflags_like! {
    /// Result-flag set, combinable by bitwise-or, returned from every typed
    /// numeric accessor.
    pub struct ConversionFlags: u16 {
        const OK = 0;
        const POSITIVE_OVERFLOW = 1 << 0;
        const NEGATIVE_OVERFLOW = 1 << 1;
        const PRECISION_LOSS = 1 << 2;
        const NOT_A_NUMBER = 1 << 3;
    }
}

/// The canonical decomposition of a JSON numeric literal: `fraction ×
/// 10^exponent × sign`, plus the flags the scan itself raised (currently
/// only `NOT_A_NUMBER`; overflow/precision flags are set by the typed
/// conversions below, matching the source's split between the scanner and
/// the per-target-type converters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberComponents {
    pub fraction: u64,
    pub exponent: i64,
    pub sign: i8,
    pub flags: ConversionFlags,
}

impl NumberComponents {
    fn not_a_number() -> Self {
        NumberComponents {
            fraction: 0,
            exponent: 0,
            sign: 1,
            flags: ConversionFlags::NOT_A_NUMBER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Sign,
    IntegerDigits,
    FractionalDigits,
    ExponentSign,
    ExponentDigits,
}

/// Decode a byte slice presumed to match the JSON number grammar into its
/// canonical components. Bytes that do not match the grammar set
/// `NOT_A_NUMBER` and return zeroed components immediately.
pub fn decode(bytes: &[u8]) -> NumberComponents {
    if bytes.is_empty() {
        return NumberComponents::not_a_number();
    }

    let mut sign: i8 = 1;
    let mut fraction: u64 = 0;
    let mut exponent: i64 = 0;
    let mut lossy_tail = false;
    let mut seen_integer_digit = false;
    let mut seen_fraction_digit = false;
    let mut exp_sign: i64 = 1;
    let mut exp_value: i64 = 0;
    let mut seen_exp_digit = false;
    let mut exp_overflowed = false;

    let mut state = ScanState::Sign;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            ScanState::Sign => {
                if b == b'-' {
                    sign = -1;
                    i += 1;
                } else if b == b'+' {
                    i += 1;
                }
                state = ScanState::IntegerDigits;
            }
            ScanState::IntegerDigits => {
                if b.is_ascii_digit() {
                    seen_integer_digit = true;
                    accumulate_digit(&mut fraction, &mut exponent, &mut lossy_tail, b - b'0');
                    i += 1;
                } else if b == b'.' {
                    if !seen_integer_digit {
                        return NumberComponents::not_a_number();
                    }
                    state = ScanState::FractionalDigits;
                    i += 1;
                } else if b == b'e' || b == b'E' {
                    if !seen_integer_digit {
                        return NumberComponents::not_a_number();
                    }
                    state = ScanState::ExponentSign;
                    i += 1;
                } else {
                    return NumberComponents::not_a_number();
                }
            }
            ScanState::FractionalDigits => {
                if b.is_ascii_digit() {
                    seen_fraction_digit = true;
                    if !lossy_tail {
                        accumulate_fraction_digit(&mut fraction, &mut exponent, &mut lossy_tail, b - b'0');
                    }
                    i += 1;
                } else if b == b'e' || b == b'E' {
                    if !seen_fraction_digit {
                        return NumberComponents::not_a_number();
                    }
                    state = ScanState::ExponentSign;
                    i += 1;
                } else {
                    return NumberComponents::not_a_number();
                }
            }
            ScanState::ExponentSign => {
                if b == b'-' {
                    exp_sign = -1;
                    i += 1;
                } else if b == b'+' {
                    i += 1;
                }
                state = ScanState::ExponentDigits;
            }
            ScanState::ExponentDigits => {
                if b.is_ascii_digit() {
                    seen_exp_digit = true;
                    let digit = (b - b'0') as i64;
                    match exp_value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(digit))
                    {
                        Some(v) => exp_value = v,
                        None => exp_overflowed = true,
                    }
                    i += 1;
                } else {
                    return NumberComponents::not_a_number();
                }
            }
        }
    }

    match state {
        ScanState::IntegerDigits if !seen_integer_digit => return NumberComponents::not_a_number(),
        ScanState::FractionalDigits if !seen_fraction_digit => return NumberComponents::not_a_number(),
        ScanState::ExponentSign => return NumberComponents::not_a_number(),
        ScanState::ExponentDigits if !seen_exp_digit => return NumberComponents::not_a_number(),
        _ => {}
    }

    let mut flags = ConversionFlags::OK;
    if exp_overflowed {
        if exp_sign > 0 {
            fraction = u64::MAX;
            exponent = i64::MAX;
            flags |= ConversionFlags::POSITIVE_OVERFLOW;
        } else {
            fraction = 0;
            exponent = 0;
            flags |= ConversionFlags::PRECISION_LOSS;
        }
    } else {
        let signed_exp = exp_sign * exp_value;
        exponent = match exponent.checked_add(signed_exp) {
            Some(v) => v,
            None => {
                if signed_exp > 0 {
                    fraction = u64::MAX;
                    flags |= ConversionFlags::POSITIVE_OVERFLOW;
                    i64::MAX
                } else {
                    fraction = 0;
                    flags |= ConversionFlags::PRECISION_LOSS;
                    0
                }
            }
        };
    }
    if lossy_tail {
        flags |= ConversionFlags::PRECISION_LOSS;
    }

    NumberComponents {
        fraction,
        exponent,
        sign,
        flags,
    }
}

fn accumulate_digit(fraction: &mut u64, exponent: &mut i64, lossy_tail: &mut bool, digit: u8) {
    if *lossy_tail {
        *exponent += 1;
        return;
    }
    match fraction.checked_mul(10).and_then(|v| v.checked_add(digit as u64)) {
        Some(v) => *fraction = v,
        None => {
            *lossy_tail = true;
            *exponent += 1;
        }
    }
}

fn accumulate_fraction_digit(fraction: &mut u64, exponent: &mut i64, lossy_tail: &mut bool, digit: u8) {
    match fraction.checked_mul(10).and_then(|v| v.checked_add(digit as u64)) {
        Some(v) => {
            *fraction = v;
            *exponent -= 1;
        }
        None => {
            *lossy_tail = true;
        }
    }
}

/// Convert decoded components to `i64`, re-aligning the exponent to zero and
/// clamping on overflow. Negative values may reach `i64::MIN`'s magnitude,
/// one larger than `i64::MAX`.
pub fn to_i64(c: NumberComponents) -> (i64, ConversionFlags) {
    if c.flags.contains(ConversionFlags::NOT_A_NUMBER) {
        return (0, c.flags);
    }

    let mut fraction = c.fraction;
    let mut exponent = c.exponent;
    let mut flags = ConversionFlags::OK;
    if c.flags.contains(ConversionFlags::PRECISION_LOSS) {
        flags |= ConversionFlags::PRECISION_LOSS;
    }

    while exponent > 0 {
        match fraction.checked_mul(10) {
            Some(v) => fraction = v,
            None => {
                flags |= ConversionFlags::POSITIVE_OVERFLOW;
                return clamp_i64(c.sign, flags);
            }
        }
        exponent -= 1;
    }
    while exponent < 0 {
        if fraction == 0 {
            break;
        }
        if fraction % 10 != 0 {
            flags |= ConversionFlags::PRECISION_LOSS;
        }
        fraction /= 10;
        exponent += 1;
    }

    let magnitude_limit: u64 = if c.sign < 0 {
        (i64::MAX as u64) + 1
    } else {
        i64::MAX as u64
    };
    if fraction > magnitude_limit {
        flags |= if c.sign < 0 {
            ConversionFlags::NEGATIVE_OVERFLOW
        } else {
            ConversionFlags::POSITIVE_OVERFLOW
        };
        return clamp_i64(c.sign, flags);
    }

    let value = if c.sign < 0 {
        if fraction == magnitude_limit {
            i64::MIN
        } else {
            -(fraction as i64)
        }
    } else {
        fraction as i64
    };
    (value, flags)
}

fn clamp_i64(sign: i8, flags: ConversionFlags) -> (i64, ConversionFlags) {
    if sign < 0 {
        (i64::MIN, flags)
    } else {
        (i64::MAX, flags)
    }
}

/// Convert through `i64` then clamp into `i32`'s range.
pub fn to_i32(c: NumberComponents) -> (i32, ConversionFlags) {
    let (v, mut flags) = to_i64(c);
    if v > i32::MAX as i64 {
        flags |= ConversionFlags::POSITIVE_OVERFLOW;
        (i32::MAX, flags)
    } else if v < i32::MIN as i64 {
        flags |= ConversionFlags::NEGATIVE_OVERFLOW;
        (i32::MIN, flags)
    } else {
        (v as i32, flags)
    }
}

/// Convert decoded components to `f64` via `fraction × 10^exponent × sign`.
/// Magnitudes whose integer part exceeds `2^53` set `PRECISION_LOSS`;
/// results that saturate to infinity set the matching overflow flag.
pub fn to_f64(c: NumberComponents) -> (f64, ConversionFlags) {
    if c.flags.contains(ConversionFlags::NOT_A_NUMBER) {
        return (0.0, c.flags);
    }

    let mut flags = ConversionFlags::OK;
    if c.flags.contains(ConversionFlags::PRECISION_LOSS) {
        flags |= ConversionFlags::PRECISION_LOSS;
    }
    if c.fraction > MAX_INT_IN_DBL as u64 {
        flags |= ConversionFlags::PRECISION_LOSS;
    }

    let magnitude = (c.fraction as f64) * 10f64.powi(clamp_exponent(c.exponent));
    let value = magnitude * (c.sign as f64);

    if value.is_infinite() {
        flags |= if c.sign < 0 {
            ConversionFlags::NEGATIVE_OVERFLOW
        } else {
            ConversionFlags::POSITIVE_OVERFLOW
        };
    }

    (value, flags)
}

fn clamp_exponent(exponent: i64) -> i32 {
    exponent.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_integer() {
        let c = decode(b"123");
        assert_eq!(c.fraction, 123);
        assert_eq!(c.exponent, 0);
        assert_eq!(c.sign, 1);
        assert!(c.flags.is_ok());
    }

    #[test]
    fn decodes_negative_fraction() {
        let c = decode(b"-1.5");
        assert_eq!(c.sign, -1);
        let (f, flags) = to_f64(c);
        assert!(flags.is_ok());
        assert!((f + 1.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_grammar_bytes() {
        let c = decode(b"abc");
        assert!(c.flags.contains(ConversionFlags::NOT_A_NUMBER));
    }

    #[test]
    fn long_mantissa_flags_precision_loss_on_i64() {
        // "1.05960464477550000000" as i64 yields 1 with precision_loss.
        let c = decode(b"1.05960464477550000000");
        let (v, flags) = to_i64(c);
        assert_eq!(v, 1);
        assert!(flags.contains(ConversionFlags::PRECISION_LOSS));
    }

    #[test]
    fn exponent_notation_scales_fraction() {
        let c = decode(b"1.5e2");
        let (f, flags) = to_f64(c);
        assert!(flags.is_ok());
        assert!((f - 150.0).abs() < 1e-9);
    }

    #[test]
    fn overflow_clamps_to_i64_bounds() {
        let c = decode(b"99999999999999999999999999");
        let (v, flags) = to_i64(c);
        assert_eq!(v, i64::MAX);
        assert!(flags.contains(ConversionFlags::POSITIVE_OVERFLOW));
    }
}
