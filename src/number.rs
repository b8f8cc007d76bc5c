//! Numeric helpers shared by the schema model and the validators
//!
//! JSON numbers arrive as `serde_json::Number`, which may hold an `i64`, a
//! `u64` or an `f64`. Comparisons stay in integer space when both sides allow
//! it; `multipleOf` works on the exact decimal text instead of binary floats.

use serde_json::Number;
use std::cmp::Ordering;

/// Value equality regardless of integer/float representation (`1 == 1.0`)
pub fn numbers_equal(a: &Number, b: &Number) -> bool {
    compare_numbers(a, b) == Some(Ordering::Equal)
}

pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    // One side is a u64 above i64::MAX and the other a negative i64.
    if a.is_u64() && b.is_i64() {
        return Some(Ordering::Greater);
    }
    if a.is_i64() && b.is_u64() {
        return Some(Ordering::Less);
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Hash key consistent with [`numbers_equal`]
pub fn number_hash_bits(n: &Number) -> u64 {
    match n.as_f64() {
        Some(f) if f == 0.0 => 0,
        Some(f) => f.to_bits(),
        None => 0,
    }
}

/// A finite decimal `mantissa * 10^exponent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    negative: bool,
    mantissa: u128,
    exponent: i32,
}

impl Decimal {
    /// Parse the shortest decimal text of a JSON number
    pub fn from_number(n: &Number) -> Option<Self> {
        Self::parse(&n.to_string())
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (negative, rest) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (digits_part, exp_part) = match rest.find(['e', 'E']) {
            Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
            None => (rest, None),
        };
        let (int_part, frac_part) = match digits_part.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits_part, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let mut mantissa: u128 = 0;
        for c in int_part.chars().chain(frac_part.chars()) {
            let digit = c.to_digit(10)?;
            mantissa = mantissa.checked_mul(10)?.checked_add(u128::from(digit))?;
        }
        let mut exponent = -(i32::try_from(frac_part.len()).ok()?);
        if let Some(exp) = exp_part {
            let exp = exp.strip_prefix('+').unwrap_or(exp);
            exponent = exponent.checked_add(exp.parse::<i32>().ok()?)?;
        }
        Some(Self { negative, mantissa, exponent })
    }

    /// Whether `self` is an exact integer multiple of `divisor`.
    ///
    /// Only the divisor is rescaled to the common exponent; the value is
    /// reduced modulo the divisor, so huge exponents on the value never
    /// overflow. `None` when the rescaled divisor does not fit in 128 bits.
    pub fn is_multiple_of(&self, divisor: &Decimal) -> Option<bool> {
        if divisor.mantissa == 0 {
            return None;
        }
        if self.mantissa == 0 {
            return Some(true);
        }
        if divisor.exponent > self.exponent {
            let d = scale(divisor.mantissa, divisor.exponent.checked_sub(self.exponent)?)?;
            return Some(self.mantissa % d == 0);
        }
        let d = divisor.mantissa;
        let shift = u32::try_from(self.exponent.checked_sub(divisor.exponent)?).ok()?;
        Some(mul_mod(self.mantissa % d, pow_mod(10, shift, d), d) == 0)
    }

    pub fn is_negative(&self) -> bool {
        self.negative && self.mantissa != 0
    }
}

fn scale(mantissa: u128, by: i32) -> Option<u128> {
    let factor = 10u128.checked_pow(u32::try_from(by).ok()?)?;
    mantissa.checked_mul(factor)
}

/// `(a + b) % m` for `a, b < m` without overflow
fn add_mod(a: u128, b: u128, m: u128) -> u128 {
    if a >= m - b {
        a - (m - b)
    } else {
        a + b
    }
}

/// `(a * b) % m` for `a, b < m` by shift-and-add
fn mul_mod(mut a: u128, mut b: u128, m: u128) -> u128 {
    let mut result = 0;
    while b > 0 {
        if b & 1 == 1 {
            result = add_mod(result, a, m);
        }
        a = add_mod(a, a, m);
        b >>= 1;
    }
    result
}

/// `base^exp % m`
fn pow_mod(base: u128, mut exp: u32, m: u128) -> u128 {
    let mut result = 1 % m;
    let mut base = base % m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

/// `value` is a multiple of `divisor`, exactly whenever the rescaled divisor
/// fits in 128 bits
pub fn is_multiple_of(value: &Number, divisor: &Number) -> bool {
    let exact = Decimal::from_number(value)
        .zip(Decimal::from_number(divisor))
        .and_then(|(v, d)| v.is_multiple_of(&d));
    if let Some(result) = exact {
        return result;
    }
    match (value.as_f64(), divisor.as_f64()) {
        (Some(v), Some(d)) if d != 0.0 => {
            let quotient = v / d;
            quotient.is_finite() && (quotient - quotient.round()).abs() <= f64::EPSILON * quotient.abs().max(1.0)
        }
        _ => false,
    }
}
