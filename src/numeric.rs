//! Numeric literal scanning: integer fast path with a correctly-rounded
//! decimal-to-double fallback (spec.md §4.2).
//!
//! The reference scanner (`scan_fp_strict.c`) speculatively accumulates
//! digits into an `int64` as it goes, since most JSON numbers in practice are
//! small integers. If the literal turns out to have a fractional part or
//! exponent, or the digit run is long enough that the speculative integer
//! might not fit, it restarts from the beginning and hands the whole span to
//! `strtod`. This module mirrors that two-path structure; the slow path uses
//! `str::parse::<f64>`, whose implementation is correctly rounded, in place
//! of `strtod`.

/// Result of scanning one numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Int(i64),
    Double(f64),
}

/// The digit-count guard (including a leading `-`) under which the fast
/// path's speculative `int64` accumulation is trusted. spec.md §9 notes the
/// reference implementation writes this inconsistently as `< 20` or `<= 20`
/// across variants; this crate follows the distilled spec's explicit choice
/// of `< 20`, i.e. at most 19 digits.
const FAST_PATH_DIGIT_GUARD: usize = 20;

/// Scans a JSON numeric literal starting at `bytes[start]`.
///
/// Returns the parsed value and the offset just past the literal, or `None`
/// if `bytes[start]` does not begin a valid number (no digits follow an
/// optional leading `-`, or the slow path fails to advance at all).
pub fn scan(bytes: &[u8], start: usize) -> Option<(NumericValue, usize)> {
    let end = bytes.len();
    let mut p = start;

    let negative = bytes.get(p) == Some(&b'-');
    if negative {
        p += 1;
    }

    let digits_start = p;
    let mut int_val: i64 = 0;
    while p < end && bytes[p].is_ascii_digit() {
        int_val = int_val.wrapping_mul(10).wrapping_add((bytes[p] - b'0') as i64);
        p += 1;
    }

    if p == digits_start {
        // A lone `-`, or a byte that isn't actually a digit run (e.g. a
        // leading `.`, which JSON disallows without digits before it).
        return None;
    }

    let next = bytes.get(p).copied();
    let has_fraction_or_exponent = matches!(next, Some(b'.') | Some(b'e') | Some(b'E'));
    let span_including_sign = p - start;

    if !has_fraction_or_exponent && span_including_sign < FAST_PATH_DIGIT_GUARD {
        let value = if negative { -int_val } else { int_val };
        return Some((NumericValue::Int(value), p));
    }

    scan_slow_path(bytes, start, p)
}

/// Scans the remainder of a numeric literal (fractional part and/or
/// exponent) and parses the whole `[start, q)` span as `f64`. `after_digits`
/// is the position right after the initial (sign +) integer digit run.
fn scan_slow_path(bytes: &[u8], start: usize, after_digits: usize) -> Option<(NumericValue, usize)> {
    let end = bytes.len();
    let mut q = after_digits;

    if bytes.get(q) == Some(&b'.') {
        q += 1;
        while q < end && bytes[q].is_ascii_digit() {
            q += 1;
        }
    }

    if matches!(bytes.get(q), Some(b'e') | Some(b'E')) {
        q += 1;
        if matches!(bytes.get(q), Some(b'+') | Some(b'-')) {
            q += 1;
        }
        while q < end && bytes[q].is_ascii_digit() {
            q += 1;
        }
    }

    if q == start {
        return None;
    }

    let text = std::str::from_utf8(&bytes[start..q]).ok()?;
    let value: f64 = text.parse().ok()?;
    Some((NumericValue::Double(value), q))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_path_small_integer() {
        let (v, p) = scan(b"42,", 0).unwrap();
        assert_eq!(v, NumericValue::Int(42));
        assert_eq!(p, 2);
    }

    #[test]
    fn fast_path_negative_integer() {
        let (v, p) = scan(b"-17 ", 0).unwrap();
        assert_eq!(v, NumericValue::Int(-17));
        assert_eq!(p, 3);
    }

    #[test]
    fn nineteen_digits_uses_fast_path() {
        let lit = "1234567890123456789"; // 19 digits
        assert_eq!(lit.len(), 19);
        let (v, p) = scan(lit.as_bytes(), 0).unwrap();
        assert!(matches!(v, NumericValue::Int(_)));
        assert_eq!(p, lit.len());
    }

    #[test]
    fn twenty_digits_falls_back_to_double() {
        let lit = "12345678901234567890"; // 20 digits
        assert_eq!(lit.len(), 20);
        let (v, p) = scan(lit.as_bytes(), 0).unwrap();
        assert!(matches!(v, NumericValue::Double(_)));
        assert_eq!(p, lit.len());
    }

    #[test]
    fn fraction_and_exponent_use_slow_path() {
        let (v, p) = scan(b"3.4}", 0).unwrap();
        assert_eq!(v, NumericValue::Double(3.4));
        assert_eq!(p, 3);

        let (v, p) = scan(b"1e10,", 0).unwrap();
        assert_eq!(v, NumericValue::Double(1e10));
        assert_eq!(p, 4);

        let (v, p) = scan(b"-2.5e-3]", 0).unwrap();
        assert_eq!(v, NumericValue::Double(-2.5e-3));
        assert_eq!(p, 7);
    }

    #[test]
    fn lone_minus_is_error() {
        assert_eq!(scan(b"-", 0), None);
        assert_eq!(scan(b"- ", 0), None);
    }

    #[test]
    fn leading_dot_is_error() {
        assert_eq!(scan(b".5", 0), None);
    }
}
