//! Exact decimal-text comparison for `minimum`/`maximum`/`multipleOf` etc.
//!
//! `serde_json::Number`'s `as_f64()` loses precision for integers and decimal
//! fractions beyond what an `f64` mantissa can hold (`multipleOf: 0.1` against
//! `1.1` must succeed, but `1.1 / 0.1` in `f64` is `10.999999999999998`).
//! These helpers instead compare/divide the numbers' canonical decimal text.
//!
//! Scientific notation (`1e300`) falls back to an `f64` comparison: bounding
//! such magnitudes in a fixed-width integer isn't worth the complexity here.

use std::cmp::Ordering;

fn parse(s: &str) -> Option<(bool, Vec<u8>, u32)> {
    let s = s.strip_prefix('+').unwrap_or(s);
    let (neg, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if s.is_empty() || s.contains(['e', 'E']) {
        return None;
    }
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let mut digits = Vec::with_capacity(int_part.len() + frac_part.len());
    for c in int_part.chars().chain(frac_part.chars()) {
        digits.push(c.to_digit(10)? as u8);
    }
    Some((neg, digits, frac_part.len() as u32))
}

fn strip_leading(d: &[u8]) -> &[u8] {
    let i = d.iter().position(|&x| x != 0).unwrap_or(d.len());
    &d[i..]
}

fn cmp_mag(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading(a);
    let b = strip_leading(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn align(a: &[u8], scale_a: u32, b: &[u8], scale_b: u32) -> (Vec<u8>, Vec<u8>) {
    let scale = scale_a.max(scale_b);
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.extend(std::iter::repeat(0).take((scale - scale_a) as usize));
    b.extend(std::iter::repeat(0).take((scale - scale_b) as usize));
    let len = a.len().max(b.len());
    let mut pa = vec![0u8; len.saturating_sub(a.len())];
    pa.extend(a);
    let mut pb = vec![0u8; len.saturating_sub(b.len())];
    pb.extend(b);
    (pa, pb)
}

fn fallback_cmp(a: &str, b: &str) -> Ordering {
    let a: f64 = a.parse().unwrap_or(f64::NAN);
    let b: f64 = b.parse().unwrap_or(f64::NAN);
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Exact ordering of two JSON-number decimal texts.
pub(crate) fn compare(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some((na, da, sa)), Some((nb, db, sb))) => {
            let (da, db) = align(&da, sa, &db, sb);
            match (na, nb) {
                (false, false) => cmp_mag(&da, &db),
                (true, true) => cmp_mag(&db, &da),
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
            }
        }
        _ => fallback_cmp(a, b),
    }
}

fn to_scaled_int(digits: &[u8], scale: u32, target_scale: u32) -> Option<u128> {
    let mut n: u128 = 0;
    for &d in digits {
        n = n.checked_mul(10)?.checked_add(d as u128)?;
    }
    n.checked_mul(10u128.checked_pow(target_scale.checked_sub(scale)?)?)
}

/// True if `value` is an exact multiple of `of` (both JSON-number decimal texts).
/// Falls back to `f64` division when either operand overflows the exact path.
pub(crate) fn is_multiple_of(value: &str, of: &str) -> bool {
    let exact = (|| {
        let (_, vd, vs) = parse(value)?;
        let (_, od, os) = parse(of)?;
        let scale = vs.max(os);
        let v_int = to_scaled_int(&vd, vs, scale)?;
        let o_int = to_scaled_int(&od, os, scale)?;
        if o_int == 0 {
            return Some(false);
        }
        Some(v_int % o_int == 0)
    })();
    exact.unwrap_or_else(|| {
        let v: f64 = value.parse().unwrap_or(f64::NAN);
        let o: f64 = of.parse().unwrap_or(f64::NAN);
        o != 0.0 && (v / o).fract() == 0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare() {
        assert_eq!(compare("1.1", "1.10"), Ordering::Equal);
        assert_eq!(compare("-1", "1"), Ordering::Less);
        assert_eq!(compare("2", "10"), Ordering::Less);
        assert_eq!(compare("10", "2"), Ordering::Greater);
    }

    #[test]
    fn test_multiple_of_exact() {
        assert!(is_multiple_of("1.1", "0.1"));
        assert!(!is_multiple_of("1.15", "0.1"));
        assert!(is_multiple_of("9", "3"));
        assert!(!is_multiple_of("9", "0"));
    }
}
