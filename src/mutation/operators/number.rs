//! Numeric literal mutation.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{MutationCategory, MutationOperator, MutationOutcome, Replacement};

/// Numeric literal mutation: integers are incremented, floats nudged.
pub struct NumberMutation;

impl MutationOperator for NumberMutation {
    fn category(&self) -> MutationCategory {
        MutationCategory::Number
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, _ctx: &MutationContext) -> MutationOutcome {
        match tree.value(node).and_then(mutate_number) {
            Some(value) => MutationOutcome::Single(Replacement::Value(value)),
            None => MutationOutcome::Ineligible,
        }
    }
}

/// Mutate the text of a Python numeric literal.
///
/// Integers in any base become `value + 1` in decimal. Floats become
/// `value + 1e-5` when strictly between -1 and 1 (so small constants don't
/// all collapse to `1.0`), otherwise `value + 1.0`. A `l`/`j` suffix is kept.
pub fn mutate_number(literal: &str) -> Option<String> {
    let (body, suffix) = match literal.char_indices().last() {
        Some((i, c)) if matches!(c, 'l' | 'L' | 'j' | 'J') => (&literal[..i], &literal[i..]),
        _ => (literal, ""),
    };
    let digits: String = body.chars().filter(|&c| c != '_').collect();

    let lower = digits.to_ascii_lowercase();
    let (radix, int_digits) = if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') && !lower[1..].starts_with('.') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    if let Some(incremented) = increment_integer(int_digits, radix) {
        return Some(format!("{incremented}{suffix}"));
    }

    let parsed: f64 = digits.parse().ok()?;
    let mutated = if -1.0 < parsed && parsed < 1.0 {
        parsed + 1e-5
    } else {
        parsed + 1.0
    };
    Some(format!("{}{suffix}", float_repr(mutated)))
}

/// `digits` in `radix`, plus one, as decimal text. Width is unbounded.
///
/// Returns `None` unless `digits` is a non-empty run of valid digits.
fn increment_integer(digits: &str, radix: u32) -> Option<String> {
    const LIMB: u64 = 1_000_000_000;
    if digits.is_empty() {
        return None;
    }
    // Little-endian base-10^9 limbs.
    let mut limbs: Vec<u64> = vec![0];
    for c in digits.chars() {
        let mut carry = u64::from(c.to_digit(radix)?);
        for limb in &mut limbs {
            let value = *limb * u64::from(radix) + carry;
            *limb = value % LIMB;
            carry = value / LIMB;
        }
        if carry > 0 {
            limbs.push(carry);
        }
    }
    let mut carry = 1;
    for limb in &mut limbs {
        let value = *limb + carry;
        *limb = value % LIMB;
        carry = value / LIMB;
        if carry == 0 {
            break;
        }
    }
    if carry > 0 {
        limbs.push(carry);
    }

    let mut limbs = limbs.into_iter().rev();
    let mut text = limbs.next().unwrap_or_default().to_string();
    for limb in limbs {
        text.push_str(&format!("{limb:09}"));
    }
    Some(text)
}

/// Format a float the way Python's `repr` does: shortest round-trip digits,
/// positional notation for exponents in `-4..16`, scientific otherwise.
pub fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        return text.to_string();
    }

    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    if (-4..16).contains(&exponent) {
        let point = exponent + 1;
        let text = if point <= 0 {
            format!("0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
        } else if point as usize >= digits.len() {
            format!("{digits}{}.0", "0".repeat(point as usize - digits.len()))
        } else {
            let (int_part, frac_part) = digits.split_at(point as usize);
            format!("{int_part}.{frac_part}")
        };
        format!("{sign}{text}")
    } else {
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{sign}{mantissa}e{exp_sign}{:02}", exponent.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::mutants;
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(mutate_number("0").as_deref(), Some("1"));
        assert_eq!(mutate_number("41").as_deref(), Some("42"));
        assert_eq!(mutate_number("1_000").as_deref(), Some("1001"));
    }

    #[test]
    fn test_wide_integers_stay_integers() {
        assert_eq!(
            mutate_number("123456789012345678901234567890123456789012").as_deref(),
            Some("123456789012345678901234567890123456789013")
        );
        assert_eq!(mutate_number("999999999").as_deref(), Some("1000000000"));
        assert_eq!(
            mutate_number("0xffffffffffffffffffffffffffffffffff").as_deref(),
            Some("87112285931760246646623899502532662132736")
        );
    }

    #[test]
    fn test_other_bases() {
        assert_eq!(mutate_number("0x10").as_deref(), Some("17"));
        assert_eq!(mutate_number("0XfF").as_deref(), Some("256"));
        assert_eq!(mutate_number("0o17").as_deref(), Some("16"));
        assert_eq!(mutate_number("0b101").as_deref(), Some("6"));
        assert_eq!(mutate_number("017").as_deref(), Some("16"));
    }

    #[test]
    fn test_suffix_is_kept() {
        assert_eq!(mutate_number("1j").as_deref(), Some("2j"));
        assert_eq!(mutate_number("2.5J").as_deref(), Some("3.5J"));
    }

    #[test]
    fn test_floats() {
        assert_eq!(mutate_number("1.5").as_deref(), Some("2.5"));
        assert_eq!(mutate_number("0.5").as_deref(), Some("0.50001"));
        assert_eq!(mutate_number("1e10").as_deref(), Some("10000000001.0"));
        assert_eq!(mutate_number("1e20").as_deref(), Some("1e+20"));
        assert_eq!(mutate_number(".0").as_deref(), Some("1e-05"));
    }

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(-2.5), "-2.5");
        assert_eq!(float_repr(0.001), "0.001");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(0.00001), "1e-05");
        assert_eq!(float_repr(1.5e16), "1.5e+16");
        assert_eq!(float_repr(123456789.0), "123456789.0");
    }

    #[test]
    fn test_number_in_source() {
        assert_eq!(mutants("f(0)\n"), vec!["f(1)\n"]);
    }
}
