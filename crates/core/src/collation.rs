//! Store-native key collation.
//!
//! The store orders subscripts with numeric keys first: a key that is a
//! canonic number sorts by numeric value, and every canonic number sorts
//! before every non-numeric key. Non-numeric keys sort as byte strings.
//! All boundary comparison in the cursor layer goes through [`collate`];
//! comparing keys with `str::cmp` or `f64` alone silently misorders mixed
//! key populations.

use std::cmp::Ordering;

/// Is `s` a canonic numeric key?
///
/// Canonic numbers have no sign other than a single leading `-`, no
/// leading zeros in the integer part, a non-empty fraction without a
/// trailing zero when a decimal point is present, and are not `-0`.
/// `".5"` is canonic; `"0.5"`, `"01"`, `"1."` and `"1.50"` are not.
pub fn is_canonic_number(s: &str) -> bool {
    let b = s.as_bytes();
    if b.is_empty() {
        return false;
    }
    let mut i = 0;
    let neg = b[0] == b'-';
    if neg {
        i = 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let int_len = i - int_start;
    if int_len > 1 && b[int_start] == b'0' {
        return false;
    }
    if i == b.len() {
        if int_len == 0 {
            return false;
        }
        // "-0" is not canonic
        return !(neg && int_len == 1 && b[int_start] == b'0');
    }
    if b[i] != b'.' {
        return false;
    }
    // fractional part: the integer part must be absent or non-zero
    if int_len == 1 && b[int_start] == b'0' {
        return false;
    }
    i += 1;
    let frac_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    if i != b.len() {
        return false;
    }
    let frac_len = i - frac_start;
    frac_len > 0 && b[i - 1] != b'0'
}

/// Compare two keys in store collation order.
///
/// Canonic numbers compare numerically and precede all other keys;
/// everything else compares bytewise.
pub fn collate(a: &str, b: &str) -> Ordering {
    match (is_canonic_number(a), is_canonic_number(b)) {
        (true, true) => {
            let fa: f64 = a.parse().unwrap_or(0.0);
            let fb: f64 = b.parse().unwrap_or(0.0);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.as_bytes().cmp(b.as_bytes()),
    }
}

/// Compare two subscript vectors elementwise in store collation order,
/// with a shorter path sorting before its extensions.
pub fn collate_subs(a: &[String], b: &[String]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match collate(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonic_accepts_plain_numbers() {
        for s in ["0", "1", "42", "-3", ".5", "-.5", "3.14", "100", ".01"] {
            assert!(is_canonic_number(s), "{s} should be canonic");
        }
    }

    #[test]
    fn test_canonic_rejects_non_canonic_forms() {
        for s in [
            "", "-", "-0", "01", "1.", "1.50", "0.5", "+1", "1e3", "abc", "1a", " 1", "B",
        ] {
            assert!(!is_canonic_number(s), "{s} should not be canonic");
        }
    }

    #[test]
    fn test_numbers_order_numerically() {
        assert_eq!(collate("2", "10"), Ordering::Less);
        assert_eq!(collate("-1", ".5"), Ordering::Less);
        assert_eq!(collate(".01", "1"), Ordering::Less);
        assert_eq!(collate("10", "10"), Ordering::Equal);
    }

    #[test]
    fn test_numbers_sort_before_strings() {
        assert_eq!(collate("999999", "A"), Ordering::Less);
        assert_eq!(collate("B", "2"), Ordering::Greater);
        // lexicographically "10" < "9" but numerically it is not
        assert_eq!(collate("9", "10"), Ordering::Less);
    }

    #[test]
    fn test_strings_sort_bytewise() {
        assert_eq!(collate("APPLE", "BANANA"), Ordering::Less);
        assert_eq!(collate("a", "B"), Ordering::Greater); // bytewise, not case-folded
    }

    #[test]
    fn test_subscript_vectors_shorter_first() {
        let a = vec!["1".to_string()];
        let b = vec!["1".to_string(), "B".to_string()];
        assert_eq!(collate_subs(&a, &b), Ordering::Less);
        assert_eq!(collate_subs(&b, &a), Ordering::Greater);
        assert_eq!(collate_subs(&a, &a), Ordering::Equal);
    }

    proptest! {
        #[test]
        fn prop_collate_is_antisymmetric(a in "[A-Za-z0-9.]{0,6}", b in "[A-Za-z0-9.]{0,6}") {
            let ab = collate(&a, &b);
            let ba = collate(&b, &a);
            prop_assert_eq!(ab, ba.reverse());
        }

        #[test]
        fn prop_numbers_always_precede_strings(n in 0u32..1_000_000, s in "[A-Z][A-Z0-9]{0,5}") {
            let num = n.to_string();
            prop_assert_eq!(collate(&num, &s), Ordering::Less);
        }

        #[test]
        fn prop_numeric_order_matches_integer_order(a in 0i64..1_000_000, b in 0i64..1_000_000) {
            let ord = collate(&a.to_string(), &b.to_string());
            prop_assert_eq!(ord, a.cmp(&b));
        }

        #[test]
        fn prop_collate_total_order_transitive(
            mut keys in proptest::collection::vec("[A-Za-z0-9.]{1,5}", 3..8)
        ) {
            keys.sort_by(|a, b| collate(a, b));
            for w in keys.windows(2) {
                prop_assert_ne!(collate(&w[0], &w[1]), Ordering::Greater);
            }
        }
    }
}
