//! Pure comparators over version labels.
//!
//! # Examples
//!
//! ```rust
//! use std::cmp::Ordering;
//! use updraft::version::VersionComparator;
//!
//! assert_eq!(VersionComparator::compare_tokens("v1.2", "1.2.0"), Ordering::Equal);
//! assert_eq!(VersionComparator::compare_tokens("2.0.0-b12", "2.0.0-b9"), Ordering::Greater);
//! assert_eq!(VersionComparator::compare_dotted("1.20", "1.20.1"), Ordering::Less);
//! ```

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit-run regex is valid"));

/// Words that mark a label as a pre-release when no structured flag exists.
const UNSTABLE_MARKERS: &[&str] = &["alpha", "beta", "pre", "rc", "snapshot", "dev", "experimental"];

/// Version comparison utilities.
///
/// All methods are total: malformed input never errors, it simply orders as
/// if missing components were zero.
pub struct VersionComparator;

impl VersionComparator {
    /// Compare two dotted versions component by component.
    ///
    /// Each dot-separated component contributes its leading digits (a
    /// component without leading digits counts as `0`). Shorter versions are
    /// zero-padded, so `1.20` equals `1.20.0`.
    pub fn compare_dotted(a: &str, b: &str) -> Ordering {
        let left = Self::dotted_components(a);
        let right = Self::dotted_components(b);
        Self::compare_padded(&left, &right)
    }

    /// Compare two labels by their numeric token sequences.
    ///
    /// Every run of ASCII digits is a token, whatever separates them, so
    /// `v1.2-3`, `1_2_3` and `release 1.2.3` are all `[1, 2, 3]`. Sequences are
    /// zero-padded to the longer length before comparison. Tokens of any length
    /// are supported; they are compared by magnitude, not as strings.
    pub fn compare_tokens(a: &str, b: &str) -> Ordering {
        let left = Self::token_strings(a);
        let right = Self::token_strings(b);
        let len = left.len().max(right.len());

        for i in 0..len {
            let l = left.get(i).copied().unwrap_or("0");
            let r = right.get(i).copied().unwrap_or("0");
            let ord = compare_digit_strings(l, r);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Numeric tokens of a label; runs too large for `u64` saturate.
    pub fn numeric_tokens(label: &str) -> Vec<u64> {
        DIGIT_RUN
            .find_iter(label)
            .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
            .collect()
    }

    /// Whether a label contains at least one digit.
    pub fn has_numeric_tokens(label: &str) -> bool {
        DIGIT_RUN.is_match(label)
    }

    /// Whether `candidate` is strictly newer than `current` by token order.
    pub fn is_newer(candidate: &str, current: &str) -> bool {
        Self::compare_tokens(candidate, current) == Ordering::Greater
    }

    /// Whether two dotted versions share the same `major.minor` family.
    ///
    /// `1.20` and `1.20.4` are one family, `1.20.4` and `1.21` are not.
    pub fn same_family(a: &str, b: &str) -> bool {
        let left = Self::dotted_components(a);
        let right = Self::dotted_components(b);
        if left.is_empty() || right.is_empty() {
            return false;
        }
        let head = |v: &[u64]| [v.first().copied().unwrap_or(0), v.get(1).copied().unwrap_or(0)];
        head(&left) == head(&right)
    }

    /// Whether a free-form label looks like a pre-release build.
    ///
    /// Used only by providers that publish no structured stability flag.
    pub fn looks_unstable(label: &str) -> bool {
        let lower = label.to_ascii_lowercase();
        lower
            .split(|c: char| !c.is_ascii_alphabetic())
            .any(|word| UNSTABLE_MARKERS.contains(&word))
    }

    fn dotted_components(version: &str) -> Vec<u64> {
        let trimmed = version.trim().trim_start_matches(['v', 'V']);
        if trimmed.is_empty() {
            return Vec::new();
        }
        trimmed
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse::<u64>().unwrap_or(0)
            })
            .collect()
    }

    fn compare_padded(left: &[u64], right: &[u64]) -> Ordering {
        let len = left.len().max(right.len());
        for i in 0..len {
            let ord = left.get(i).unwrap_or(&0).cmp(right.get(i).unwrap_or(&0));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn token_strings(label: &str) -> Vec<&str> {
        DIGIT_RUN.find_iter(label).map(|m| m.as_str()).collect()
    }
}

/// Compare two ASCII digit strings by numeric magnitude.
fn compare_digit_strings(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_ignore_separators() {
        assert_eq!(VersionComparator::compare_tokens("v1.2-3", "1_2_3"), Ordering::Equal);
        assert_eq!(VersionComparator::compare_tokens("release 1.2.3", "1.2.3"), Ordering::Equal);
        assert_eq!(VersionComparator::numeric_tokens("paper-1.20.1-196"), vec![1, 20, 1, 196]);
    }

    #[test]
    fn test_tokens_zero_padding_is_equal() {
        assert_eq!(VersionComparator::compare_tokens("1.2", "1.2.0.0"), Ordering::Equal);
        assert_eq!(VersionComparator::compare_tokens("", "0"), Ordering::Equal);
        assert_eq!(VersionComparator::compare_tokens("v01.002", "1.2"), Ordering::Equal);
    }

    #[test]
    fn test_tokens_numeric_not_lexicographic() {
        assert_eq!(VersionComparator::compare_tokens("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(VersionComparator::compare_tokens("2.0.0-b9", "2.0.0-b12"), Ordering::Less);
    }

    #[test]
    fn test_tokens_huge_runs() {
        let a = "build-123456789012345678901234567890";
        let b = "build-123456789012345678901234567891";
        assert_eq!(VersionComparator::compare_tokens(a, b), Ordering::Less);
        assert_eq!(VersionComparator::numeric_tokens(a), vec![u64::MAX]);
    }

    #[test]
    fn test_tokens_property_equal_after_padding() {
        let pairs = [
            ("1.0", "1"),
            ("v2.0.0-SNAPSHOT", "2"),
            ("3-0-0-0", "3.0"),
            ("build 7 of 0", "7.0.0"),
        ];
        for (a, b) in pairs {
            assert_eq!(VersionComparator::compare_tokens(a, b), Ordering::Equal, "{a} vs {b}");
            assert_eq!(VersionComparator::compare_tokens(b, a), Ordering::Equal, "{b} vs {a}");
        }
    }

    #[test]
    fn test_dotted_comparison() {
        assert_eq!(VersionComparator::compare_dotted("1.20", "1.20.0"), Ordering::Equal);
        assert_eq!(VersionComparator::compare_dotted("1.20", "1.20.1"), Ordering::Less);
        assert_eq!(VersionComparator::compare_dotted("v1.21", "1.20.6"), Ordering::Greater);
        assert_eq!(VersionComparator::compare_dotted("1.20.1-pre2", "1.20.1"), Ordering::Equal);
    }

    #[test]
    fn test_same_family() {
        assert!(VersionComparator::same_family("1.20", "1.20.1"));
        assert!(VersionComparator::same_family("1.20.4", "1.20.1"));
        assert!(!VersionComparator::same_family("1.21", "1.20.1"));
        assert!(!VersionComparator::same_family("", "1.20.1"));
    }

    #[test]
    fn test_looks_unstable() {
        assert!(VersionComparator::looks_unstable("1.21-pre1"));
        assert!(VersionComparator::looks_unstable("2.0.0-RC.1"));
        assert!(VersionComparator::looks_unstable("5.2.0-SNAPSHOT"));
        assert!(!VersionComparator::looks_unstable("1.20.1"));
        assert!(!VersionComparator::looks_unstable("preview-free 1.0"));
    }

    #[test]
    fn test_is_newer() {
        assert!(VersionComparator::is_newer("1.0.1", "1.0.0"));
        assert!(!VersionComparator::is_newer("1.0.0", "1.0"));
    }
}
