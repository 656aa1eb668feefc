//! Resynchronization of a staged cursor against the live document.

/// Number of leading positions where both sequences agree.
pub fn longest_common_prefix<I>(actual: I, staged: &[char]) -> usize
where
    I: IntoIterator<Item = char>,
{
    actual
        .into_iter()
        .zip(staged.iter())
        .take_while(|(a, s)| a == *s)
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncPolicy {
    /// Only ever raises the cursor. Used when substitution resumes, so text the
    /// user typed by hand while paused is never replayed.
    Monotonic,
    /// Takes the match length as truth, lowering the cursor if needed. Used
    /// before every substitution so undo between keystrokes is absorbed.
    Exact,
}

impl ResyncPolicy {
    /// New cursor for `current` given a prefix match of `matched`, or `None`
    /// when the policy leaves it unchanged.
    pub fn resolve(self, current: usize, matched: usize) -> Option<usize> {
        let target = match self {
            ResyncPolicy::Monotonic if matched > current => matched,
            ResyncPolicy::Monotonic => return None,
            ResyncPolicy::Exact => matched,
        };
        (target != current).then_some(target)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResyncPolicy::Monotonic => "monotonic",
            ResyncPolicy::Exact => "exact",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn prefix_stops_at_first_mismatch() {
        assert_eq!(longest_common_prefix("abXd".chars(), &chars("abcd")), 2);
        assert_eq!(longest_common_prefix("".chars(), &chars("abc")), 0);
        assert_eq!(longest_common_prefix("abcdef".chars(), &chars("abc")), 3);
        assert_eq!(longest_common_prefix("Xbc".chars(), &chars("abc")), 0);
    }

    #[test]
    fn prefix_counts_chars_not_bytes() {
        assert_eq!(longest_common_prefix("héllo".chars(), &chars("hélp")), 3);
    }

    #[test]
    fn monotonic_never_lowers() {
        assert_eq!(ResyncPolicy::Monotonic.resolve(3, 1), None);
        assert_eq!(ResyncPolicy::Monotonic.resolve(1, 3), Some(3));
        assert_eq!(ResyncPolicy::Monotonic.resolve(2, 2), None);
    }

    #[test]
    fn exact_takes_match() {
        assert_eq!(ResyncPolicy::Exact.resolve(3, 1), Some(1));
        assert_eq!(ResyncPolicy::Exact.resolve(1, 1), None);
    }

    proptest! {
        #[test]
        fn exact_resync_is_idempotent(doc in "[ab]{0,12}", staged in "[ab]{1,12}", start in 0usize..13) {
            let staged = chars(&staged);
            let matched = longest_common_prefix(doc.chars(), &staged);
            let first = ResyncPolicy::Exact.resolve(start, matched).unwrap_or(start);
            let again = ResyncPolicy::Exact.resolve(first, longest_common_prefix(doc.chars(), &staged));
            prop_assert_eq!(again, None);
            prop_assert!(first <= staged.len());
        }

        #[test]
        fn monotonic_resync_never_regresses(doc in "[ab]{0,12}", staged in "[ab]{1,12}", start in 0usize..13) {
            let matched = longest_common_prefix(doc.chars(), &chars(&staged));
            let after = ResyncPolicy::Monotonic.resolve(start, matched).unwrap_or(start);
            prop_assert!(after >= start);
            prop_assert_eq!(after, start.max(matched));
        }
    }
}
