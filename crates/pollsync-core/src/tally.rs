//! Tally evaluator: per-option percentage and winner detection.
//!
//! Two edge-case policies are load-bearing for renderers:
//! - zero total votes yields 0% for every option;
//! - a shared maximum yields [`Outcome::Tie`], never the first index.

use serde::Serialize;

/// Share of `total` held by `votes`, rounded half-up, clamped to 0..=100.
pub fn percentage(votes: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    // floor(votes * 100 / total + 1/2) in integer arithmetic
    let scaled = (u128::from(votes) * 200 + u128::from(total)) / (2 * u128::from(total));
    scaled.min(100) as u8
}

/// Percentages for every option, in option order.
pub fn percentages(counts: &[u64], total: u64) -> Vec<u8> {
    counts.iter().map(|&v| percentage(v, total)).collect()
}

/// Result of winner detection over a vote-count vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Outcome {
    /// No votes cast (or no options).
    NoVotes,
    /// More than one option shares the maximum.
    Tie,
    /// Unique maximum at this option index.
    Winner(usize),
}

impl Outcome {
    pub fn winner(self) -> Option<usize> {
        match self {
            Self::Winner(i) => Some(i),
            Self::NoVotes | Self::Tie => None,
        }
    }
}

pub fn winner(counts: &[u64]) -> Outcome {
    let Some(&max) = counts.iter().max() else {
        return Outcome::NoVotes;
    };
    if max == 0 {
        return Outcome::NoVotes;
    }

    let mut leaders = counts
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v == max)
        .map(|(i, _)| i);

    match (leaders.next(), leaders.next()) {
        (Some(i), None) => Outcome::Winner(i),
        _ => Outcome::Tie,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_total_is_zero_percent() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(7, 0), 0);
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(1, 3), 33); // 33.33
        assert_eq!(percentage(2, 3), 67); // 66.67
        assert_eq!(percentage(1, 200), 1); // 0.5
        assert_eq!(percentage(1, 201), 0); // 0.497
    }

    #[test]
    fn even_split() {
        assert_eq!(percentages(&[2, 2], 4), vec![50, 50]);
    }

    #[test]
    fn inconsistent_total_is_clamped() {
        assert_eq!(percentage(9, 4), 100);
    }

    #[test]
    fn winner_cases() {
        assert_eq!(winner(&[]), Outcome::NoVotes);
        assert_eq!(winner(&[0, 0, 0]), Outcome::NoVotes);
        assert_eq!(winner(&[3, 5, 5]), Outcome::Tie);
        assert_eq!(winner(&[1, 9, 2]), Outcome::Winner(1));
        assert_eq!(winner(&[2, 2]), Outcome::Tie);
        assert_eq!(winner(&[0, 1]), Outcome::Winner(1));
    }

    #[test]
    fn tie_has_no_winner_index() {
        assert_eq!(Outcome::Tie.winner(), None);
        assert_eq!(Outcome::NoVotes.winner(), None);
        assert_eq!(Outcome::Winner(2).winner(), Some(2));
    }

    proptest! {
        #[test]
        fn percentage_bounded(votes in 0u64..10_000, total in 0u64..10_000) {
            prop_assert!(percentage(votes, total) <= 100);
        }

        #[test]
        fn percentage_monotonic_in_votes(a in 0u64..5_000, b in 0u64..5_000, total in 1u64..10_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(percentage(lo, total) <= percentage(hi, total));
        }

        #[test]
        fn winner_is_a_strict_maximum(counts in proptest::collection::vec(0u64..20, 0..10)) {
            if let Outcome::Winner(i) = winner(&counts) {
                for (j, &v) in counts.iter().enumerate() {
                    if j != i {
                        prop_assert!(v < counts[i]);
                    }
                }
            }
        }
    }
}
