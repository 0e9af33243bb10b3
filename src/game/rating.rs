//! Elo Rating
//!
//! Post-match rating update for ranked matches.

use serde::{Serialize, Deserialize};

/// Rating change per game for a fully unexpected result.
pub const K_FACTOR: f64 = 32.0;

/// Rating difference at which the stronger player is 10x as likely to win.
pub const RATING_SCALE: f64 = 400.0;

/// Probability that a player rated `mine` beats one rated `opponent`.
pub fn expected_score(mine: i32, opponent: i32) -> f64 {
    let exponent = f64::from(opponent - mine) / RATING_SCALE;
    1.0 / (1.0 + 10f64.powf(exponent))
}

/// Rating after one game, from the player's own perspective.
pub fn new_rating(mine: i32, opponent: i32, won: bool) -> i32 {
    let outcome = if won { 1.0 } else { 0.0 };
    let updated = f64::from(mine) + K_FACTOR * (outcome - expected_score(mine, opponent));
    updated.round() as i32
}

/// Ratings of both players after a decided match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingUpdate {
    /// Winner's new rating.
    pub winner: i32,
    /// Loser's new rating.
    pub loser: i32,
}

impl RatingUpdate {
    /// Apply Elo to a winner/loser pair of pre-match ratings.
    ///
    /// Each side's expectation uses the other's pre-match rating.
    pub fn elo(winner: i32, loser: i32) -> Self {
        Self {
            winner: new_rating(winner, loser, true),
            loser: new_rating(loser, winner, false),
        }
    }

    /// No change, for unrated matches.
    pub fn unchanged(winner: i32, loser: i32) -> Self {
        Self { winner, loser }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_match() {
        assert_eq!(expected_score(1000, 1000), 0.5);
        assert_eq!(RatingUpdate::elo(1000, 1000), RatingUpdate { winner: 1016, loser: 984 });
    }

    #[test]
    fn test_upset_moves_more() {
        // Underdog wins: big swing
        let upset = RatingUpdate::elo(1200, 1600);
        assert_eq!(upset.winner, 1229);
        assert_eq!(upset.loser, 1571);

        // Favourite wins: small swing
        let expected = RatingUpdate::elo(1600, 1200);
        assert_eq!(expected.winner, 1603);
        assert_eq!(expected.loser, 1197);
    }

    #[test]
    fn test_unchanged() {
        assert_eq!(RatingUpdate::unchanged(1300, 900), RatingUpdate { winner: 1300, loser: 900 });
    }

    proptest! {
        #[test]
        fn prop_rating_exchange_is_zero_sum(a in 100i32..3000, b in 100i32..3000) {
            let update = RatingUpdate::elo(a, b);
            prop_assert_eq!((update.winner - a) + (update.loser - b), 0);
        }

        #[test]
        fn prop_winner_never_loses_points(a in 100i32..3000, b in 100i32..3000) {
            let update = RatingUpdate::elo(a, b);
            prop_assert!(update.winner >= a);
            prop_assert!(update.loser <= b);
        }
    }
}
