//! ELO Rating Engine
//!
//! Standard pairwise-expectation updates applied after every ranked
//! Mastermind match. Each player's update uses their own K-factor.

/// Rating assigned to a player before their first ranked match.
pub const INITIAL_RATING: i32 = 1200;

/// Expected score of a player against an opponent, in `[0, 1]`.
pub fn expected_score(player_rating: i32, opponent_rating: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent_rating - player_rating) / 400.0))
}

/// K-factor for a player's next update.
///
/// Provisional players (fewer than 10 games) move fast, established
/// players below 2000 move at the standard rate, elite players slower.
pub fn k_factor(rating: i32, games_played: u32) -> i32 {
    if games_played < 10 {
        40
    } else if rating < 2000 {
        32
    } else {
        24
    }
}

/// New rating after a match with the given expected and actual scores.
/// `actual` is 1.0 for a win, 0.5 for a draw, 0.0 for a loss.
pub fn updated_rating(rating: i32, expected: f64, actual: f64, k: i32) -> i32 {
    rating + (f64::from(k) * (actual - expected)).round() as i32
}

/// Compute both sides' new ratings for a finished ranked match.
///
/// For a draw the "winner"/"loser" designation only selects which argument
/// is which; both sides score 0.5.
pub fn rate_match(
    winner_rating: i32,
    loser_rating: i32,
    winner_games: u32,
    loser_games: u32,
    is_draw: bool,
) -> (i32, i32) {
    let winner_expected = expected_score(winner_rating, loser_rating);
    let loser_expected = expected_score(loser_rating, winner_rating);

    let winner_k = k_factor(winner_rating, winner_games);
    let loser_k = k_factor(loser_rating, loser_games);

    let (winner_actual, loser_actual) = if is_draw { (0.5, 0.5) } else { (1.0, 0.0) };

    (
        updated_rating(winner_rating, winner_expected, winner_actual, winner_k),
        updated_rating(loser_rating, loser_expected, loser_actual, loser_k),
    )
}
